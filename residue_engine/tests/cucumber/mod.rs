mod market_world;
mod steps;

pub use market_world::MarketWorld;
