mod money;
mod quantity;

pub mod helpers;
pub mod op;
mod secret;

pub use money::{Money, MoneyConversionError};
pub use quantity::Quantity;
pub use secret::Secret;
