//! SQLite backend for the residue marketplace engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
