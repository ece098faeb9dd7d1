//! warden-adapter-postgres - PostgreSQL 适配器

mod cache_table;
mod connection;

pub use cache_table::*;
pub use connection::*;
