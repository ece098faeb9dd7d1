//! 领域层：键语法与审计条目

pub mod entry;
pub mod key;

pub use entry::*;
pub use key::*;
