//! 应用层：审计列表与解封

pub mod lister;
pub mod revoker;

pub use lister::*;
pub use revoker::*;
