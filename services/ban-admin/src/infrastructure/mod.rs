//! 基础设施层：存储装配、内存存储、操作超时

mod deadline;
mod memory;
mod store;

pub use deadline::*;
pub use memory::*;
pub use store::*;
