//! ports - 抽象 trait 层
//!
//! 定义过期键值存储的抽象接口，以及所有适配器共用的键模式与值解码

mod cache;
mod pattern;
mod pickle;
mod value;

pub use cache::*;
pub use pattern::*;
pub use value::*;
