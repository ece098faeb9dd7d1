//! Ban Admin - IP 封禁 / strike / 限流缓存的审计与修复工具
//!
//! 模块化架构：
//! - `domain`: 键语法、审计条目
//! - `application`: 审计列表（list-bans）、解封（unban-ip）
//! - `infrastructure`: 存储装配、内存存储、操作超时

pub mod application;
pub mod domain;
pub mod infrastructure;
