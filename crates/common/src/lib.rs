//! common - 通用类型和工具库

pub mod diff;
pub mod types;

pub use diff::*;
pub use types::*;
