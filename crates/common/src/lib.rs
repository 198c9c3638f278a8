//! common - 通用类型和工具库

pub mod types;
pub mod version;

pub use types::*;
pub use version::*;
