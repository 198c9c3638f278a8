//! dm-report - 报表服务
//!
//! 报表的增删改查与电子表格导出，经由授权闸口与审计
//! 处理器的调度管道执行

pub mod application;
pub mod config;
pub mod domain;
pub mod export;
pub mod infrastructure;
