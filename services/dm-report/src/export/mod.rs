//! 报表导出
//!
//! 导出器是外部协作方的接缝；本服务只内置电子表格（CSV）
//! 渲染，PDF/Excel 等 SDK 包装不在此层

mod csv;

pub use csv::*;

use errors::AppResult;

use crate::domain::Report;

/// 报表导出器
pub trait ReportExporter: Send + Sync {
    /// 导出产物的媒体类型
    fn media_type(&self) -> &'static str;

    /// 导出文件名
    fn file_name(&self, report: &Report) -> String;

    /// 渲染为字节流
    fn render(&self, report: &Report) -> AppResult<Vec<u8>>;
}
