//! 报表请求定义
//!
//! 原始输入由调用层拥有；请求工厂把它们规范化为带类型的
//! 请求，再进入调度管道

use common::{Pagination, RowVersion};
use cqrs_core::{OperationKind, Request};
use serde::{Deserialize, Serialize};

use crate::domain::{Report, ReportFilter, ReportId, ReportPatch};

// --- 原始输入 ---

/// 新建报表输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReport {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// 更新报表输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSubmission {
    pub report_id: String,
    /// 调用方读取时看到的行版本
    pub expected_version: u64,
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// 列表查询输入
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQuery {
    pub title_contains: Option<String>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_size: u32,
}

// --- 带类型的请求 ---

/// 新建报表
#[derive(Debug, Clone, Serialize)]
pub struct AddReport {
    pub report: NewReport,
}

impl Request for AddReport {
    type Response = Report;

    fn kind(&self) -> OperationKind {
        OperationKind::Add
    }

    fn subject(&self) -> String {
        self.report.title.clone()
    }
}

/// 更新报表
#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    pub report_id: ReportId,
    pub expected_version: RowVersion,
    pub patch: ReportPatch,
}

impl Request for UpdateReport {
    type Response = Report;

    fn kind(&self) -> OperationKind {
        OperationKind::Update
    }

    fn subject(&self) -> String {
        self.report_id.to_string()
    }
}

/// 删除报表
#[derive(Debug, Clone, Serialize)]
pub struct DeleteReport {
    pub report_id: ReportId,
}

impl Request for DeleteReport {
    type Response = ReportId;

    fn kind(&self) -> OperationKind {
        OperationKind::Delete
    }

    fn subject(&self) -> String {
        self.report_id.to_string()
    }
}

/// 报表列表
#[derive(Debug, Clone, Serialize)]
pub struct ListReports {
    pub filter: ReportFilter,
    pub pagination: Pagination,
}

impl Request for ListReports {
    type Response = common::PagedResult<Report>;

    fn kind(&self) -> OperationKind {
        OperationKind::List
    }

    fn subject(&self) -> String {
        "reports".to_string()
    }
}

/// 导出报表（电子表格）
#[derive(Debug, Clone, Serialize)]
pub struct ViewReport {
    pub report_id: ReportId,
}

impl Request for ViewReport {
    type Response = ReportFile;

    fn kind(&self) -> OperationKind {
        OperationKind::View
    }

    fn subject(&self) -> String {
        self.report_id.to_string()
    }
}

/// 导出产物：命名字节流 + 媒体类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFile {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}
