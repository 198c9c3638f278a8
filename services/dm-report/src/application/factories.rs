//! 报表请求工厂
//!
//! 规范化/补全原始输入；不做授权，不碰存储。
//! 对相同输入产出相同的请求负载。

use async_trait::async_trait;
use auth_core::CallerIdentity;
use common::{Pagination, RowVersion};
use cqrs_core::{RequestEnvelope, RequestFactory};
use errors::{AppError, AppResult};
use tokio_util::sync::CancellationToken;

use crate::domain::{ReportFilter, ReportId, ReportPatch};

use super::requests::*;

/// 列表默认页大小
const DEFAULT_PAGE_SIZE: u32 = 20;
/// 列表页大小上限
const MAX_PAGE_SIZE: u32 = 100;

fn ensure_not_cancelled(cancel: &CancellationToken) -> AppResult<()> {
    if cancel.is_cancelled() {
        return Err(AppError::cancelled("Request construction cancelled"));
    }
    Ok(())
}

fn parse_report_id(raw: &str) -> AppResult<ReportId> {
    raw.parse()
        .map_err(|_| AppError::validation("Invalid report ID"))
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut normalized = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }
    normalized
}

/// 新建报表工厂
pub struct AddReportFactory;

#[async_trait]
impl RequestFactory<NewReport, AddReport> for AddReportFactory {
    async fn build(
        &self,
        raw: NewReport,
        identity: CallerIdentity,
        cancel: &CancellationToken,
    ) -> AppResult<RequestEnvelope<AddReport>> {
        ensure_not_cancelled(cancel)?;

        let title = raw.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::validation("Report title must not be empty"));
        }

        let report = NewReport {
            title,
            body: raw.body,
            tags: normalize_tags(raw.tags),
        };
        RequestEnvelope::new(AddReport { report }, identity)
    }
}

/// 更新报表工厂
pub struct UpdateReportFactory;

#[async_trait]
impl RequestFactory<UpdateSubmission, UpdateReport> for UpdateReportFactory {
    async fn build(
        &self,
        raw: UpdateSubmission,
        identity: CallerIdentity,
        cancel: &CancellationToken,
    ) -> AppResult<RequestEnvelope<UpdateReport>> {
        ensure_not_cancelled(cancel)?;

        let report_id = parse_report_id(&raw.report_id)?;
        if raw.expected_version == 0 {
            return Err(AppError::validation("Expected row version is required"));
        }

        let patch = ReportPatch {
            title: raw
                .title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            body: raw.body,
            tags: raw.tags.map(normalize_tags),
        };
        if patch.is_empty() {
            return Err(AppError::validation("Update carries no changes"));
        }

        RequestEnvelope::new(
            UpdateReport {
                report_id,
                expected_version: RowVersion(raw.expected_version),
                patch,
            },
            identity,
        )
    }
}

/// 删除报表工厂
pub struct DeleteReportFactory;

#[async_trait]
impl RequestFactory<String, DeleteReport> for DeleteReportFactory {
    async fn build(
        &self,
        raw: String,
        identity: CallerIdentity,
        cancel: &CancellationToken,
    ) -> AppResult<RequestEnvelope<DeleteReport>> {
        ensure_not_cancelled(cancel)?;
        let report_id = parse_report_id(&raw)?;
        RequestEnvelope::new(DeleteReport { report_id }, identity)
    }
}

/// 列表查询工厂
///
/// 解析页参数的缺省值并收敛到上限
pub struct ListReportsFactory;

#[async_trait]
impl RequestFactory<ListQuery, ListReports> for ListReportsFactory {
    async fn build(
        &self,
        raw: ListQuery,
        identity: CallerIdentity,
        cancel: &CancellationToken,
    ) -> AppResult<RequestEnvelope<ListReports>> {
        ensure_not_cancelled(cancel)?;

        let page = raw.page.max(1);
        let page_size = match raw.page_size {
            0 => DEFAULT_PAGE_SIZE,
            size => size.min(MAX_PAGE_SIZE),
        };
        let filter = ReportFilter {
            title_contains: raw
                .title_contains
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
        };

        RequestEnvelope::new(
            ListReports {
                filter,
                pagination: Pagination::new(page, page_size),
            },
            identity,
        )
    }
}

/// 导出报表工厂
pub struct ViewReportFactory;

#[async_trait]
impl RequestFactory<String, ViewReport> for ViewReportFactory {
    async fn build(
        &self,
        raw: String,
        identity: CallerIdentity,
        cancel: &CancellationToken,
    ) -> AppResult<RequestEnvelope<ViewReport>> {
        ensure_not_cancelled(cancel)?;
        let report_id = parse_report_id(&raw)?;
        RequestEnvelope::new(ViewReport { report_id }, identity)
    }
}
