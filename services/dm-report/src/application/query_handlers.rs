//! 报表查询处理器

use std::sync::Arc;

use async_trait::async_trait;
use common::PagedResult;
use cqrs_core::{RequestEnvelope, RequestHandler};
use errors::{AppError, AppResult};
use ports::Repository as _;

use crate::domain::{Report, ReportRepository};
use crate::export::ReportExporter;

use super::requests::{ListReports, ReportFile, ViewReport};

/// 报表列表处理器
pub struct ListReportsHandler {
    reports: Arc<dyn ReportRepository>,
}

impl ListReportsHandler {
    pub fn new(reports: Arc<dyn ReportRepository>) -> Self {
        Self { reports }
    }
}

#[async_trait]
impl RequestHandler<ListReports> for ListReportsHandler {
    async fn handle(
        &self,
        envelope: &RequestEnvelope<ListReports>,
    ) -> AppResult<PagedResult<Report>> {
        let request = envelope.request();
        let (items, total) = self
            .reports
            .search(&request.filter, &request.pagination)
            .await?;

        Ok(PagedResult::new(items, total, &request.pagination))
    }
}

/// 报表导出处理器
pub struct ViewReportHandler {
    reports: Arc<dyn ReportRepository>,
    exporter: Arc<dyn ReportExporter>,
}

impl ViewReportHandler {
    pub fn new(reports: Arc<dyn ReportRepository>, exporter: Arc<dyn ReportExporter>) -> Self {
        Self { reports, exporter }
    }
}

#[async_trait]
impl RequestHandler<ViewReport> for ViewReportHandler {
    async fn handle(&self, envelope: &RequestEnvelope<ViewReport>) -> AppResult<ReportFile> {
        let report = self
            .reports
            .find_by_id(&envelope.request().report_id)
            .await?
            .ok_or_else(|| AppError::not_found("Report not found"))?;

        let bytes = self.exporter.render(&report)?;

        Ok(ReportFile {
            file_name: self.exporter.file_name(&report),
            media_type: self.exporter.media_type().to_string(),
            bytes,
        })
    }
}
