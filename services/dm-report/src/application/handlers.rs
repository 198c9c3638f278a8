//! 报表命令处理器

use std::sync::Arc;

use async_trait::async_trait;
use cqrs_core::{RequestEnvelope, RequestHandler};
use errors::{AppError, AppResult};
use ports::Repository as _;

use crate::domain::{Report, ReportId, ReportRepository as _, UnitOfWorkFactory};

use super::requests::{AddReport, DeleteReport, UpdateReport};

/// 新建报表处理器
pub struct AddReportHandler {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
}

impl AddReportHandler {
    pub fn new(uow_factory: Arc<dyn UnitOfWorkFactory>) -> Self {
        Self { uow_factory }
    }
}

#[async_trait]
impl RequestHandler<AddReport> for AddReportHandler {
    async fn handle(&self, envelope: &RequestEnvelope<AddReport>) -> AppResult<Report> {
        let input = &envelope.request().report;
        let uow = self.uow_factory.begin().await?;

        // 检查标题是否已存在
        if uow.reports().exists_by_title(&input.title).await? {
            return Err(AppError::conflict(format!(
                "Report with title '{}' already exists",
                input.title
            )));
        }

        let report = Report::new(&input.title, &input.body, envelope.identity().subject())
            .with_tags(input.tags.clone());

        let report = uow.reports().insert(report).await?;

        uow.commit().await?;

        Ok(report)
    }
}

/// 更新报表处理器
pub struct UpdateReportHandler {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
}

impl UpdateReportHandler {
    pub fn new(uow_factory: Arc<dyn UnitOfWorkFactory>) -> Self {
        Self { uow_factory }
    }
}

#[async_trait]
impl RequestHandler<UpdateReport> for UpdateReportHandler {
    async fn handle(&self, envelope: &RequestEnvelope<UpdateReport>) -> AppResult<Report> {
        let request = envelope.request();
        let uow = self.uow_factory.begin().await?;

        let mut report = uow
            .reports()
            .find_by_id(&request.report_id)
            .await?
            .ok_or_else(|| AppError::not_found("Report not found"))?;

        report.apply(&request.patch, envelope.identity().subject());

        // 行版本不符时返回 Conflict，调用方重读后重试
        let report = uow
            .reports()
            .update(report, request.expected_version)
            .await?;

        uow.commit().await?;

        Ok(report)
    }
}

/// 删除报表处理器
pub struct DeleteReportHandler {
    uow_factory: Arc<dyn UnitOfWorkFactory>,
}

impl DeleteReportHandler {
    pub fn new(uow_factory: Arc<dyn UnitOfWorkFactory>) -> Self {
        Self { uow_factory }
    }
}

#[async_trait]
impl RequestHandler<DeleteReport> for DeleteReportHandler {
    async fn handle(&self, envelope: &RequestEnvelope<DeleteReport>) -> AppResult<ReportId> {
        let request = envelope.request();
        let uow = self.uow_factory.begin().await?;

        // 检查报表是否存在
        if !uow.reports().exists(&request.report_id).await? {
            return Err(AppError::not_found("Report not found"));
        }

        uow.reports().delete(&request.report_id).await?;

        uow.commit().await?;

        Ok(request.report_id.clone())
    }
}
