//! 报表服务入口
//!
//! 把授权闸口、请求工厂、调度器和输出映射装配成单一入口。
//! 所有注册与策略名在构造时校验，配置问题立即失败。

use std::sync::Arc;

use audit_core::{AuditStore, RecordAttempt, RecordOutcome};
use auth_core::{AuthorizationGate, CallerIdentity, PolicyEngine};
use cqrs_core::{
    DispatcherBuilder, Executed, JsonMapper, Operation, Orchestrator, PipelineError, RequestLogger,
};
use errors::SetupError;
use tokio_util::sync::CancellationToken;

use crate::domain::{ReportRepository, UnitOfWorkFactory};
use crate::export::ReportExporter;

use super::factories::*;
use super::handlers::*;
use super::mappers::ReportFileMapper;
use super::query_handlers::*;
use super::requests::*;

/// 操作对应的策略名（与外部配置约定）
pub mod policy {
    pub const ADD_REPORT: &str = "AddReport";
    pub const EDIT_REPORT: &str = "EditReport";
    pub const DELETE_REPORT: &str = "DeleteReport";
    pub const LIST_REPORTS: &str = "ListReports";
    pub const VIEW_SPREADSHEET: &str = "ViewSpreadsheet";

    pub const ALL: [&str; 5] = [
        ADD_REPORT,
        EDIT_REPORT,
        DELETE_REPORT,
        LIST_REPORTS,
        VIEW_SPREADSHEET,
    ];
}

/// 审计记录的资源类型
const RESOURCE_TYPE: &str = "Report";

/// 一次报表操作的原始输入
#[derive(Debug, Clone)]
pub enum ReportOperation {
    Add(NewReport),
    Update(UpdateSubmission),
    Delete(String),
    List(ListQuery),
    View(String),
}

/// 报表服务
pub struct ReportService {
    orchestrator: Orchestrator,
    add: Operation<NewReport, AddReport>,
    update: Operation<UpdateSubmission, UpdateReport>,
    delete: Operation<String, DeleteReport>,
    list: Operation<ListQuery, ListReports>,
    view: Operation<String, ViewReport>,
}

impl ReportService {
    pub fn new(
        engine: Arc<dyn PolicyEngine>,
        uow_factory: Arc<dyn UnitOfWorkFactory>,
        reports: Arc<dyn ReportRepository>,
        audit: Arc<dyn AuditStore>,
        exporter: Arc<dyn ReportExporter>,
    ) -> Result<Self, SetupError> {
        let logger = Arc::new(RequestLogger);
        let attempt = Arc::new(RecordAttempt::new(audit.clone(), RESOURCE_TYPE));
        let outcome = Arc::new(RecordOutcome::new(audit, RESOURCE_TYPE));

        let dispatcher = Arc::new(
            DispatcherBuilder::new()
                .register::<AddReport>(Arc::new(AddReportHandler::new(uow_factory.clone())))?
                .pre_process::<AddReport>(logger.clone())?
                .pre_process::<AddReport>(attempt.clone())?
                .post_process::<AddReport>(outcome.clone())?
                .post_process::<AddReport>(logger.clone())?
                .register::<UpdateReport>(Arc::new(UpdateReportHandler::new(
                    uow_factory.clone(),
                )))?
                .pre_process::<UpdateReport>(logger.clone())?
                .pre_process::<UpdateReport>(attempt.clone())?
                .post_process::<UpdateReport>(outcome.clone())?
                .post_process::<UpdateReport>(logger.clone())?
                .register::<DeleteReport>(Arc::new(DeleteReportHandler::new(uow_factory)))?
                .pre_process::<DeleteReport>(logger.clone())?
                .pre_process::<DeleteReport>(attempt.clone())?
                .post_process::<DeleteReport>(outcome.clone())?
                .post_process::<DeleteReport>(logger.clone())?
                .register::<ListReports>(Arc::new(ListReportsHandler::new(reports.clone())))?
                .pre_process::<ListReports>(logger.clone())?
                .pre_process::<ListReports>(attempt.clone())?
                .post_process::<ListReports>(outcome.clone())?
                .post_process::<ListReports>(logger.clone())?
                .register::<ViewReport>(Arc::new(ViewReportHandler::new(
                    reports,
                    exporter.clone(),
                )))?
                .pre_process::<ViewReport>(logger.clone())?
                .pre_process::<ViewReport>(attempt)?
                .post_process::<ViewReport>(outcome)?
                .post_process::<ViewReport>(logger)?
                .build(),
        );

        let gate = AuthorizationGate::validated(engine, &policy::ALL)?;
        let orchestrator = Orchestrator::new(gate, dispatcher);

        let add = Operation::new(policy::ADD_REPORT, Arc::new(AddReportFactory), Arc::new(JsonMapper));
        let update = Operation::new(
            policy::EDIT_REPORT,
            Arc::new(UpdateReportFactory),
            Arc::new(JsonMapper),
        );
        let delete = Operation::new(
            policy::DELETE_REPORT,
            Arc::new(DeleteReportFactory),
            Arc::new(JsonMapper),
        );
        let list = Operation::new(
            policy::LIST_REPORTS,
            Arc::new(ListReportsFactory),
            Arc::new(JsonMapper),
        );
        let view = Operation::new(
            policy::VIEW_SPREADSHEET,
            Arc::new(ViewReportFactory),
            Arc::new(ReportFileMapper::new(exporter.media_type())),
        );

        orchestrator.validate(&add)?;
        orchestrator.validate(&update)?;
        orchestrator.validate(&delete)?;
        orchestrator.validate(&list)?;
        orchestrator.validate(&view)?;

        Ok(Self {
            orchestrator,
            add,
            update,
            delete,
            list,
            view,
        })
    }

    /// 执行一次报表操作
    ///
    /// 外部调用方（HTTP 控制器、消息消费者等）使用的唯一边界
    pub async fn execute(
        &self,
        operation: ReportOperation,
        identity: &CallerIdentity,
        cancel: &CancellationToken,
    ) -> Result<Executed, PipelineError> {
        match operation {
            ReportOperation::Add(raw) => {
                self.orchestrator
                    .execute(&self.add, raw, identity, cancel)
                    .await
            }
            ReportOperation::Update(raw) => {
                self.orchestrator
                    .execute(&self.update, raw, identity, cancel)
                    .await
            }
            ReportOperation::Delete(raw) => {
                self.orchestrator
                    .execute(&self.delete, raw, identity, cancel)
                    .await
            }
            ReportOperation::List(raw) => {
                self.orchestrator
                    .execute(&self.list, raw, identity, cancel)
                    .await
            }
            ReportOperation::View(raw) => {
                self.orchestrator
                    .execute(&self.view, raw, identity, cancel)
                    .await
            }
        }
    }
}
