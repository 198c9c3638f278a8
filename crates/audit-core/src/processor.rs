//! 审计处理器
//!
//! 调度管道的前置/后置处理器：Handler 之前写入尝试记录，
//! Handler 成功之后写入结果记录。Handler 失败时不再有结果
//! 记录，审计轨迹上表现为只有尝试记录。

use std::sync::Arc;

use async_trait::async_trait;
use cqrs_core::{PostProcessor, PreProcessor, Request, RequestEnvelope};
use errors::{AppError, AppResult};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{AuditOutcome, AuditRecord, AuditStore};

fn snapshot<R: Request + Serialize>(envelope: &RequestEnvelope<R>) -> AppResult<String> {
    serde_json::to_string(envelope.request())
        .map_err(|e| AppError::internal(format!("Failed to snapshot request payload: {e}")))
}

fn record_for<R: Request>(
    envelope: &RequestEnvelope<R>,
    resource_type: &str,
) -> AuditRecord {
    AuditRecord::new(
        envelope.request_id(),
        envelope.identity().subject(),
        envelope.kind(),
        resource_type,
        envelope.subject(),
    )
}

/// 尝试记录处理器（前置）
///
/// 快照负载并追加 Attempted 记录；快照后若发现取消信号，
/// 改写为 Cancelled 记录再以取消结束，不留下歧义状态
pub struct RecordAttempt {
    store: Arc<dyn AuditStore>,
    resource_type: String,
}

impl RecordAttempt {
    pub fn new(store: Arc<dyn AuditStore>, resource_type: impl Into<String>) -> Self {
        Self {
            store,
            resource_type: resource_type.into(),
        }
    }
}

#[async_trait]
impl<R: Request + Serialize> PreProcessor<R> for RecordAttempt {
    fn name(&self) -> &'static str {
        "audit-attempt"
    }

    async fn before(
        &self,
        envelope: &RequestEnvelope<R>,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        let payload = snapshot(envelope)?;
        let record = record_for(envelope, &self.resource_type).with_payload(payload);

        if cancel.is_cancelled() {
            self.store
                .append(record.with_outcome(AuditOutcome::Cancelled))
                .await?;
            tracing::debug!(
                request_id = %envelope.request_id(),
                "Cancellation observed mid-write; cancelled outcome recorded"
            );
            return Err(AppError::cancelled("Request cancelled during audit write"));
        }

        self.store.append(record).await
    }
}

/// 结果记录处理器（后置）
///
/// Handler 成功后追加 Succeeded 记录
pub struct RecordOutcome {
    store: Arc<dyn AuditStore>,
    resource_type: String,
}

impl RecordOutcome {
    pub fn new(store: Arc<dyn AuditStore>, resource_type: impl Into<String>) -> Self {
        Self {
            store,
            resource_type: resource_type.into(),
        }
    }
}

#[async_trait]
impl<R: Request + Serialize> PostProcessor<R> for RecordOutcome {
    fn name(&self) -> &'static str {
        "audit-outcome"
    }

    async fn after(
        &self,
        envelope: &RequestEnvelope<R>,
        _response: &R::Response,
        _cancel: &CancellationToken,
    ) -> AppResult<()> {
        let payload = snapshot(envelope)?;
        self.store
            .append(
                record_for(envelope, &self.resource_type)
                    .with_payload(payload)
                    .with_outcome(AuditOutcome::Succeeded),
            )
            .await
    }
}
