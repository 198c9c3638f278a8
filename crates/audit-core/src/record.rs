//! 审计记录模型

use chrono::{DateTime, Utc};
use cqrs_core::OperationKind;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 审计结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    /// 操作已尝试（Handler 之前写入）
    Attempted,
    /// 操作成功（Handler 之后写入）
    Succeeded,
    /// 显式记录的失败
    Failed,
    /// 处理器在多步写入中途收到取消信号
    Cancelled,
}

impl std::fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditOutcome::Attempted => write!(f, "ATTEMPTED"),
            AuditOutcome::Succeeded => write!(f, "SUCCEEDED"),
            AuditOutcome::Failed => write!(f, "FAILED"),
            AuditOutcome::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// 审计记录
///
/// 追加后不再修改、不删除；`request_id` 关联同一次调度的
/// 尝试记录与结果记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// 唯一标识
    pub id: Uuid,
    /// 关联的请求 ID
    pub request_id: Uuid,
    /// 时间戳
    pub timestamp: DateTime<Utc>,
    /// 调用方 subject
    pub caller: String,
    /// 操作类别
    pub kind: OperationKind,
    /// 资源类型
    pub resource_type: String,
    /// 资源 ID
    pub resource_id: String,
    /// 负载快照（JSON）
    pub payload: Option<String>,
    /// 结果
    pub outcome: AuditOutcome,
}

impl AuditRecord {
    /// 创建新的审计记录，默认结果为 Attempted
    pub fn new(
        request_id: Uuid,
        caller: impl Into<String>,
        kind: OperationKind,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            request_id,
            timestamp: Utc::now(),
            caller: caller.into(),
            kind,
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            payload: None,
            outcome: AuditOutcome::Attempted,
        }
    }

    /// 设置负载快照
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// 设置结果
    pub fn with_outcome(mut self, outcome: AuditOutcome) -> Self {
        self.outcome = outcome;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_defaults_to_attempted() {
        let record = AuditRecord::new(
            Uuid::now_v7(),
            "user:alice",
            OperationKind::Add,
            "Report",
            "quarterly",
        );
        assert_eq!(record.outcome, AuditOutcome::Attempted);
        assert!(record.payload.is_none());
    }

    #[test]
    fn test_builders() {
        let record = AuditRecord::new(
            Uuid::now_v7(),
            "user:alice",
            OperationKind::Update,
            "Report",
            "quarterly",
        )
        .with_payload(r#"{"title":"Q3"}"#)
        .with_outcome(AuditOutcome::Succeeded);

        assert_eq!(record.outcome, AuditOutcome::Succeeded);
        assert_eq!(record.payload.as_deref(), Some(r#"{"title":"Q3"}"#));
        assert_eq!(record.kind, OperationKind::Update);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(AuditOutcome::Attempted.to_string(), "ATTEMPTED");
        assert_eq!(AuditOutcome::Cancelled.to_string(), "CANCELLED");
    }
}
