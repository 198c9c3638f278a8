//! 审计存储接口

use async_trait::async_trait;
use errors::AppResult;
use uuid::Uuid;

use crate::{AuditOutcome, AuditRecord};

/// 审计记录过滤器
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// 资源类型
    pub resource_type: Option<String>,
    /// 资源 ID
    pub resource_id: Option<String>,
    /// 结果
    pub outcome: Option<AuditOutcome>,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按资源过滤
    pub fn by_resource(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    /// 按资源 ID 过滤
    pub fn by_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// 按结果过滤
    pub fn by_outcome(mut self, outcome: AuditOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    /// 记录是否匹配过滤条件
    pub fn matches(&self, record: &AuditRecord) -> bool {
        self.resource_type
            .as_ref()
            .is_none_or(|t| &record.resource_type == t)
            && self
                .resource_id
                .as_ref()
                .is_none_or(|id| &record.resource_id == id)
            && self.outcome.is_none_or(|o| record.outcome == o)
    }
}

/// 审计存储
///
/// 追加专用；单条追加是原子的
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// 追加单条审计记录
    async fn append(&self, record: AuditRecord) -> AppResult<()>;

    /// 按请求 ID 查询（追加顺序）
    async fn find_by_request(&self, request_id: Uuid) -> AppResult<Vec<AuditRecord>>;

    /// 过滤查询（追加顺序）
    async fn query(&self, filter: &AuditFilter) -> AppResult<Vec<AuditRecord>>;

    /// 统计数量
    async fn count(&self, filter: &AuditFilter) -> AppResult<u64>;
}
