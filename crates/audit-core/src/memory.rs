//! 进程内审计存储
//!
//! 测试与单节点部署使用；追加在同一把写锁下完成，
//! 单条记录不会出现半写状态

use async_trait::async_trait;
use errors::AppResult;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{AuditFilter, AuditRecord, AuditStore};

/// 内存审计存储
#[derive(Default)]
pub struct MemoryAuditStore {
    records: RwLock<Vec<AuditRecord>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已追加的记录总数
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, record: AuditRecord) -> AppResult<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn find_by_request(&self, request_id: Uuid) -> AppResult<Vec<AuditRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn query(&self, filter: &AuditFilter) -> AppResult<Vec<AuditRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn count(&self, filter: &AuditFilter) -> AppResult<u64> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| filter.matches(r))
            .count() as u64)
    }
}
