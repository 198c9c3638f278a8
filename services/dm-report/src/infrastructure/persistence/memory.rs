//! 进程内报表存储
//!
//! 测试与单节点部署用的参考实现。每个写入方法在同一把写锁
//! 内完成版本校验、盖戳和写入，并发变更不可能插入未盖戳的
//! 写；这也是每个处理器“单次变更即事务”的原子性来源。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{Pagination, RowVersion, RowVersionClock};
use errors::{AppError, AppResult};
use ports::{PageableRepository, Repository, Versioned};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    Report, ReportFilter, ReportId, ReportRepository, UnitOfWork, UnitOfWorkFactory,
};

/// 内存报表存储
pub struct MemoryStore {
    reports: RwLock<HashMap<Uuid, Report>>,
    clock: Arc<RowVersionClock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(RowVersionClock::new()))
    }

    pub fn with_clock(clock: Arc<RowVersionClock>) -> Self {
        Self {
            reports: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// 按创建时间升序的稳定快照
    async fn snapshot(&self) -> Vec<Report> {
        let reports = self.reports.read().await;
        let mut items: Vec<Report> = reports.values().cloned().collect();
        items.sort_by(|a, b| {
            a.audit_info
                .created_at
                .cmp(&b.audit_info.created_at)
                .then_with(|| a.id.0.cmp(&b.id.0))
        });
        items
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository<Report, ReportId> for MemoryStore {
    async fn find_by_id(&self, id: &ReportId) -> AppResult<Option<Report>> {
        Ok(self.reports.read().await.get(&id.0).cloned())
    }

    async fn insert(&self, mut report: Report) -> AppResult<Report> {
        let mut reports = self.reports.write().await;
        if reports.contains_key(&report.id.0) {
            return Err(AppError::conflict(format!(
                "Report '{}' already exists",
                report.id
            )));
        }
        // 写锁内盖戳，提交前不会出现未盖戳的写
        report.stamp(self.clock.next());
        reports.insert(report.id.0, report.clone());
        Ok(report)
    }

    async fn update(&self, mut report: Report, expected: RowVersion) -> AppResult<Report> {
        let mut reports = self.reports.write().await;
        let current = reports
            .get(&report.id.0)
            .ok_or_else(|| AppError::not_found("Report not found"))?;
        // 比较并交换：并发写入者中恰有一个成功
        if current.row_version() != expected {
            return Err(AppError::conflict(format!(
                "Row version conflict: expected {expected}, found {}",
                current.row_version()
            )));
        }
        report.stamp(self.clock.next());
        reports.insert(report.id.0, report.clone());
        Ok(report)
    }

    async fn delete(&self, id: &ReportId) -> AppResult<()> {
        self.reports
            .write()
            .await
            .remove(&id.0)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("Report not found"))
    }

    async fn exists(&self, id: &ReportId) -> AppResult<bool> {
        Ok(self.reports.read().await.contains_key(&id.0))
    }
}

#[async_trait]
impl PageableRepository<Report, ReportId> for MemoryStore {
    async fn find_all(&self, pagination: &Pagination) -> AppResult<Vec<Report>> {
        let items = self.snapshot().await;
        Ok(items
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.page_size as usize)
            .collect())
    }

    async fn count(&self) -> AppResult<u64> {
        Ok(self.reports.read().await.len() as u64)
    }
}

#[async_trait]
impl ReportRepository for MemoryStore {
    async fn exists_by_title(&self, title: &str) -> AppResult<bool> {
        Ok(self
            .reports
            .read()
            .await
            .values()
            .any(|r| r.title.eq_ignore_ascii_case(title)))
    }

    async fn search(
        &self,
        filter: &ReportFilter,
        pagination: &Pagination,
    ) -> AppResult<(Vec<Report>, u64)> {
        let matching: Vec<Report> = self
            .snapshot()
            .await
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.page_size as usize)
            .collect();
        Ok((page, total))
    }
}

/// 内存 Unit of Work
///
/// 每个命令处理器恰好执行一次变更调用，而存储的每次变更
/// 调用在单把写锁内原子生效，因此提交是边界标记；变更调用
/// 之前的回滚天然干净
pub struct MemoryUnitOfWork {
    store: Arc<MemoryStore>,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    fn reports(&self) -> &dyn ReportRepository {
        self.store.as_ref()
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        tracing::debug!("Memory unit of work discarded");
        Ok(())
    }
}

/// 内存 Unit of Work 工厂
pub struct MemoryUnitOfWorkFactory {
    store: Arc<MemoryStore>,
}

impl MemoryUnitOfWorkFactory {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl UnitOfWorkFactory for MemoryUnitOfWorkFactory {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        Ok(Box::new(MemoryUnitOfWork {
            store: Arc::clone(&self.store),
        }))
    }
}
