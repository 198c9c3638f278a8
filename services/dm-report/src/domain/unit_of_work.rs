//! Unit of Work 模式
//!
//! 写入操作的事务边界：一次调度内的存储变更要么全部生效，
//! 要么全部不生效

use async_trait::async_trait;
use errors::AppResult;

use super::ReportRepository;

/// Unit of Work trait
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// 获取报表 Repository
    fn reports(&self) -> &dyn ReportRepository;

    /// 提交事务
    async fn commit(self: Box<Self>) -> AppResult<()>;

    /// 回滚事务
    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Unit of Work 工厂 trait
#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    /// 开始新的事务
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;
}
