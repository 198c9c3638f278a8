//! Repository trait 定义

use async_trait::async_trait;
use common::{Pagination, RowVersion};
use errors::AppResult;

/// 行版本能力
///
/// 每次 insert/update 在提交前由存储在同一工作单元内盖戳，
/// 同一条记录的版本在每次成功写入后严格递增
pub trait Versioned {
    fn row_version(&self) -> RowVersion;

    fn stamp(&mut self, version: RowVersion);
}

/// 基础 Repository trait
#[async_trait]
pub trait Repository<T: Versioned, ID>: Send + Sync {
    /// 根据 ID 查找
    async fn find_by_id(&self, id: &ID) -> AppResult<Option<T>>;

    /// 插入实体；盖上新的行版本并返回
    async fn insert(&self, entity: T) -> AppResult<T>;

    /// 更新实体；`expected` 与当前行版本不符返回 Conflict
    async fn update(&self, entity: T, expected: RowVersion) -> AppResult<T>;

    /// 删除实体
    async fn delete(&self, id: &ID) -> AppResult<()>;

    /// 检查是否存在
    async fn exists(&self, id: &ID) -> AppResult<bool>;
}

/// 支持分页查询的 Repository
#[async_trait]
pub trait PageableRepository<T: Versioned, ID>: Repository<T, ID> {
    /// 分页查询所有
    async fn find_all(&self, pagination: &Pagination) -> AppResult<Vec<T>>;

    /// 统计总数
    async fn count(&self) -> AppResult<u64>;
}
