//! 报表 Repository trait 定义

use async_trait::async_trait;
use common::Pagination;
use errors::AppResult;
use ports::PageableRepository;

use super::{Report, ReportFilter, ReportId};

/// 报表 Repository
#[async_trait]
pub trait ReportRepository: PageableRepository<Report, ReportId> {
    /// 标题是否已被占用
    async fn exists_by_title(&self, title: &str) -> AppResult<bool>;

    /// 过滤查询，返回当前页与总数
    async fn search(
        &self,
        filter: &ReportFilter,
        pagination: &Pagination,
    ) -> AppResult<(Vec<Report>, u64)>;
}
