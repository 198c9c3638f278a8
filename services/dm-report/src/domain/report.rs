//! 报表实体

use common::{AuditInfo, RowVersion};
use ports::Versioned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 报表 ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportId(pub Uuid);

impl ReportId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ReportId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ReportId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// 报表实体
///
/// `row_version` 由存储在每次写入时盖戳，用于乐观并发控制
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    /// 标题（服务内唯一）
    pub title: String,
    /// 正文
    pub body: String,
    /// 标签
    pub tags: Vec<String>,
    pub audit_info: AuditInfo,
    pub row_version: RowVersion,
}

impl Report {
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            id: ReportId::new(),
            title: title.into(),
            body: body.into(),
            tags: Vec::new(),
            audit_info: AuditInfo::new(Some(created_by.into())),
            row_version: RowVersion::unset(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// 应用补丁并更新审计信息
    pub fn apply(&mut self, patch: &ReportPatch, updated_by: impl Into<String>) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(body) = &patch.body {
            self.body = body.clone();
        }
        if let Some(tags) = &patch.tags {
            self.tags = tags.clone();
        }
        self.audit_info.update(Some(updated_by.into()));
    }
}

impl Versioned for Report {
    fn row_version(&self) -> RowVersion {
        self.row_version
    }

    fn stamp(&mut self, version: RowVersion) {
        self.row_version = version;
    }
}

/// 报表补丁
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportPatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl ReportPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none() && self.tags.is_none()
    }
}

/// 报表查询过滤器
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportFilter {
    /// 标题包含（大小写不敏感）
    pub title_contains: Option<String>,
}

impl ReportFilter {
    pub fn matches(&self, report: &Report) -> bool {
        self.title_contains.as_ref().is_none_or(|needle| {
            report
                .title
                .to_lowercase()
                .contains(&needle.to_lowercase())
        })
    }
}
