//! arbor-errors - 统一错误处理
//!
//! 基于 RFC 7807 Problem Details 规范

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 应用错误类型
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn external_service(msg: impl Into<String>) -> Self {
        Self::ExternalService(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// 转换为 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::Conflict(_) => 409,
            Self::Cancelled(_) => 499,
            Self::Internal(_) => 500,
            Self::Storage(_) => 500,
            Self::ExternalService(_) => 502,
        }
    }

    /// 转换为 Problem Details
    pub fn to_problem_details(&self) -> ProblemDetails {
        ProblemDetails {
            r#type: self.problem_type(),
            title: self.problem_title(),
            status: self.status_code(),
            detail: self.to_string(),
            instance: None,
        }
    }

    fn problem_type(&self) -> String {
        let slug = match self {
            Self::NotFound(_) => "not-found",
            Self::Validation(_) => "validation",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::Cancelled(_) => "cancelled",
            Self::Internal(_) => "internal",
            Self::Storage(_) => "storage",
            Self::ExternalService(_) => "external-service",
        };
        format!("https://api.arbor-office.dev/problems/{slug}")
    }

    fn problem_title(&self) -> String {
        match self {
            Self::NotFound(_) => "Resource Not Found",
            Self::Validation(_) => "Validation Error",
            Self::Unauthorized(_) => "Unauthorized",
            Self::Forbidden(_) => "Forbidden",
            Self::Conflict(_) => "Conflict",
            Self::Cancelled(_) => "Request Cancelled",
            Self::Internal(_) => "Internal Server Error",
            Self::Storage(_) => "Storage Error",
            Self::ExternalService(_) => "External Service Error",
        }
        .to_string()
    }
}

/// RFC 7807 Problem Details
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

/// Result 类型别名
pub type AppResult<T> = Result<T, AppError>;

/// 启动期配置错误
///
/// 注册表或策略配置的问题在启动时立即失败，
/// 绝不会作为某一次请求的结果出现
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SetupError {
    #[error("Duplicate handler registered for {request}")]
    DuplicateHandler { request: &'static str },

    #[error("No handler registered for {request}")]
    MissingHandler { request: &'static str },

    #[error("Processor registered for {request} before its handler")]
    ProcessorBeforeHandler { request: &'static str },

    #[error("Unknown authorization policy '{policy}'")]
    UnknownPolicy { policy: String },

    #[error("Duplicate authorization policy '{policy}'")]
    DuplicatePolicy { policy: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::not_found("x").status_code(), 404);
        assert_eq!(AppError::validation("x").status_code(), 400);
        assert_eq!(AppError::forbidden("x").status_code(), 403);
        assert_eq!(AppError::conflict("x").status_code(), 409);
        assert_eq!(AppError::cancelled("x").status_code(), 499);
        assert_eq!(AppError::internal("x").status_code(), 500);
    }

    #[test]
    fn test_problem_details() {
        let details = AppError::not_found("Report not found").to_problem_details();
        assert_eq!(details.status, 404);
        assert_eq!(details.title, "Resource Not Found");
        assert!(details.r#type.ends_with("/not-found"));
        assert_eq!(details.detail, "Not found: Report not found");
    }

    #[test]
    fn test_cancelled_is_distinguishable() {
        assert!(AppError::cancelled("x").is_cancelled());
        assert!(!AppError::internal("x").is_cancelled());
    }

    #[test]
    fn test_setup_error_display() {
        let err = SetupError::UnknownPolicy {
            policy: "ViewSpreadsheet".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown authorization policy 'ViewSpreadsheet'"
        );
    }
}
