//! Request trait 定义

use async_trait::async_trait;
use auth_core::CallerIdentity;
use errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 操作类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Add,
    Update,
    Delete,
    List,
    View,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Add => write!(f, "ADD"),
            OperationKind::Update => write!(f, "UPDATE"),
            OperationKind::Delete => write!(f, "DELETE"),
            OperationKind::List => write!(f, "LIST"),
            OperationKind::View => write!(f, "VIEW"),
        }
    }
}

/// Request trait
///
/// 每种请求声明自己的响应类型、操作类别和所指向的资源
pub trait Request: Send + Sync + 'static {
    type Response: Send + 'static;

    fn kind(&self) -> OperationKind;

    /// 请求指向的资源标识（审计/日志用）
    fn subject(&self) -> String;
}

/// Request Handler trait
#[async_trait]
pub trait RequestHandler<R: Request>: Send + Sync {
    async fn handle(&self, envelope: &RequestEnvelope<R>) -> AppResult<R::Response>;
}

/// 请求信封
///
/// 携带负载与调用方身份走完整条管道；构造后不可变，
/// 调度返回后即丢弃。`request_id` 仅用于关联审计与日志。
#[derive(Debug)]
pub struct RequestEnvelope<R: Request> {
    request_id: Uuid,
    request: R,
    identity: CallerIdentity,
}

impl<R: Request> RequestEnvelope<R> {
    /// 构造信封；匿名身份在此被拒绝
    pub fn new(request: R, identity: CallerIdentity) -> AppResult<Self> {
        if identity.is_anonymous() {
            return Err(AppError::unauthorized("Caller identity is required"));
        }
        Ok(Self {
            request_id: Uuid::now_v7(),
            request,
            identity,
        })
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn request(&self) -> &R {
        &self.request
    }

    pub fn identity(&self) -> &CallerIdentity {
        &self.identity
    }

    pub fn kind(&self) -> OperationKind {
        self.request.kind()
    }

    pub fn subject(&self) -> String {
        self.request.subject()
    }
}

#[cfg(test)]
mod tests {
    use auth_core::Claims;

    use super::*;

    #[derive(Debug, Clone, Serialize)]
    struct Ping {
        value: u32,
    }

    impl Request for Ping {
        type Response = u32;

        fn kind(&self) -> OperationKind {
            OperationKind::View
        }

        fn subject(&self) -> String {
            format!("ping:{}", self.value)
        }
    }

    fn identity() -> CallerIdentity {
        CallerIdentity::new(Claims::new("user:test", Vec::new(), Vec::new()))
    }

    #[test]
    fn test_envelope_carries_request_and_identity() {
        let envelope = RequestEnvelope::new(Ping { value: 5 }, identity()).unwrap();
        assert_eq!(envelope.request().value, 5);
        assert_eq!(envelope.identity().subject(), "user:test");
        assert_eq!(envelope.kind(), OperationKind::View);
        assert_eq!(envelope.subject(), "ping:5");
    }

    #[test]
    fn test_anonymous_identity_rejected() {
        let err = RequestEnvelope::new(Ping { value: 5 }, CallerIdentity::anonymous()).unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn test_request_ids_are_distinct() {
        let a = RequestEnvelope::new(Ping { value: 1 }, identity()).unwrap();
        let b = RequestEnvelope::new(Ping { value: 1 }, identity()).unwrap();
        assert_ne!(a.request_id(), b.request_id());
    }

    #[test]
    fn test_operation_kind_display() {
        assert_eq!(OperationKind::Add.to_string(), "ADD");
        assert_eq!(OperationKind::View.to_string(), "VIEW");
    }
}
