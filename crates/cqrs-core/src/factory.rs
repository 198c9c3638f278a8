//! Request Factory 定义

use async_trait::async_trait;
use auth_core::CallerIdentity;
use errors::AppResult;
use tokio_util::sync::CancellationToken;

use crate::{Request, RequestEnvelope};

/// 请求工厂
///
/// 把原始输入规范化/补全成带类型的请求信封。
/// 对相同输入是确定性的；不做授权，不产生副作用；
/// 取消时返回 `AppError::Cancelled` 而不是半成品信封。
#[async_trait]
pub trait RequestFactory<Raw: Send, R: Request>: Send + Sync {
    async fn build(
        &self,
        raw: Raw,
        identity: CallerIdentity,
        cancel: &CancellationToken,
    ) -> AppResult<RequestEnvelope<R>>;
}
