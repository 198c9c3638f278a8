//! Processor 定义
//!
//! Handler 前后的旁路步骤；顺序执行，前置失败中止调度，
//! 后置失败不推翻已产生的响应

use async_trait::async_trait;
use errors::AppResult;
use tokio_util::sync::CancellationToken;

use crate::{Request, RequestEnvelope};

/// 前置处理器
///
/// 在 Handler 之前按注册顺序执行；只看得到请求。
/// 返回错误会中止调度，Handler 不会运行。
#[async_trait]
pub trait PreProcessor<R: Request>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn before(
        &self,
        envelope: &RequestEnvelope<R>,
        cancel: &CancellationToken,
    ) -> AppResult<()>;
}

/// 后置处理器
///
/// 在 Handler 成功之后按注册顺序执行；看得到请求和响应。
/// 返回错误作为非致命信号上报，响应原样返回给调用方。
#[async_trait]
pub trait PostProcessor<R: Request>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn after(
        &self,
        envelope: &RequestEnvelope<R>,
        response: &R::Response,
        cancel: &CancellationToken,
    ) -> AppResult<()>;
}

/// 日志处理器
pub struct RequestLogger;

#[async_trait]
impl<R: Request> PreProcessor<R> for RequestLogger {
    fn name(&self) -> &'static str {
        "request-logger"
    }

    async fn before(
        &self,
        envelope: &RequestEnvelope<R>,
        _cancel: &CancellationToken,
    ) -> AppResult<()> {
        tracing::debug!(
            request_id = %envelope.request_id(),
            kind = %envelope.kind(),
            subject = %envelope.subject(),
            caller = envelope.identity().subject(),
            "Executing request"
        );
        Ok(())
    }
}

#[async_trait]
impl<R: Request> PostProcessor<R> for RequestLogger {
    fn name(&self) -> &'static str {
        "request-logger"
    }

    async fn after(
        &self,
        envelope: &RequestEnvelope<R>,
        _response: &R::Response,
        _cancel: &CancellationToken,
    ) -> AppResult<()> {
        tracing::debug!(
            request_id = %envelope.request_id(),
            kind = %envelope.kind(),
            "Request executed successfully"
        );
        Ok(())
    }
}
