//! Dispatcher
//!
//! 请求类型与 Handler 一对一的调度器。注册表在启动阶段由
//! Builder 单线程写入，`build` 之后只读，可被并发调度共享。
//!
//! 调度阶段：Built → PreProcessing → Handling → PostProcessing →
//! Completed；Failed 终态只能从 PreProcessing 或 Handling 到达，
//! 后置处理器的失败不推翻已产生的响应。

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use errors::{AppError, SetupError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::{PostProcessor, PreProcessor, Request, RequestEnvelope, RequestHandler};

/// 调度阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPhase {
    Built,
    PreProcessing,
    Handling,
    PostProcessing,
    Completed,
    Failed,
}

impl std::fmt::Display for DispatchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchPhase::Built => write!(f, "built"),
            DispatchPhase::PreProcessing => write!(f, "pre_processing"),
            DispatchPhase::Handling => write!(f, "handling"),
            DispatchPhase::PostProcessing => write!(f, "post_processing"),
            DispatchPhase::Completed => write!(f, "completed"),
            DispatchPhase::Failed => write!(f, "failed"),
        }
    }
}

/// 调度错误
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No handler registered for {request}")]
    NotRegistered { request: &'static str },

    #[error("Pre-processor '{processor}' rejected the request: {source}")]
    PreProcessor {
        processor: &'static str,
        source: AppError,
    },

    #[error("Handler failed: {source}")]
    Handler { source: AppError },
}

/// 后置处理器失败（非致命）
#[derive(Debug)]
pub struct PostFailure {
    pub processor: &'static str,
    pub error: AppError,
}

/// 调度结果
///
/// 响应加上后置处理器的非致命失败，调用方可以区分
/// “操作成功但审计写入失败”与“操作失败”
#[derive(Debug)]
pub struct Dispatched<T> {
    pub response: T,
    pub audit_failures: Vec<PostFailure>,
}

struct Pipeline<R: Request> {
    handler: Arc<dyn RequestHandler<R>>,
    pre: Vec<Arc<dyn PreProcessor<R>>>,
    post: Vec<Arc<dyn PostProcessor<R>>>,
}

/// Dispatcher Builder
///
/// 启动阶段的唯一写入口；重复或缺失的注册是致命配置错误
pub struct DispatcherBuilder {
    pipelines: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherBuilder").finish_non_exhaustive()
    }
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            pipelines: HashMap::new(),
        }
    }

    /// 注册请求类型的唯一 Handler
    pub fn register<R: Request>(
        mut self,
        handler: Arc<dyn RequestHandler<R>>,
    ) -> Result<Self, SetupError> {
        let key = TypeId::of::<R>();
        if self.pipelines.contains_key(&key) {
            return Err(SetupError::DuplicateHandler {
                request: std::any::type_name::<R>(),
            });
        }
        self.pipelines.insert(
            key,
            Box::new(Pipeline::<R> {
                handler,
                pre: Vec::new(),
                post: Vec::new(),
            }),
        );
        Ok(self)
    }

    /// 追加前置处理器（按注册顺序执行）
    pub fn pre_process<R: Request>(
        mut self,
        processor: Arc<dyn PreProcessor<R>>,
    ) -> Result<Self, SetupError> {
        self.pipeline_mut::<R>()?.pre.push(processor);
        Ok(self)
    }

    /// 追加后置处理器（按注册顺序执行）
    pub fn post_process<R: Request>(
        mut self,
        processor: Arc<dyn PostProcessor<R>>,
    ) -> Result<Self, SetupError> {
        self.pipeline_mut::<R>()?.post.push(processor);
        Ok(self)
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            pipelines: self.pipelines,
        }
    }

    fn pipeline_mut<R: Request>(&mut self) -> Result<&mut Pipeline<R>, SetupError> {
        self.pipelines
            .get_mut(&TypeId::of::<R>())
            .and_then(|pipeline| pipeline.downcast_mut::<Pipeline<R>>())
            .ok_or(SetupError::ProcessorBeforeHandler {
                request: std::any::type_name::<R>(),
            })
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Dispatcher
///
/// `build` 之后不可变；并发调度无须加锁
pub struct Dispatcher {
    pipelines: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Dispatcher {
    pub fn has<R: Request>(&self) -> bool {
        self.pipeline::<R>().is_some()
    }

    /// 调度请求
    ///
    /// 取消信号在每个步骤前检查；后置处理器总是拿到信号，
    /// 已开始多步写入的处理器自行记录“已取消”结果
    pub async fn dispatch<R: Request>(
        &self,
        envelope: &RequestEnvelope<R>,
        cancel: &CancellationToken,
    ) -> Result<Dispatched<R::Response>, DispatchError> {
        let request = std::any::type_name::<R>();
        let Some(pipeline) = self.pipeline::<R>() else {
            tracing::error!(request, "Dispatch on unregistered request type");
            return Err(DispatchError::NotRegistered { request });
        };

        tracing::debug!(
            request,
            request_id = %envelope.request_id(),
            phase = %DispatchPhase::PreProcessing,
            "Dispatching"
        );
        for processor in &pipeline.pre {
            if cancel.is_cancelled() {
                return Err(DispatchError::PreProcessor {
                    processor: processor.name(),
                    source: AppError::cancelled("Dispatch cancelled during pre-processing"),
                });
            }
            if let Err(source) = processor.before(envelope, cancel).await {
                tracing::warn!(
                    request,
                    request_id = %envelope.request_id(),
                    processor = processor.name(),
                    phase = %DispatchPhase::Failed,
                    %source,
                    "Pre-processor aborted dispatch; handler will not run"
                );
                return Err(DispatchError::PreProcessor {
                    processor: processor.name(),
                    source,
                });
            }
        }

        if cancel.is_cancelled() {
            return Err(DispatchError::Handler {
                source: AppError::cancelled("Dispatch cancelled before the handler ran"),
            });
        }
        tracing::debug!(
            request,
            request_id = %envelope.request_id(),
            phase = %DispatchPhase::Handling,
            "Invoking handler"
        );
        let response = match pipeline.handler.handle(envelope).await {
            Ok(response) => response,
            Err(source) => {
                tracing::error!(
                    request,
                    request_id = %envelope.request_id(),
                    phase = %DispatchPhase::Failed,
                    %source,
                    "Handler failed"
                );
                return Err(DispatchError::Handler { source });
            }
        };

        tracing::debug!(
            request,
            request_id = %envelope.request_id(),
            phase = %DispatchPhase::PostProcessing,
            "Running post-processors"
        );
        let mut audit_failures = Vec::new();
        for processor in &pipeline.post {
            if let Err(error) = processor.after(envelope, &response, cancel).await {
                tracing::error!(
                    request,
                    request_id = %envelope.request_id(),
                    processor = processor.name(),
                    %error,
                    "Post-processor failed; response is preserved"
                );
                audit_failures.push(PostFailure {
                    processor: processor.name(),
                    error,
                });
            }
        }

        tracing::debug!(
            request,
            request_id = %envelope.request_id(),
            phase = %DispatchPhase::Completed,
            "Dispatch completed"
        );
        Ok(Dispatched {
            response,
            audit_failures,
        })
    }

    fn pipeline<R: Request>(&self) -> Option<&Pipeline<R>> {
        self.pipelines
            .get(&TypeId::of::<R>())
            .and_then(|pipeline| pipeline.downcast_ref::<Pipeline<R>>())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use auth_core::{CallerIdentity, Claims};
    use errors::AppResult;
    use serde::Serialize;

    use super::*;
    use crate::OperationKind;

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

    struct PingHandler {
        calls: Arc<AtomicUsize>,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl RequestHandler<Ping> for PingHandler {
        async fn handle(&self, envelope: &RequestEnvelope<Ping>) -> AppResult<u32> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push("handler".to_string());
            Ok(envelope.request().value * 2)
        }
    }

    struct Step {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl PreProcessor<Ping> for Step {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn before(
            &self,
            _envelope: &RequestEnvelope<Ping>,
            _cancel: &CancellationToken,
        ) -> AppResult<()> {
            self.log.lock().unwrap().push(format!("pre:{}", self.name));
            if self.fail {
                return Err(AppError::storage("audit write failed"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl PostProcessor<Ping> for Step {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn after(
            &self,
            _envelope: &RequestEnvelope<Ping>,
            _response: &u32,
            _cancel: &CancellationToken,
        ) -> AppResult<()> {
            self.log.lock().unwrap().push(format!("post:{}", self.name));
            if self.fail {
                return Err(AppError::storage("audit write failed"));
            }
            Ok(())
        }
    }

    fn envelope(value: u32) -> RequestEnvelope<Ping> {
        RequestEnvelope::new(
            Ping { value },
            CallerIdentity::new(Claims::new("user:test", Vec::new(), Vec::new())),
        )
        .unwrap()
    }

    fn step(name: &'static str, log: &Arc<Mutex<Vec<String>>>, fail: bool) -> Arc<Step> {
        Arc::new(Step {
            name,
            log: Arc::clone(log),
            fail,
        })
    }

    #[test]
    fn test_duplicate_registration_is_a_setup_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let err = DispatcherBuilder::new()
            .register::<Ping>(Arc::new(PingHandler {
                calls: calls.clone(),
                log: log.clone(),
            }))
            .unwrap()
            .register::<Ping>(Arc::new(PingHandler { calls, log }))
            .unwrap_err();
        assert!(matches!(err, SetupError::DuplicateHandler { .. }));
    }

    #[test]
    fn test_processor_before_handler_is_a_setup_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let err = DispatcherBuilder::new()
            .pre_process::<Ping>(step("a", &log, false))
            .unwrap_err();
        assert!(matches!(err, SetupError::ProcessorBeforeHandler { .. }));
    }

    #[tokio::test]
    async fn test_processors_run_in_order_around_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = DispatcherBuilder::new()
            .register::<Ping>(Arc::new(PingHandler {
                calls: calls.clone(),
                log: log.clone(),
            }))
            .unwrap()
            .pre_process::<Ping>(step("a", &log, false))
            .unwrap()
            .pre_process::<Ping>(step("b", &log, false))
            .unwrap()
            .post_process::<Ping>(step("c", &log, false))
            .unwrap()
            .post_process::<Ping>(step("d", &log, false))
            .unwrap()
            .build();

        let dispatched = dispatcher
            .dispatch(&envelope(21), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(dispatched.response, 42);
        assert!(dispatched.audit_failures.is_empty());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["pre:a", "pre:b", "handler", "post:c", "post:d"]
        );
    }

    #[tokio::test]
    async fn test_pre_processor_failure_suppresses_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = DispatcherBuilder::new()
            .register::<Ping>(Arc::new(PingHandler {
                calls: calls.clone(),
                log: log.clone(),
            }))
            .unwrap()
            .pre_process::<Ping>(step("a", &log, false))
            .unwrap()
            .pre_process::<Ping>(step("b", &log, true))
            .unwrap()
            .post_process::<Ping>(step("c", &log, false))
            .unwrap()
            .build();

        let err = dispatcher
            .dispatch(&envelope(1), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DispatchError::PreProcessor { processor: "b", .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(*log.lock().unwrap(), vec!["pre:a", "pre:b"]);
    }

    #[tokio::test]
    async fn test_post_processor_failure_preserves_response() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = DispatcherBuilder::new()
            .register::<Ping>(Arc::new(PingHandler {
                calls,
                log: log.clone(),
            }))
            .unwrap()
            .post_process::<Ping>(step("c", &log, true))
            .unwrap()
            .post_process::<Ping>(step("d", &log, false))
            .unwrap()
            .build();

        let dispatched = dispatcher
            .dispatch(&envelope(3), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(dispatched.response, 6);
        assert_eq!(dispatched.audit_failures.len(), 1);
        assert_eq!(dispatched.audit_failures[0].processor, "c");
        // 失败的后置处理器不影响后续处理器
        assert_eq!(*log.lock().unwrap(), vec!["handler", "post:c", "post:d"]);
    }

    #[tokio::test]
    async fn test_cancellation_before_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = DispatcherBuilder::new()
            .register::<Ping>(Arc::new(PingHandler {
                calls: calls.clone(),
                log: log.clone(),
            }))
            .unwrap()
            .build();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = dispatcher.dispatch(&envelope(1), &cancel).await.unwrap_err();

        assert!(matches!(
            err,
            DispatchError::Handler {
                source: AppError::Cancelled(_)
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dispatch_on_unregistered_type() {
        let dispatcher = DispatcherBuilder::new().build();
        let err = dispatcher
            .dispatch(&envelope(1), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NotRegistered { .. }));
    }
}
