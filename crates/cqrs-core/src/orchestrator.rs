//! Orchestrator
//!
//! 外部调用方使用的唯一入口：授权闸口 → 请求工厂 → 调度 →
//! 输出映射。被拒绝的调用在工厂和调度之前短路，不产生审计记录。

use std::sync::Arc;

use auth_core::{AuthorizationGate, CallerIdentity};
use errors::{AppError, SetupError};
use tokio_util::sync::CancellationToken;

use crate::{
    DispatchError, Dispatcher, Executed, OutputMapper, PipelineError, Request, RequestFactory,
};

/// 一个可编排的操作
///
/// 策略名是每个具体操作的静态配置
pub struct Operation<Raw: Send, R: Request> {
    policy: String,
    factory: Arc<dyn RequestFactory<Raw, R>>,
    mapper: Arc<dyn OutputMapper<R::Response>>,
}

impl<Raw: Send, R: Request> Operation<Raw, R> {
    pub fn new(
        policy: impl Into<String>,
        factory: Arc<dyn RequestFactory<Raw, R>>,
        mapper: Arc<dyn OutputMapper<R::Response>>,
    ) -> Self {
        Self {
            policy: policy.into(),
            factory,
            mapper,
        }
    }

    pub fn policy(&self) -> &str {
        &self.policy
    }
}

/// Orchestrator
pub struct Orchestrator {
    gate: AuthorizationGate,
    dispatcher: Arc<Dispatcher>,
}

impl Orchestrator {
    pub fn new(gate: AuthorizationGate, dispatcher: Arc<Dispatcher>) -> Self {
        Self { gate, dispatcher }
    }

    /// 启动期校验：策略可解析、Handler 已注册
    pub fn validate<Raw: Send, R: Request>(
        &self,
        operation: &Operation<Raw, R>,
    ) -> Result<(), SetupError> {
        if !self.gate.knows(operation.policy()) {
            return Err(SetupError::UnknownPolicy {
                policy: operation.policy().to_string(),
            });
        }
        if !self.dispatcher.has::<R>() {
            return Err(SetupError::MissingHandler {
                request: std::any::type_name::<R>(),
            });
        }
        Ok(())
    }

    /// 执行一次操作；恰好返回一个结果
    pub async fn execute<Raw: Send, R: Request>(
        &self,
        operation: &Operation<Raw, R>,
        raw: Raw,
        identity: &CallerIdentity,
        cancel: &CancellationToken,
    ) -> Result<Executed, PipelineError> {
        use metrics::{counter, histogram};
        let start = std::time::Instant::now();

        let result = self.execute_inner(operation, raw, identity, cancel).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(error) => error.outcome_label(),
        };
        counter!("pipeline_executions_total",
            "policy" => operation.policy().to_string(),
            "outcome" => outcome
        )
        .increment(1);
        histogram!("pipeline_execution_duration_ms").record(start.elapsed().as_millis() as f64);

        result
    }

    async fn execute_inner<Raw: Send, R: Request>(
        &self,
        operation: &Operation<Raw, R>,
        raw: Raw,
        identity: &CallerIdentity,
        cancel: &CancellationToken,
    ) -> Result<Executed, PipelineError> {
        // 1. 授权；拒绝则短路，不构造请求也不审计
        let decision = self.gate.evaluate(operation.policy(), identity).await;
        if !decision.allowed {
            tracing::debug!(
                policy = operation.policy(),
                caller = identity.subject(),
                "Execution forbidden"
            );
            return Err(PipelineError::Forbidden {
                policy: decision.policy,
                reason: decision
                    .reason
                    .unwrap_or_else(|| "Access denied".to_string()),
            });
        }

        // 2. 构造请求信封
        let envelope = operation
            .factory
            .build(raw, identity.clone(), cancel)
            .await
            .map_err(PipelineError::RequestBuildFailed)?;

        // 3. 调度
        let dispatched = self
            .dispatcher
            .dispatch(&envelope, cancel)
            .await
            .map_err(|error| match error {
                DispatchError::PreProcessor { processor, source } => {
                    PipelineError::PreProcessorFailed { processor, source }
                }
                DispatchError::Handler {
                    source: AppError::NotFound(message),
                } => PipelineError::NotFound(message),
                DispatchError::Handler { source } => PipelineError::HandlerFailed(source),
                DispatchError::NotRegistered { request } => {
                    // 启动校验保证不会到这里；到了也不伪装成拒绝
                    tracing::error!(request, "Handler registration escaped startup validation");
                    PipelineError::HandlerFailed(AppError::internal(format!(
                        "No handler registered for {request}"
                    )))
                }
            })?;

        // 4. 输出映射
        let output = operation
            .mapper
            .map(dispatched.response)
            .map_err(PipelineError::OutputMappingFailed)?;

        Ok(Executed {
            output,
            audit_failures: dispatched.audit_failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use auth_core::{
        CallerIdentity, Claims, PolicyEngine, PolicyRequirement, StaticPolicyEngine,
    };
    use errors::AppResult;
    use serde::Serialize;

    use super::*;
    use crate::{
        DispatcherBuilder, JsonMapper, MappedOutput, OperationKind, RequestEnvelope,
        RequestHandler,
    };

    #[derive(Debug, Clone, Serialize)]
    struct ViewNumber {
        id: u32,
    }

    impl Request for ViewNumber {
        type Response = u32;

        fn kind(&self) -> OperationKind {
            OperationKind::View
        }

        fn subject(&self) -> String {
            format!("number:{}", self.id)
        }
    }

    struct ViewNumberFactory {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RequestFactory<u32, ViewNumber> for ViewNumberFactory {
        async fn build(
            &self,
            raw: u32,
            identity: CallerIdentity,
            _cancel: &CancellationToken,
        ) -> AppResult<RequestEnvelope<ViewNumber>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            RequestEnvelope::new(ViewNumber { id: raw }, identity)
        }
    }

    struct ViewNumberHandler {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RequestHandler<ViewNumber> for ViewNumberHandler {
        async fn handle(&self, envelope: &RequestEnvelope<ViewNumber>) -> AppResult<u32> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if envelope.request().id == 999 {
                return Err(AppError::not_found("Number not found"));
            }
            Ok(envelope.request().id * 10)
        }
    }

    fn engine() -> Arc<dyn PolicyEngine> {
        Arc::new(
            StaticPolicyEngine::new()
                .with_policy(
                    PolicyRequirement::new("ViewNumber")
                        .with_permissions(vec!["numbers:read".to_string()]),
                )
                .unwrap(),
        )
    }

    fn reader() -> CallerIdentity {
        CallerIdentity::new(Claims::new(
            "user:reader",
            vec!["numbers:read".to_string()],
            Vec::new(),
        ))
    }

    fn stranger() -> CallerIdentity {
        CallerIdentity::new(Claims::new("user:stranger", Vec::new(), Vec::new()))
    }

    struct Fixture {
        orchestrator: Orchestrator,
        operation: Operation<u32, ViewNumber>,
        factory_calls: Arc<AtomicUsize>,
        handler_calls: Arc<AtomicUsize>,
    }

    fn fixture() -> Fixture {
        let factory_calls = Arc::new(AtomicUsize::new(0));
        let handler_calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(
            DispatcherBuilder::new()
                .register::<ViewNumber>(Arc::new(ViewNumberHandler {
                    calls: handler_calls.clone(),
                }))
                .unwrap()
                .build(),
        );
        let orchestrator = Orchestrator::new(AuthorizationGate::new(engine()), dispatcher);
        let operation = Operation::new(
            "ViewNumber",
            Arc::new(ViewNumberFactory {
                calls: factory_calls.clone(),
            }),
            Arc::new(JsonMapper),
        );
        Fixture {
            orchestrator,
            operation,
            factory_calls,
            handler_calls,
        }
    }

    #[tokio::test]
    async fn test_success_maps_response() {
        let fixture = fixture();
        fixture.orchestrator.validate(&fixture.operation).unwrap();

        let executed = fixture
            .orchestrator
            .execute(
                &fixture.operation,
                4,
                &reader(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(executed.is_clean());
        match executed.output {
            MappedOutput::Json(value) => assert_eq!(value, serde_json::json!(40)),
            other => panic!("expected JSON output, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_deny_short_circuits_factory_and_handler() {
        let fixture = fixture();

        let err = fixture
            .orchestrator
            .execute(
                &fixture.operation,
                4,
                &stranger(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Forbidden { .. }));
        assert_eq!(fixture.factory_calls.load(Ordering::SeqCst), 0);
        assert_eq!(fixture.handler_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handler_not_found_is_not_a_handler_failure() {
        let fixture = fixture();

        let err = fixture
            .orchestrator
            .execute(
                &fixture.operation,
                999,
                &reader(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::NotFound(_)));
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_cancelled_build_is_a_request_build_failure() {
        struct CancelAwareFactory;

        #[async_trait]
        impl RequestFactory<u32, ViewNumber> for CancelAwareFactory {
            async fn build(
                &self,
                raw: u32,
                identity: CallerIdentity,
                cancel: &CancellationToken,
            ) -> AppResult<RequestEnvelope<ViewNumber>> {
                if cancel.is_cancelled() {
                    return Err(AppError::cancelled("Request construction cancelled"));
                }
                RequestEnvelope::new(ViewNumber { id: raw }, identity)
            }
        }

        let fixture = fixture();
        let operation = Operation::new(
            "ViewNumber",
            Arc::new(CancelAwareFactory),
            Arc::new(JsonMapper),
        );

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = fixture
            .orchestrator
            .execute(&operation, 4, &reader(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::RequestBuildFailed(AppError::Cancelled(_))
        ));
        assert_eq!(fixture.handler_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_mapping_failure_is_its_own_outcome() {
        struct RejectingMapper;

        impl OutputMapper<u32> for RejectingMapper {
            fn map(&self, _response: u32) -> AppResult<MappedOutput> {
                Err(AppError::internal("Response cannot be represented"))
            }
        }

        let fixture = fixture();
        let operation = Operation::new(
            "ViewNumber",
            Arc::new(ViewNumberFactory {
                calls: fixture.factory_calls.clone(),
            }),
            Arc::new(RejectingMapper),
        );

        let err = fixture
            .orchestrator
            .execute(&operation, 4, &reader(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::OutputMappingFailed(_)));
        // Handler 已经运行过，映射失败不是 Handler 失败
        assert_eq!(fixture.handler_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_validate_rejects_unknown_policy_and_missing_handler() {
        let fixture = fixture();

        let unknown = Operation::<u32, ViewNumber>::new(
            "ViewPdf",
            Arc::new(ViewNumberFactory {
                calls: fixture.factory_calls.clone(),
            }),
            Arc::new(JsonMapper),
        );
        assert!(matches!(
            fixture.orchestrator.validate(&unknown),
            Err(SetupError::UnknownPolicy { .. })
        ));

        let empty_dispatcher = Arc::new(DispatcherBuilder::new().build());
        let orchestrator = Orchestrator::new(AuthorizationGate::new(engine()), empty_dispatcher);
        assert!(matches!(
            orchestrator.validate(&fixture.operation),
            Err(SetupError::MissingHandler { .. })
        ));
    }
}
