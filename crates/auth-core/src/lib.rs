//! arbor-auth-core - 授权核心库
//!
//! Claims/CallerIdentity/策略引擎/授权闸口

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use errors::{AppError, AppResult, SetupError};
use serde::{Deserialize, Serialize};

/// 调用方 Claims
///
/// 管道只读取，不修改、不序列化传输
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user identifier)
    pub subject: String,
    /// Permissions
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Roles
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Claims {
    pub fn new(
        subject: impl Into<String>,
        permissions: Vec<String>,
        roles: Vec<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            permissions,
            roles,
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_any_permission(&self, permissions: &[String]) -> bool {
        permissions.iter().any(|p| self.has_permission(p))
    }

    pub fn has_any_role(&self, roles: &[String]) -> bool {
        roles.iter().any(|r| self.has_role(r))
    }
}

/// 调用方身份
///
/// Claims 的不可变包装，整条管道按引用传递，克隆是廉价的
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    claims: Arc<Claims>,
}

impl CallerIdentity {
    pub fn new(claims: Claims) -> Self {
        Self {
            claims: Arc::new(claims),
        }
    }

    /// 未认证的调用方；请求工厂会拒绝
    pub fn anonymous() -> Self {
        Self::new(Claims::new("", Vec::new(), Vec::new()))
    }

    pub fn subject(&self) -> &str {
        &self.claims.subject
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn is_anonymous(&self) -> bool {
        self.claims.subject.is_empty()
    }
}

/// 授权决策
///
/// 每次编排执行前产生一次；拒绝是一等结果，不是错误
#[derive(Debug, Clone)]
pub struct AuthorizationDecision {
    /// 是否允许
    pub allowed: bool,
    /// 评估的策略名
    pub policy: String,
    /// 拒绝原因（如果被拒绝）
    pub reason: Option<String>,
}

impl AuthorizationDecision {
    pub fn allow(policy: impl Into<String>) -> Self {
        Self {
            allowed: true,
            policy: policy.into(),
            reason: None,
        }
    }

    pub fn deny(policy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            policy: policy.into(),
            reason: Some(reason.into()),
        }
    }
}

/// 策略要求
///
/// permissions/roles 任一命中即满足；两者皆空表示仅要求已认证
#[derive(Debug, Clone)]
pub struct PolicyRequirement {
    pub name: String,
    pub permissions_any_of: Vec<String>,
    pub roles_any_of: Vec<String>,
}

impl PolicyRequirement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            permissions_any_of: Vec::new(),
            roles_any_of: Vec::new(),
        }
    }

    pub fn with_permissions(mut self, permissions: Vec<String>) -> Self {
        self.permissions_any_of = permissions;
        self
    }

    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles_any_of = roles;
        self
    }

    fn satisfied_by(&self, claims: &Claims) -> bool {
        if self.permissions_any_of.is_empty() && self.roles_any_of.is_empty() {
            return true;
        }
        claims.has_any_permission(&self.permissions_any_of)
            || claims.has_any_role(&self.roles_any_of)
    }
}

/// 策略引擎接口
///
/// 策略名是外部约定的不透明标识；引擎可能访问外部策略存储
#[async_trait]
pub trait PolicyEngine: Send + Sync {
    /// 策略名是否可解析（启动校验用）
    fn contains(&self, policy: &str) -> bool;

    /// 评估策略；正常的拒绝返回 Ok(deny)，不返回错误
    async fn evaluate(
        &self,
        policy: &str,
        identity: &CallerIdentity,
    ) -> AppResult<AuthorizationDecision>;
}

/// 进程内静态策略引擎
#[derive(Debug)]
pub struct StaticPolicyEngine {
    policies: HashMap<String, PolicyRequirement>,
}

impl StaticPolicyEngine {
    pub fn new() -> Self {
        Self {
            policies: HashMap::new(),
        }
    }

    /// 注册策略；重名是配置错误
    pub fn with_policy(mut self, requirement: PolicyRequirement) -> Result<Self, SetupError> {
        if self.policies.contains_key(&requirement.name) {
            return Err(SetupError::DuplicatePolicy {
                policy: requirement.name,
            });
        }
        self.policies
            .insert(requirement.name.clone(), requirement);
        Ok(self)
    }
}

impl Default for StaticPolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PolicyEngine for StaticPolicyEngine {
    fn contains(&self, policy: &str) -> bool {
        self.policies.contains_key(policy)
    }

    async fn evaluate(
        &self,
        policy: &str,
        identity: &CallerIdentity,
    ) -> AppResult<AuthorizationDecision> {
        let Some(requirement) = self.policies.get(policy) else {
            // 启动校验应当已排除；到这里属于配置逃逸
            return Err(AppError::internal(format!("Unknown policy '{policy}'")));
        };

        if identity.is_anonymous() {
            return Ok(AuthorizationDecision::deny(policy, "Caller is anonymous"));
        }

        if requirement.satisfied_by(identity.claims()) {
            Ok(AuthorizationDecision::allow(policy))
        } else {
            Ok(AuthorizationDecision::deny(
                policy,
                "No matching permission or role",
            ))
        }
    }
}

/// 授权闸口
///
/// 在任何副作用发生之前评估命名策略；
/// 策略名在启动时通过 `validated` 解析，不可解析立即失败
pub struct AuthorizationGate {
    engine: Arc<dyn PolicyEngine>,
}

impl std::fmt::Debug for AuthorizationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationGate").finish_non_exhaustive()
    }
}

impl AuthorizationGate {
    pub fn new(engine: Arc<dyn PolicyEngine>) -> Self {
        Self { engine }
    }

    /// 构造并校验所有需要的策略名
    pub fn validated(
        engine: Arc<dyn PolicyEngine>,
        required_policies: &[&str],
    ) -> Result<Self, SetupError> {
        for policy in required_policies {
            if !engine.contains(policy) {
                return Err(SetupError::UnknownPolicy {
                    policy: (*policy).to_string(),
                });
            }
        }
        Ok(Self::new(engine))
    }

    pub fn knows(&self, policy: &str) -> bool {
        self.engine.contains(policy)
    }

    /// 评估策略
    ///
    /// 引擎自身出错时 fail-closed：高声记录并拒绝，绝不静默
    pub async fn evaluate(&self, policy: &str, identity: &CallerIdentity) -> AuthorizationDecision {
        use metrics::{counter, histogram};
        let start = std::time::Instant::now();

        let decision = match self.engine.evaluate(policy, identity).await {
            Ok(decision) => decision,
            Err(error) => {
                tracing::error!(policy, %error, "Policy evaluation failed; denying");
                counter!("authorization_check_errors_total").increment(1);
                AuthorizationDecision::deny(policy, "Authorization unavailable")
            }
        };

        counter!("authorization_checks_total",
            "policy" => policy.to_string(),
            "allowed" => decision.allowed.to_string()
        )
        .increment(1);

        histogram!("authorization_check_duration_ms").record(start.elapsed().as_millis() as f64);

        decision
    }
}
