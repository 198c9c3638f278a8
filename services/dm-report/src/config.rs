//! 服务配置
//!
//! 策略表来自配置（TOML/环境变量），启动时转换为静态策略
//! 引擎；闸口校验会拒绝配置中缺失的策略名

use ::config::PolicyRuleConfig;
use auth_core::{PolicyRequirement, StaticPolicyEngine};
use errors::SetupError;

use crate::application::service::policy;

/// 开发/测试用的缺省策略表
pub fn default_policies() -> Vec<PolicyRuleConfig> {
    [
        (policy::ADD_REPORT, "reports:write"),
        (policy::EDIT_REPORT, "reports:write"),
        (policy::DELETE_REPORT, "reports:delete"),
        (policy::LIST_REPORTS, "reports:read"),
        (policy::VIEW_SPREADSHEET, "reports:export"),
    ]
    .into_iter()
    .map(|(name, permission)| PolicyRuleConfig {
        name: name.to_string(),
        permissions_any_of: vec![permission.to_string()],
        roles_any_of: vec!["admin".to_string()],
    })
    .collect()
}

/// 把配置的策略表转换为静态策略引擎
pub fn policy_engine(rules: &[PolicyRuleConfig]) -> Result<StaticPolicyEngine, SetupError> {
    let mut engine = StaticPolicyEngine::new();
    for rule in rules {
        engine = engine.with_policy(
            PolicyRequirement::new(&rule.name)
                .with_permissions(rule.permissions_any_of.clone())
                .with_roles(rule.roles_any_of.clone()),
        )?;
    }
    Ok(engine)
}
