//! arbor-config - 配置加载库

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// 授权策略规则配置
///
/// 策略名在配置中约定，启动时校验；permissions/roles 任一匹配即满足
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyRuleConfig {
    pub name: String,
    #[serde(default)]
    pub permissions_any_of: Vec<String>,
    #[serde(default)]
    pub roles_any_of: Vec<String>,
}

/// 应用配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub policies: Vec<PolicyRuleConfig>,
}

impl AppConfig {
    /// 从 TOML 文件加载，APP_ 前缀的环境变量可覆盖
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let config = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("APP_").split("__"))
            .extract()?;
        Ok(config)
    }

    /// 从 TOML 字符串加载
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config = Figment::new().merge(Toml::string(toml)).extract()?;
        Ok(config)
    }
}
