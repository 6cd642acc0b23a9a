//! bastion-config - 配置加载库

use std::net::SocketAddr;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use thiserror::Error;

use secrecy::Secret;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    // 开发环境: 10, 生产环境: 50
    match std::env::var("APP_ENV").as_deref() {
        Ok("production") => 50,
        _ => 10,
    }
}

/// Redis 配置
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Secret<String>,
    /// 频道名前缀
    #[serde(default)]
    pub key_prefix: Option<String>,
}

/// 遥测配置
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Prometheus 抓取端点监听地址
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: SocketAddr,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 9100))
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            metrics_addr: default_metrics_addr(),
        }
    }
}

/// RBAC 标识配置
///
/// 策略存储中主体标识的格式为 `{prefix}{separator}{code}`。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RbacConfig {
    #[serde(default = "default_user_prefix")]
    pub user_prefix: String,
    #[serde(default = "default_role_prefix")]
    pub role_prefix: String,
    #[serde(default = "default_group_prefix")]
    pub group_prefix: String,
    #[serde(default = "default_department_prefix")]
    pub department_prefix: String,
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_user_prefix() -> String {
    "user".to_string()
}

fn default_role_prefix() -> String {
    "role".to_string()
}

fn default_group_prefix() -> String {
    "group".to_string()
}

fn default_department_prefix() -> String {
    "department".to_string()
}

fn default_separator() -> String {
    "_".to_string()
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self {
            user_prefix: default_user_prefix(),
            role_prefix: default_role_prefix(),
            group_prefix: default_group_prefix(),
            department_prefix: default_department_prefix(),
            separator: default_separator(),
        }
    }
}

/// Casbin 配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CasbinConfig {
    /// 模型文件路径，未配置时使用内置模型
    pub model_path: Option<String>,
}

/// 同步运行配置
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// 实体变更事件频道
    #[serde(default = "default_event_channel")]
    pub event_channel: String,
}

fn default_event_channel() -> String {
    "rbac.entity.changes".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            event_channel: default_event_channel(),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_name: String,
    pub app_env: String,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub rbac: RbacConfig,
    #[serde(default)]
    pub casbin: CasbinConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    pub fn load(config_dir: &str) -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let figment = Figment::new()
            .merge(Toml::file(format!("{}/default.toml", config_dir)))
            .merge(Toml::file(format!("{}/{}.toml", config_dir, env)))
            .merge(Env::prefixed("").split("__"));

        Self::from_figment(figment)
    }

    /// 从已组装的 Figment 提取配置
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        Ok(figment.extract()?)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    /// 是否为开发环境
    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }
}
