//! bastion-errors - 统一错误处理
//!
//! 错误分为两类：写入前即可判定的错误 (NotFound / Validation / Conflict / Forbidden)，
//! 以及实体已提交后策略存储写入失败导致的 `DesyncRisk`。

use thiserror::Error;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(String),

    /// 策略存储写入失败，关系库状态可能领先于策略存储
    #[error("Policy store desynchronized: {0}")]
    DesyncRisk(String),

    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn desync_risk(msg: impl Into<String>) -> Self {
        Self::DesyncRisk(msg.into())
    }

    pub fn failed_precondition(msg: impl Into<String>) -> Self {
        Self::FailedPrecondition(msg.into())
    }

    /// 是否为实体提交后的策略存储失败 (只能作为警告上报)
    pub fn is_desync_risk(&self) -> bool {
        matches!(self, Self::DesyncRisk(_))
    }

    /// 错误类别名称，用于日志与指标标签
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::Forbidden(_) => "forbidden",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal",
            Self::Database(_) => "database",
            Self::DesyncRisk(_) => "desync_risk",
            Self::FailedPrecondition(_) => "failed_precondition",
        }
    }
}

/// Result 类型别名
pub type AppResult<T> = Result<T, AppError>;
