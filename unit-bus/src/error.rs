//! 分发层统一错误定义
//!
//! 覆盖编组（marshal）、实例化、Mock 校验、执行器与事件发布等环节，
//! 除事件发布（已提交后只记日志）外，失败都同步返回给 `run` / `run_async` / `run_in_queue` 的调用方，本层不做重试。
//!
use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AppError {
    // --- 编组/实例化 ---
    #[error("unable to map parameter [{param}] to unit [{unit}]")]
    Construction { unit: String, param: String },

    #[error("invalid argument: unit={unit}, param={param}, reason={reason}")]
    InvalidArgument {
        unit: String,
        param: String,
        reason: String,
    },

    #[error("instantiation failed: unit={unit}, reason={reason}")]
    Instantiation { unit: String, reason: String },

    // --- 测试替身 ---
    #[error("mock mismatch: unit={unit}, expected one of {expected}, found {actual}")]
    MockMismatch {
        unit: String,
        expected: String,
        actual: String,
    },

    // --- 注册表 ---
    #[error("unit not found: {0}")]
    UnitNotFound(String),

    #[error("handler not found: {0}")]
    HandlerNotFound(&'static str),

    #[error("unit already registered: unit={unit}")]
    AlreadyRegistered { unit: &'static str },

    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    // --- 执行器/事件 ---
    #[error("queue error: queue={queue}, reason={reason}")]
    Queue { queue: String, reason: String },

    #[error("event publish error: {reason}")]
    EventPublish { reason: String },

    // --- 通用 ---
    #[error("validation: {0}")]
    Validation(String),

    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
}

/// 统一 Result 类型别名
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub(crate) fn construction(unit: impl Into<String>, param: impl Into<String>) -> Self {
        AppError::Construction {
            unit: unit.into(),
            param: param.into(),
        }
    }

    pub(crate) fn instantiation(unit: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Instantiation {
            unit: unit.into(),
            reason: reason.into(),
        }
    }
}
