//! 翻译模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制

use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::env::EnvError;

/// 翻译错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// 输入验证错误
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 准入控制拒绝
    #[error("请求速率过快，已达到限制 (上限 {limit}，重置时间 {reset_at})")]
    RateLimitExceeded {
        limit: u32,
        reset_at: DateTime<Utc>,
    },

    /// 上游服务返回非成功状态
    #[error("上游服务错误 {status}: {message}")]
    UpstreamError { status: u16, message: String },

    /// 网络错误
    #[error("网络错误: {0}")]
    NetworkError(String),

    /// 事件流中的单行无法解析，只记录不传播
    #[error("协议偏差: {0}")]
    ProtocolSkew(String),

    /// 被更新的请求取代或被调用方中止
    #[error("翻译已取消")]
    Cancelled,

    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 文档解析服务错误
    #[error("文档解析错误: {0}")]
    DocumentParseError(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl TranslationError {
    /// 检查错误是否可由用户重试
    ///
    /// 系统本身从不自动重试，这里只用于提示。
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::UpstreamError { status, .. } => *status == 429 || *status >= 500,
            TranslationError::NetworkError(_) => true,
            TranslationError::DocumentParseError(_) => true,
            TranslationError::RateLimitExceeded { .. } => false, // 需要等待窗口重置
            TranslationError::InvalidInput(_) => false,
            TranslationError::ProtocolSkew(_) => false,
            TranslationError::Cancelled => false,
            TranslationError::ConfigError(_) => false,
            TranslationError::InternalError(_) => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::InvalidInput(_) => ErrorSeverity::Info,
            TranslationError::RateLimitExceeded { .. } => ErrorSeverity::Warning,
            TranslationError::UpstreamError { .. } => ErrorSeverity::Error,
            TranslationError::NetworkError(_) => ErrorSeverity::Warning,
            TranslationError::ProtocolSkew(_) => ErrorSeverity::Info,
            TranslationError::Cancelled => ErrorSeverity::Info,
            TranslationError::ConfigError(_) => ErrorSeverity::Critical,
            TranslationError::DocumentParseError(_) => ErrorSeverity::Error,
            TranslationError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::InvalidInput(_) => ErrorCategory::Validation,
            TranslationError::RateLimitExceeded { .. } => ErrorCategory::Admission,
            TranslationError::UpstreamError { .. } => ErrorCategory::Upstream,
            TranslationError::NetworkError(_) => ErrorCategory::Upstream,
            TranslationError::ProtocolSkew(_) => ErrorCategory::Protocol,
            TranslationError::Cancelled => ErrorCategory::Cancellation,
            TranslationError::ConfigError(_) => ErrorCategory::Configuration,
            TranslationError::DocumentParseError(_) => ErrorCategory::Extraction,
            TranslationError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// 是否为取消；取消不是失败，不应展示给用户
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TranslationError::Cancelled)
    }

    /// 面向最终用户的英文提示
    pub fn user_message(&self) -> String {
        match self {
            TranslationError::InvalidInput(msg) => msg.clone(),
            TranslationError::RateLimitExceeded { reset_at, .. } => {
                let wait_minutes = minutes_until(*reset_at);
                format!(
                    "Rate limit reached. Please wait {} minutes before trying again.",
                    wait_minutes
                )
            }
            TranslationError::UpstreamError { status, .. } => {
                format!("Translation failed: upstream returned status {}", status)
            }
            TranslationError::NetworkError(_) => {
                "Translation failed: could not reach the translation service".to_string()
            }
            TranslationError::ConfigError(_) => "Translation service is not configured".to_string(),
            TranslationError::DocumentParseError(_) => {
                "Document parsing failed. Please try again.".to_string()
            }
            TranslationError::Cancelled => "Translation cancelled".to_string(),
            TranslationError::ProtocolSkew(_) | TranslationError::InternalError(_) => {
                "Translation failed".to_string()
            }
        }
    }
}

/// 距离重置时间还有多少分钟（向上取整，至少 1 分钟）
fn minutes_until(reset_at: DateTime<Utc>) -> i64 {
    let seconds = (reset_at - Utc::now()).num_seconds().max(0);
    ((seconds + 59) / 60).max(1)
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Validation,
    Admission,
    Upstream,
    Protocol,
    Cancellation,
    Configuration,
    Extraction,
    Internal,
}

/// 标准错误转换
impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => TranslationError::UpstreamError {
                status: status.as_u16(),
                message: error.to_string(),
            },
            None => TranslationError::NetworkError(error.to_string()),
        }
    }
}

impl From<EnvError> for TranslationError {
    fn from(error: EnvError) -> Self {
        TranslationError::ConfigError(error.to_string())
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误
    pub fn log_error<C: fmt::Display>(context: C, error: &TranslationError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("{}: {}", context, error),
            ErrorSeverity::Warning => tracing::warn!("{}: {}", context, error),
            ErrorSeverity::Error => tracing::error!("{}: {}", context, error),
            ErrorSeverity::Critical => tracing::error!("{} (严重): {}", context, error),
        }
    }
}
