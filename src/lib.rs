//! # Solar Translate
//!
//! 基于 Upstage Solar 的流式文档翻译后端。
//!
//! ## 模块组织
//!
//! - `translation` - 分块、流式客户端与翻译会话
//! - `admission` - 按客户端标识的固定窗口限流
//! - `env` - 环境变量配置
//! - `web` - HTTP 接口（可选）

pub mod admission;
pub mod env;
pub mod translation;
#[cfg(feature = "web")]
pub mod web;

pub use admission::{AdmissionController, AdmissionDecision, RateLimitOptions, RateLimitStore, RateLimits};
pub use translation::{TranslationError, TranslationResult, TranslationSession};
