//! 翻译模块
//!
//! 分块、顺序、可取消的流式翻译管道：
//! - **chunker**: 按句子边界切分超长文本
//! - **client** / **stream** / **prompt**: 单次流式补全请求及事件流解码
//! - **session**: 翻译会话，逐单元顺序翻译并传递上下文
//! - **document**: 外部文档解析服务的适配与响应归一化
//! - **config** / **error**: 配置与错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use solar_translate::translation::{SessionConfig, TranslationConfig, TranslationSession, UpstreamClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TranslationConfig::from_env()?;
//! let client = Arc::new(UpstreamClient::new(config.clone())?);
//! let session = TranslationSession::new(client, "ko", SessionConfig::from(&config));
//!
//! if let Some(run) = session.load_document("A long document. With several sentences.") {
//!     run.wait().await;
//! }
//! println!("{}", session.full_translation());
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

pub mod chunker;
pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod languages;
pub mod prompt;
pub mod session;
pub mod stream;

// ============================================================================
// 公共API导出
// ============================================================================

pub use chunker::{chunk_text, count_words, needs_chunking, DEFAULT_CHUNK_WORDS};
pub use client::{CompletionClient, DeltaStream, StreamRequest, UpstreamClient};
pub use config::TranslationConfig;
pub use document::{DocumentParser, PageContent, ParsedDocument, UploadedFile, UpstageDocumentParser};
pub use error::{TranslationError, TranslationResult};
pub use languages::resolve_language_name;
pub use prompt::{build_system_prompt, TranslationContext};
pub use session::{
    EditOutcome, ScheduledRun, SessionConfig, SessionEvent, TranslationSession, Unit, UnitOutcome,
    UnitStatus,
};
pub use stream::{decode_event_stream, SseDecoder, SseEvent};
