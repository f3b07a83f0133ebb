//! Web 模块的数据类型定义

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::admission::RateLimits;
use crate::translation::client::{CompletionClient, UpstreamClient};
use crate::translation::config::TranslationConfig;
use crate::translation::document::{DocumentParser, PageContent, UpstageDocumentParser};
use crate::translation::error::TranslationResult;
use crate::translation::prompt::TranslationContext;
use crate::web::config::WebConfig;

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<dyn CompletionClient>,
    pub parser: Arc<dyn DocumentParser>,
    pub limits: RateLimits,
    pub max_text_length: usize,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// 使用真实的上游客户端创建
    pub fn from_config(
        translation: &TranslationConfig,
        web: &WebConfig,
        limits: RateLimits,
    ) -> TranslationResult<Self> {
        if !translation.has_api_key() {
            tracing::warn!("UPSTAGE_API_KEY 未配置，翻译与上传请求将返回 500");
        }

        Ok(Self {
            client: Arc::new(UpstreamClient::new(translation.clone())?),
            parser: Arc::new(UpstageDocumentParser::new(translation)),
            limits,
            max_text_length: web.max_text_length,
            max_upload_bytes: web.max_upload_bytes,
        })
    }
}

/// 翻译请求
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub target_lang: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub previous_context: Option<TranslationContext>,
}

/// 上传响应
///
/// 单段内容时只有 `content`，按页拆分时只有 `pages`。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<PageContent>>,
    pub filename: String,
    pub file_type: String,
    pub file_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_multi_page: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<usize>,
}
