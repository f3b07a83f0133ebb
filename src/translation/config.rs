//! 翻译配置
//!
//! 从环境变量加载，带验证和默认值

use serde::{Deserialize, Serialize};

use crate::env::{chunking, upstream, EnvVar};
use crate::translation::error::{TranslationError, TranslationResult};

/// 配置常量
pub mod constants {
    pub const DEFAULT_API_URL: &str = "https://api.upstage.ai/v1/chat/completions";
    pub const DEFAULT_DOCUMENT_PARSE_URL: &str = "https://api.upstage.ai/v1/document-digitization";
    pub const DEFAULT_MODEL: &str = "solar-pro2-preview";
    pub const DEFAULT_TEMPERATURE: f32 = 0.3;
    pub const DEFAULT_MAX_TOKENS: usize = 4000;
    pub const DEFAULT_MIN_AUTO_TRANSLATE_WORDS: usize = 3;

    /// 翻译失败时写入单元的占位文本
    pub const FAILURE_PLACEHOLDER: &str = "Translation failed. Please try again.";
}

/// 翻译服务配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// 上游 API 密钥，缺失时所有请求以配置错误失败
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_url: String,
    pub document_parse_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    /// 超过该词数的输入会被分块
    pub chunk_words: usize,
    /// 编辑后自动翻译需要超过的词数
    pub min_auto_translate_words: usize,
}

impl TranslationConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> TranslationResult<Self> {
        let config = Self {
            api_key: upstream::ApiKey::get().ok(),
            api_url: upstream::ApiUrl::get()?,
            document_parse_url: upstream::DocumentParseUrl::get()?,
            model: upstream::Model::get()?,
            temperature: constants::DEFAULT_TEMPERATURE,
            max_tokens: upstream::MaxTokens::get()?,
            chunk_words: chunking::ChunkWords::get()?,
            min_auto_translate_words: chunking::MinAutoTranslateWords::get()?,
        };

        config.validate()?;
        Ok(config)
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.api_url.trim().is_empty() {
            return Err(TranslationError::ConfigError("API URL不能为空".to_string()));
        }

        if self.model.trim().is_empty() {
            return Err(TranslationError::ConfigError("模型名称不能为空".to_string()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(TranslationError::ConfigError(
                "temperature 必须在 0 到 2 之间".to_string(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(TranslationError::ConfigError("max_tokens 必须大于0".to_string()));
        }

        if self.chunk_words == 0 {
            return Err(TranslationError::ConfigError("分块阈值必须大于0".to_string()));
        }

        Ok(())
    }

    /// 是否配置了 API 密钥
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.trim().is_empty())
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_document_parse_url(mut self, url: impl Into<String>) -> Self {
        self.document_parse_url = url.into();
        self
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self::from_env().unwrap_or_else(|e| {
            tracing::warn!("Failed to load translation config from env: {}, using defaults", e);
            Self {
                api_key: None,
                api_url: constants::DEFAULT_API_URL.to_string(),
                document_parse_url: constants::DEFAULT_DOCUMENT_PARSE_URL.to_string(),
                model: constants::DEFAULT_MODEL.to_string(),
                temperature: constants::DEFAULT_TEMPERATURE,
                max_tokens: constants::DEFAULT_MAX_TOKENS,
                chunk_words: crate::translation::chunker::DEFAULT_CHUNK_WORDS,
                min_auto_translate_words: constants::DEFAULT_MIN_AUTO_TRANSLATE_WORDS,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TranslationConfig {
        TranslationConfig {
            api_key: Some("up_test".to_string()),
            api_url: constants::DEFAULT_API_URL.to_string(),
            document_parse_url: constants::DEFAULT_DOCUMENT_PARSE_URL.to_string(),
            model: constants::DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            max_tokens: 4000,
            chunk_words: 500,
            min_auto_translate_words: 3,
        }
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(sample().validate().is_ok());
        assert!(sample().has_api_key());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = sample();
        config.model = " ".to_string();
        assert!(matches!(config.validate(), Err(TranslationError::ConfigError(_))));

        let mut config = sample();
        config.temperature = 3.0;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.chunk_words = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_is_never_serialized() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(!json.contains("up_test"));
    }
}
