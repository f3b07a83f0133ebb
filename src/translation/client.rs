//! 流式补全客户端
//!
//! 每个翻译单元对应一次请求，返回的增量流是惰性的：只有被轮询时才会发起网络请求，
//! 丢弃流即中止传输。

use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;

use super::config::TranslationConfig;
use super::error::{TranslationError, TranslationResult};
use super::prompt::{build_system_prompt, TranslationContext};
use super::stream::decode_event_stream;

/// 增量文本流
pub type DeltaStream = BoxStream<'static, TranslationResult<String>>;

/// 单次流式翻译请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub text: String,
    pub target_lang: String,
    pub instructions: Option<String>,
    pub context: Option<TranslationContext>,
}

impl StreamRequest {
    pub fn new(text: impl Into<String>, target_lang: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            target_lang: target_lang.into(),
            instructions: None,
            context: None,
        }
    }

    pub fn with_instructions(mut self, instructions: Option<String>) -> Self {
        self.instructions = instructions;
        self
    }

    pub fn with_context(mut self, context: Option<TranslationContext>) -> Self {
        self.context = context;
        self
    }
}

/// 补全服务抽象
pub trait CompletionClient: Send + Sync {
    /// 发起一次流式翻译；非成功状态以单个错误项结束流
    fn stream_translate(&self, request: StreamRequest) -> DeltaStream;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    temperature: f32,
    max_tokens: usize,
}

/// 构建补全请求体
pub fn build_request_body(config: &TranslationConfig, request: &StreamRequest) -> serde_json::Value {
    let system_prompt = build_system_prompt(
        &request.target_lang,
        request.instructions.as_deref(),
        request.context.as_ref(),
    );

    let body = ChatCompletionRequest {
        model: &config.model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: &system_prompt,
            },
            ChatMessage {
                role: "user",
                content: &request.text,
            },
        ],
        stream: true,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };

    serde_json::to_value(body).unwrap_or_default()
}

/// 基于 reqwest 的上游客户端
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    config: TranslationConfig,
}

impl UpstreamClient {
    pub fn new(config: TranslationConfig) -> TranslationResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("solar-translate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TranslationError::ConfigError(format!("无法创建HTTP客户端: {}", e)))?;
        Ok(Self::with_http_client(config, http))
    }

    pub fn with_http_client(config: TranslationConfig, http: reqwest::Client) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    async fn open(
        http: reqwest::Client,
        config: TranslationConfig,
        request: StreamRequest,
    ) -> TranslationResult<DeltaStream> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| TranslationError::ConfigError("UPSTAGE_API_KEY 未配置".to_string()))?;

        let body = build_request_body(&config, &request);
        tracing::debug!(
            "发送流式翻译请求: {} 字符 -> {}",
            request.text.chars().count(),
            request.target_lang
        );

        let response = http
            .post(&config.api_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!("上游返回错误状态 {}: {}", status, message);
            return Err(TranslationError::UpstreamError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(decode_event_stream(response.bytes_stream()).boxed())
    }
}

impl CompletionClient for UpstreamClient {
    fn stream_translate(&self, request: StreamRequest) -> DeltaStream {
        let http = self.http.clone();
        let config = self.config.clone();

        stream::once(Self::open(http, config, request))
            .flat_map(|opened| match opened {
                Ok(deltas) => deltas,
                Err(error) => stream::once(async move { Err(error) }).boxed(),
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TranslationConfig {
        TranslationConfig {
            api_key: None,
            api_url: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            document_parse_url: "http://127.0.0.1:9/v1/document-digitization".to_string(),
            model: "solar-pro2-preview".to_string(),
            temperature: 0.3,
            max_tokens: 4000,
            chunk_words: 500,
            min_auto_translate_words: 3,
        }
    }

    #[test]
    fn test_request_body_shape() {
        let request = StreamRequest::new("안녕하세요", "en")
            .with_context(Some(TranslationContext::new("prev", "previous")));
        let body = build_request_body(&config(), &request);

        assert_eq!(body["model"], "solar-pro2-preview");
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 4000);
        assert!((body["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "안녕하세요");

        let system = body["messages"][0]["content"].as_str().unwrap();
        assert!(system.contains("to English."));
        assert!(system.contains("Previous translation: \"previous\""));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_before_network() {
        let client = UpstreamClient::new(config()).unwrap();
        let items: Vec<_> = client
            .stream_translate(StreamRequest::new("hello there friend", "ko"))
            .collect()
            .await;

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(TranslationError::ConfigError(_))));
    }
}
