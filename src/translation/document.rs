//! 文档解析适配
//!
//! 文本提取委托给外部文档解析服务，这里只负责上传、类型判断和响应归一化。

use std::collections::BTreeMap;

use futures::future::BoxFuture;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value;

use super::config::TranslationConfig;
use super::error::{TranslationError, TranslationResult};

/// 文档解析服务支持的 MIME 类型
pub const SUPPORTED_DOCUMENT_TYPES: &[&str] = &[
    // 图片
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/bmp",
    "image/tiff",
    "image/heic",
    // 文档
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    // 韩文办公格式
    "application/x-hwp",
    "application/vnd.hancom.hwpx",
];

/// 上传文件大小上限
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// 单页内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContent {
    pub page_number: usize,
    pub content: String,
}

/// 归一化后的解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedDocument {
    /// 整篇文档一段内容
    Single(String),
    /// 按页拆分的内容，`total_pages` 为服务端报告的页数
    Pages {
        pages: Vec<PageContent>,
        total_pages: usize,
    },
}

/// 待解析的上传文件
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// 纯文本文件直接读取，不经过解析服务
    pub fn is_plain_text(&self) -> bool {
        is_plain_text(&self.content_type, &self.filename)
    }
}

pub fn is_plain_text(content_type: &str, filename: &str) -> bool {
    content_type == "text/plain" || filename.to_lowercase().ends_with(".txt")
}

pub fn is_supported_type(content_type: &str) -> bool {
    SUPPORTED_DOCUMENT_TYPES.contains(&content_type)
}

/// 文档解析服务抽象
pub trait DocumentParser: Send + Sync {
    fn parse(&self, file: UploadedFile) -> BoxFuture<'static, TranslationResult<ParsedDocument>>;
}

/// Upstage 文档解析客户端
#[derive(Debug, Clone)]
pub struct UpstageDocumentParser {
    http: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl UpstageDocumentParser {
    pub fn new(config: &TranslationConfig) -> Self {
        Self::with_http_client(config, reqwest::Client::new())
    }

    pub fn with_http_client(config: &TranslationConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            endpoint: config.document_parse_url.clone(),
        }
    }

    async fn send(
        http: reqwest::Client,
        api_key: Option<String>,
        endpoint: String,
        file: UploadedFile,
    ) -> TranslationResult<ParsedDocument> {
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| TranslationError::ConfigError("UPSTAGE_API_KEY 未配置".to_string()))?;

        let part = Part::bytes(file.bytes)
            .file_name(file.filename.clone())
            .mime_str(&file.content_type)
            .map_err(|e| TranslationError::InvalidInput(format!("无效的文件类型: {}", e)))?;

        let form = Form::new()
            .part("document", part)
            .text("output_formats", "[\"markdown\"]")
            .text("base64_encoding", "[\"table\"]")
            .text("ocr", "auto")
            .text("coordinates", "false")
            .text("model", "document-parse");

        tracing::info!("提交文档解析: {}", file.filename);

        let response = http
            .post(&endpoint)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranslationError::DocumentParseError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("文档解析服务返回 {}: {}", status, body);
            return Err(TranslationError::DocumentParseError(format!(
                "status {}",
                status.as_u16()
            )));
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| TranslationError::DocumentParseError(e.to_string()))?;

        normalize_parse_result(&result).ok_or_else(|| {
            TranslationError::InvalidInput(
                "No text content could be extracted from the document.".to_string(),
            )
        })
    }
}

impl DocumentParser for UpstageDocumentParser {
    fn parse(&self, file: UploadedFile) -> BoxFuture<'static, TranslationResult<ParsedDocument>> {
        Box::pin(Self::send(
            self.http.clone(),
            self.api_key.clone(),
            self.endpoint.clone(),
            file,
        ))
    }
}

fn markdown_or_text(value: &Value) -> Option<&str> {
    ["markdown", "text"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

/// 归一化解析服务的响应
///
/// 依次尝试：顶层 `content.markdown|text`；按 `page` 分组的 `elements`；
/// `content` 页数组。没有可用文本时返回 `None`。
pub fn normalize_parse_result(result: &Value) -> Option<ParsedDocument> {
    if let Some(content) = result.get("content").and_then(markdown_or_text) {
        if !content.trim().is_empty() {
            return Some(ParsedDocument::Single(content.to_string()));
        }
    }

    let reported_pages = result
        .get("usage")
        .and_then(|usage| usage.get("pages"))
        .and_then(Value::as_u64)
        .map(|n| n as usize);

    if let Some(elements) = result.get("elements").and_then(Value::as_array) {
        let mut groups: BTreeMap<usize, Vec<&str>> = BTreeMap::new();
        for element in elements {
            let page = element
                .get("page")
                .and_then(Value::as_u64)
                .filter(|p| *p > 0)
                .unwrap_or(1) as usize;
            let text = element
                .get("content")
                .and_then(markdown_or_text)
                .unwrap_or_default();
            let group = groups.entry(page).or_default();
            if !text.trim().is_empty() {
                group.push(text);
            }
        }

        let pages: Vec<PageContent> = groups
            .into_iter()
            .map(|(page_number, texts)| PageContent {
                page_number,
                content: texts.join("\n\n"),
            })
            .filter(|page| !page.content.trim().is_empty())
            .collect();

        if pages.is_empty() {
            return None;
        }

        let total_pages = reported_pages.unwrap_or(pages.len());
        return Some(ParsedDocument::Pages { pages, total_pages });
    }

    if let Some(entries) = result.get("content").and_then(Value::as_array) {
        let pages: Vec<PageContent> = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| PageContent {
                page_number: entry
                    .get("page")
                    .and_then(Value::as_u64)
                    .filter(|p| *p > 0)
                    .map(|p| p as usize)
                    .unwrap_or(index + 1),
                content: markdown_or_text(entry).unwrap_or_default().to_string(),
            })
            .filter(|page| !page.content.trim().is_empty())
            .collect();

        if pages.is_empty() {
            return None;
        }

        let total_pages = reported_pages.unwrap_or(pages.len());
        return Some(ParsedDocument::Pages { pages, total_pages });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_checks() {
        assert!(is_plain_text("text/plain", "notes.bin"));
        assert!(is_plain_text("application/octet-stream", "NOTES.TXT"));
        assert!(!is_plain_text("application/pdf", "paper.pdf"));

        assert!(is_supported_type("application/pdf"));
        assert!(is_supported_type("application/vnd.hancom.hwpx"));
        assert!(!is_supported_type("application/zip"));
    }

    #[test]
    fn test_main_content_wins() {
        let result = json!({
            "content": {"markdown": "# Title\n\nBody", "text": "Title Body"},
            "elements": [{"page": 1, "content": {"markdown": "ignored"}}]
        });
        assert_eq!(
            normalize_parse_result(&result),
            Some(ParsedDocument::Single("# Title\n\nBody".to_string()))
        );
    }

    #[test]
    fn test_elements_grouped_by_page() {
        let result = json!({
            "content": {"markdown": "   "},
            "elements": [
                {"page": 2, "content": {"markdown": "second A"}},
                {"page": 1, "content": {"text": "first"}},
                {"page": 2, "content": {"markdown": "second B"}},
                {"page": 3, "content": {"markdown": "  "}},
                {"content": {"markdown": "no page"}}
            ],
            "usage": {"pages": 3}
        });

        match normalize_parse_result(&result) {
            Some(ParsedDocument::Pages { pages, total_pages }) => {
                assert_eq!(total_pages, 3);
                assert_eq!(pages.len(), 2);
                assert_eq!(pages[0].page_number, 1);
                assert_eq!(pages[0].content, "first\n\nno page");
                assert_eq!(pages[1].content, "second A\n\nsecond B");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_content_page_array() {
        let result = json!({
            "content": [
                {"page": 1, "markdown": "one"},
                {"text": "two"},
                {"markdown": ""}
            ]
        });

        match normalize_parse_result(&result) {
            Some(ParsedDocument::Pages { pages, .. }) => {
                assert_eq!(pages.len(), 2);
                assert_eq!(pages[1].page_number, 2);
                assert_eq!(pages[1].content, "two");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_content_page_zero_falls_back_to_position() {
        let result = json!({
            "content": [
                {"page": 0, "markdown": "zero page text here now"},
                {"page": 2, "markdown": "two"}
            ]
        });

        match normalize_parse_result(&result) {
            Some(ParsedDocument::Pages { pages, .. }) => {
                assert_eq!(pages[0].page_number, 1);
                assert_eq!(pages[0].content, "zero page text here now");
                assert_eq!(pages[1].page_number, 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_nothing_extractable() {
        assert_eq!(normalize_parse_result(&json!({})), None);
        assert_eq!(normalize_parse_result(&json!({"elements": []})), None);
    }
}
