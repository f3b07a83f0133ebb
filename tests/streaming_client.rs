//! 上游客户端与文档解析集成测试（mockito 模拟上游）

use futures::StreamExt;
use mockito::Matcher;
use serde_json::json;

use solar_translate::translation::{
    CompletionClient, DocumentParser, ParsedDocument, StreamRequest, TranslationConfig,
    TranslationContext, TranslationError, UploadedFile, UpstageDocumentParser, UpstreamClient,
};

fn config_for(server: &mockito::ServerGuard) -> TranslationConfig {
    TranslationConfig {
        api_key: Some("up_test_key".to_string()),
        api_url: format!("{}/v1/chat/completions", server.url()),
        document_parse_url: format!("{}/v1/document-digitization", server.url()),
        model: "solar-pro2-preview".to_string(),
        temperature: 0.3,
        max_tokens: 4000,
        chunk_words: 500,
        min_auto_translate_words: 3,
    }
}

async fn collect(client: &UpstreamClient, request: StreamRequest) -> Vec<Result<String, TranslationError>> {
    client.stream_translate(request).collect().await
}

#[tokio::test]
async fn test_streams_deltas_until_done() {
    let mut server = mockito::Server::new_async().await;
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n",
        "data: not json at all\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\r\n\r\n",
        "data: [DONE]\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
    );

    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer up_test_key")
        .match_body(Matcher::PartialJson(json!({
            "model": "solar-pro2-preview",
            "stream": true,
            "max_tokens": 4000,
            "messages": [
                {"role": "system"},
                {"role": "user", "content": "안녕하세요 세계"}
            ]
        })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let client = UpstreamClient::new(config_for(&server)).unwrap();
    let request = StreamRequest::new("안녕하세요 세계", "en")
        .with_context(Some(TranslationContext::new("이전", "previous")));
    let items = collect(&client, request).await;

    mock.assert_async().await;
    let deltas: Vec<String> = items.into_iter().map(Result::unwrap).collect();
    assert_eq!(deltas, vec!["Hello".to_string(), " world".to_string()]);
}

#[tokio::test]
async fn test_non_success_status_is_single_error() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(401)
        .with_body("{\"error\":\"invalid key\"}")
        .create_async()
        .await;

    let client = UpstreamClient::new(config_for(&server)).unwrap();
    let items = collect(&client, StreamRequest::new("hello there friend", "ko")).await;

    mock.assert_async().await;
    assert_eq!(items.len(), 1);
    match &items[0] {
        Err(TranslationError::UpstreamError { status, message }) => {
            assert_eq!(*status, 401);
            assert!(message.contains("invalid key"));
        }
        other => panic!("unexpected item: {:?}", other),
    }
}

#[tokio::test]
async fn test_stream_without_done_ends_at_eof() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body("data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}")
        .create_async()
        .await;

    let client = UpstreamClient::new(config_for(&server)).unwrap();
    let items = collect(&client, StreamRequest::new("cola", "en")).await;

    mock.assert_async().await;
    assert_eq!(items, vec![Ok("tail".to_string())]);
}

#[tokio::test]
async fn test_document_parser_single_content() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/document-digitization")
        .match_header("authorization", "Bearer up_test_key")
        .match_header("content-type", Matcher::Regex("multipart/form-data".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"content": {"markdown": "# Report\n\nBody text"}}).to_string())
        .create_async()
        .await;

    let parser = UpstageDocumentParser::new(&config_for(&server));
    let parsed = parser
        .parse(UploadedFile {
            filename: "report.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: b"%PDF-1.4 fake".to_vec(),
        })
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(parsed, ParsedDocument::Single("# Report\n\nBody text".to_string()));
}

#[tokio::test]
async fn test_document_parser_failures() {
    let mut server = mockito::Server::new_async().await;
    let _failing = server
        .mock("POST", "/v1/document-digitization")
        .with_status(500)
        .with_body("upstream exploded")
        .expect(1)
        .create_async()
        .await;

    let parser = UpstageDocumentParser::new(&config_for(&server));
    let file = UploadedFile {
        filename: "scan.png".to_string(),
        content_type: "image/png".to_string(),
        bytes: vec![0x89, 0x50, 0x4e, 0x47],
    };

    let error = parser.parse(file.clone()).await.unwrap_err();
    assert!(matches!(error, TranslationError::DocumentParseError(_)));

    // 没有密钥时不会发出请求
    let mut config = config_for(&server);
    config.api_key = None;
    let error = UpstageDocumentParser::new(&config).parse(file).await.unwrap_err();
    assert!(matches!(error, TranslationError::ConfigError(_)));
}
