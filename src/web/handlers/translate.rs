//! `POST /translate`：把单段文本的翻译以 SSE 流式返回

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream::{self, StreamExt};
use serde_json::json;

use crate::admission::client_identity;
use crate::translation::client::StreamRequest;
use crate::web::error::ApiError;
use crate::web::types::{AppState, TranslateRequest};

/// 流式翻译处理器
///
/// 在返回事件流之前先取第一项：上游在产出任何增量之前失败时返回 500，
/// 之后的失败以一条 `{"error": ...}` 事件结束流。
pub async fn translate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<TranslateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|e| {
        tracing::debug!("无效的翻译请求体: {}", e);
        ApiError::bad_request("Missing required fields: text, targetLang")
    })?;

    let text = request.text.filter(|text| !text.trim().is_empty());
    let target_lang = request.target_lang.filter(|lang| !lang.trim().is_empty());
    let (Some(text), Some(target_lang)) = (text, target_lang) else {
        return Err(ApiError::bad_request("Missing required fields: text, targetLang"));
    };

    if text.chars().count() > state.max_text_length {
        return Err(ApiError::bad_request(format!(
            "Text is too long. Maximum length is {} characters.",
            state.max_text_length
        )));
    }

    let identity = client_identity(&headers);
    let decision = state.limits.translate.check_and_consume(&identity);
    if !decision.allowed {
        return Err(ApiError::rate_limited(
            "Too many translation requests. Please try again later.",
            state.limits.translate.options().max_requests(),
            decision.reset_at,
        ));
    }

    tracing::info!(
        "开始流式翻译: {} 字符 -> {} (客户端 {})",
        text.chars().count(),
        target_lang,
        identity
    );

    let request = StreamRequest::new(text, target_lang)
        .with_instructions(request.instructions.filter(|i| !i.trim().is_empty()))
        .with_context(request.previous_context);

    let mut deltas = state.client.stream_translate(request);

    let first = match deltas.next().await {
        Some(Err(e)) => return Err(ApiError::from(e)),
        other => other,
    };

    let events = stream::iter(first).chain(deltas).scan(false, |failed, item| {
        if *failed {
            return futures::future::ready(None);
        }

        let payload = match item {
            Ok(content) => json!({ "content": content }),
            Err(e) => {
                *failed = true;
                tracing::error!("流式翻译中途失败: {}", e);
                json!({ "error": e.user_message() })
            }
        };

        futures::future::ready(Some(Ok::<_, Infallible>(Event::default().data(payload.to_string()))))
    });

    Ok(Sse::new(events).into_response())
}
