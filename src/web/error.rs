//! HTTP 错误响应
//!
//! 所有错误都以 `{"error": "..."}` 的 JSON 返回；限流响应额外带上标准的限流头。

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::translation::error::{helpers, ErrorCategory, TranslationError};

/// 接口错误
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// 400
    BadRequest(String),
    /// 429
    RateLimited {
        message: String,
        limit: u32,
        reset_at: DateTime<Utc>,
    },
    /// 500
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }

    pub fn rate_limited(message: impl Into<String>, limit: u32, reset_at: DateTime<Utc>) -> Self {
        ApiError::RateLimited {
            message: message.into(),
            limit,
            reset_at,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TranslationError> for ApiError {
    fn from(error: TranslationError) -> Self {
        helpers::log_error("请求处理失败", &error);

        match (error.category(), error) {
            (_, TranslationError::InvalidInput(message)) => ApiError::BadRequest(message),
            (_, TranslationError::RateLimitExceeded { limit, reset_at }) => {
                ApiError::rate_limited("Too many requests. Please try again later.", limit, reset_at)
            }
            (ErrorCategory::Configuration, _) => {
                ApiError::Internal("UPSTAGE_API_KEY not configured".to_string())
            }
            (ErrorCategory::Extraction, _) => {
                ApiError::Internal("Document parsing failed. Please try again.".to_string())
            }
            _ => ApiError::Internal("Translation failed".to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        match self {
            ApiError::BadRequest(message) | ApiError::Internal(message) => {
                (status, Json(json!({ "error": message }))).into_response()
            }
            ApiError::RateLimited {
                message,
                limit,
                reset_at,
            } => {
                let retry_after = ((reset_at - Utc::now()).num_milliseconds().max(0) + 999) / 1000;
                let body = Json(json!({
                    "error": message,
                    "resetTime": reset_at.to_rfc3339(),
                }));

                let mut response = (status, body).into_response();
                let headers = response.headers_mut();
                headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
                headers.insert(HeaderName::from_static("x-ratelimit-limit"), HeaderValue::from(limit));
                headers.insert(HeaderName::from_static("x-ratelimit-remaining"), HeaderValue::from_static("0"));
                headers.insert(
                    HeaderName::from_static("x-ratelimit-reset"),
                    HeaderValue::from(reset_at.timestamp_millis()),
                );
                response
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(TranslationError::InvalidInput("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(TranslationError::UpstreamError {
                status: 502,
                message: "bad gateway".into()
            })
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(TranslationError::ConfigError("no key".into())),
            ApiError::Internal("UPSTAGE_API_KEY not configured".to_string())
        );
        assert_eq!(
            ApiError::from(TranslationError::DocumentParseError("status 500".into())),
            ApiError::Internal("Document parsing failed. Please try again.".to_string())
        );
    }

    #[test]
    fn test_rate_limited_headers() {
        let reset_at = Utc::now() + chrono::Duration::seconds(120);
        let response = ApiError::rate_limited("slow down", 160, reset_at).into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers();
        assert_eq!(headers["X-RateLimit-Limit"], "160");
        assert_eq!(headers["X-RateLimit-Remaining"], "0");
        assert_eq!(
            headers["X-RateLimit-Reset"],
            reset_at.timestamp_millis().to_string().as_str()
        );
        let retry: i64 = headers["Retry-After"].to_str().unwrap().parse().unwrap();
        assert!((119..=120).contains(&retry));
    }
}
