//! `POST /upload`：读取文本文件或把文档交给解析服务

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::Json;

use crate::admission::client_identity;
use crate::translation::document::{is_supported_type, ParsedDocument, UploadedFile};
use crate::translation::error::TranslationError;
use crate::web::error::ApiError;
use crate::web::types::{AppState, UploadResponse};

const UNSUPPORTED_TYPE_MESSAGE: &str = "Unsupported file type. Supported formats: TXT, JPEG, PNG, BMP, PDF, TIFF, HEIC, DOCX, PPTX, XLSX, HWP, HWPX.";

/// 文件上传处理器
pub async fn upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let identity = client_identity(&headers);
    let decision = state.limits.upload.check_and_consume(&identity);
    if !decision.allowed {
        return Err(ApiError::rate_limited(
            "Too many upload requests. Please try again later.",
            state.limits.upload.options().max_requests(),
            decision.reset_at,
        ));
    }

    let file = read_file_field(&mut multipart)
        .await?
        .ok_or_else(|| ApiError::bad_request("No file provided"))?;

    if file.size() > state.max_upload_bytes {
        return Err(ApiError::bad_request(format!(
            "File size exceeds {}MB limit. Please upload a smaller file.",
            state.max_upload_bytes / (1024 * 1024)
        )));
    }

    tracing::info!(
        "收到上传: {} ({}, {} 字节)",
        file.filename,
        file.content_type,
        file.size()
    );

    if file.is_plain_text() {
        let content = String::from_utf8_lossy(&file.bytes).into_owned();
        if content.trim().is_empty() {
            return Err(ApiError::bad_request("The text file is empty."));
        }

        return Ok(Json(UploadResponse {
            content: Some(content),
            pages: None,
            filename: file.filename,
            file_type: file.content_type,
            file_size: file.bytes.len(),
            is_multi_page: None,
            total_pages: None,
        }));
    }

    if !is_supported_type(&file.content_type) {
        return Err(ApiError::bad_request(UNSUPPORTED_TYPE_MESSAGE));
    }

    let filename = file.filename.clone();
    let file_type = file.content_type.clone();
    let file_size = file.size();

    let parsed = state.parser.parse(file).await.map_err(|e| match e {
        TranslationError::InvalidInput(message) => ApiError::BadRequest(message),
        other => ApiError::from(other),
    })?;

    let response = match parsed {
        ParsedDocument::Single(content) => UploadResponse {
            content: Some(content),
            pages: None,
            filename,
            file_type,
            file_size,
            is_multi_page: Some(false),
            total_pages: None,
        },
        ParsedDocument::Pages { pages, total_pages } => UploadResponse {
            is_multi_page: Some(pages.len() > 1),
            total_pages: Some(total_pages),
            pages: Some(pages),
            content: None,
            filename,
            file_type,
            file_size,
        },
    };

    Ok(Json(response))
}

async fn read_file_field(multipart: &mut Multipart) -> Result<Option<UploadedFile>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::debug!("无法读取 multipart 数据: {}", e);
        ApiError::bad_request("Invalid multipart body")
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(|e| {
            tracing::debug!("读取上传文件失败: {}", e);
            ApiError::bad_request("File size exceeds the upload limit. Please upload a smaller file.")
        })?;

        return Ok(Some(UploadedFile {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        }));
    }

    Ok(None)
}
