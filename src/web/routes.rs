//! Web 路由定义

use std::sync::Arc;

use axum::{routing::post, Router};

use crate::web::{handlers::*, types::AppState};

/// 创建路由结构
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/translate", post(translate))
        .route("/upload", post(upload))
        // 与前端原有路径保持兼容
        .route("/api/translate", post(translate))
        .route("/api/upload", post(upload))
}
