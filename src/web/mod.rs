//! Web 服务器模块
//!
//! 提供流式翻译与文档上传的 HTTP 接口

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod types;

pub use config::*;
pub use error::ApiError;
pub use routes::*;
pub use types::*;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::translation::error::{TranslationError, TranslationResult};

/// multipart 包装本身的额外开销
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Web 服务器
pub struct WebServer {
    config: WebConfig,
    state: Arc<AppState>,
}

impl WebServer {
    /// 创建新的 Web 服务器
    pub fn new(config: WebConfig, state: AppState) -> Self {
        Self {
            config,
            state: Arc::new(state),
        }
    }

    /// 启动 Web 服务器，直到收到 Ctrl-C
    pub async fn start(&self) -> TranslationResult<()> {
        let app = create_router(self.state.clone(), &self.config);

        let listener = tokio::net::TcpListener::bind(self.config.listen_address())
            .await
            .map_err(|e| TranslationError::ConfigError(format!("Failed to bind server: {}", e)))?;

        tracing::info!("Web server starting at http://{}", self.config.listen_address());

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| TranslationError::InternalError(format!("Server error: {}", e)))?;

        tracing::info!("Web server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("无法监听关闭信号: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("收到关闭信号，正在停止服务");
}

/// 创建路由器
pub fn create_router(app_state: Arc<AppState>, config: &WebConfig) -> Router {
    let body_limit = app_state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);

    create_routes()
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(config: &WebConfig) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("忽略无效的 CORS 来源: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
