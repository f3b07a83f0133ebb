//! Web 服务器配置
//!
//! 使用类型安全的环境变量系统进行配置管理

use crate::env::{security, web, EnvError, EnvResult, EnvVar};

/// Web 服务器配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebConfig {
    /// 绑定地址
    pub bind_addr: String,
    /// 端口
    pub port: u16,
    /// 允许的跨域来源，`*` 表示任意
    pub cors_origins: Vec<String>,
    /// `POST /translate` 接受的最大字符数
    pub max_text_length: usize,
    /// `POST /upload` 接受的最大文件字节数
    pub max_upload_bytes: usize,
}

impl WebConfig {
    /// 从环境变量创建配置
    pub fn from_env() -> EnvResult<Self> {
        Ok(Self {
            bind_addr: web::BindAddress::get()?,
            port: web::Port::get()?,
            cors_origins: security::CorsOrigins::get()?,
            max_text_length: web::MaxTextLength::get()?,
            max_upload_bytes: web::MaxUploadBytes::get()?,
        })
    }

    /// 验证配置
    pub fn validate(&self) -> EnvResult<()> {
        if self.bind_addr.is_empty() {
            return Err(EnvError {
                variable: web::BindAddress::NAME.to_string(),
                message: "Bind address cannot be empty".to_string(),
            });
        }

        if self.port == 0 {
            return Err(EnvError {
                variable: web::Port::NAME.to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }

        if self.max_upload_bytes == 0 {
            return Err(EnvError {
                variable: web::MaxUploadBytes::NAME.to_string(),
                message: "Upload limit cannot be 0".to_string(),
            });
        }

        Ok(())
    }

    /// 获取完整的监听地址
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    /// 是否允许任意来源
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.is_empty() || self.cors_origins.iter().any(|origin| origin == "*")
    }

    /// 检查是否为本地开发模式
    pub fn is_development(&self) -> bool {
        use crate::env::core;
        core::Mode::get()
            .map(|mode| mode == "development")
            .unwrap_or(false)
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self::from_env().unwrap_or_else(|e| {
            tracing::warn!("Failed to load web config from environment: {}. Using defaults.", e);
            Self {
                bind_addr: "127.0.0.1".to_string(),
                port: 3000,
                cors_origins: vec!["*".to_string()],
                max_text_length: 100_000,
                max_upload_bytes: crate::translation::document::MAX_UPLOAD_BYTES,
            }
        })
    }
}
