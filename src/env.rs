//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量管理。变量名沿用部署环境中已有的
//! `UPSTAGE_API_KEY`、`TRANSLATE_RATE_LIMIT`、`UPLOAD_RATE_LIMIT`，其余以 `SOLAR_` 为前缀。

use std::env;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }
}

/// 按优先级加载 .env 文件，找到第一个存在的文件即停止
pub fn load_dotenv() {
    let env_files = [
        ".env.local",       // 本地环境，最高优先级
        ".env.development", // 开发环境
        ".env.production",  // 生产环境
        ".env",             // 默认 .env 文件
    ];

    for env_file in &env_files {
        if Path::new(env_file).exists() {
            match dotenv::from_filename(env_file) {
                Ok(_) => {
                    tracing::info!("已加载环境变量文件: {}", env_file);
                    return;
                }
                Err(e) => {
                    tracing::warn!("无法加载环境变量文件 {}: {}", env_file, e);
                }
            }
        }
    }

    tracing::debug!("未找到 .env 文件，仅使用进程环境变量");
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 应用运行模式
    pub struct Mode;
    impl EnvVar<String> for Mode {
        const NAME: &'static str = "SOLAR_MODE";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("production".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Application mode: development, staging, production";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "development" | "dev" => Ok("development".to_string()),
                "staging" | "stage" => Ok("staging".to_string()),
                "production" | "prod" => Ok("production".to_string()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid mode '{}'. Use: development, staging, production",
                        value
                    ),
                }),
            }
        }
    }

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "SOLAR_LOG_LEVEL";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!(
                        "Invalid log level '{}'. Use: trace, debug, info, warn, error",
                        value
                    ),
                }),
            }
        }
    }
}

/// 上游 LLM 服务相关环境变量
pub mod upstream {
    use super::*;

    /// API 密钥
    pub struct ApiKey;
    impl EnvVar<String> for ApiKey {
        const NAME: &'static str = "UPSTAGE_API_KEY";
        const DEFAULT: Option<String> = None; // 无默认值，必须设置
        const DESCRIPTION: &'static str = "Bearer credential for the completion and document-parse APIs";

        fn parse(value: &str) -> EnvResult<String> {
            let key = value.trim();
            if key.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API key cannot be empty".to_string(),
                });
            }
            Ok(key.to_string())
        }
    }

    /// 模型名称
    pub struct Model;
    impl EnvVar<String> for Model {
        const NAME: &'static str = "SOLAR_MODEL";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("solar-pro2-preview".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Completion model name";

        fn parse(value: &str) -> EnvResult<String> {
            let model = value.trim();
            if model.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Model name cannot be empty".to_string(),
                });
            }
            Ok(model.to_string())
        }
    }

    /// 补全接口地址
    pub struct ApiUrl;
    impl EnvVar<String> for ApiUrl {
        const NAME: &'static str = "SOLAR_API_URL";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("https://api.upstage.ai/v1/chat/completions".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Chat completions endpoint URL";

        fn parse(value: &str) -> EnvResult<String> {
            parse_http_url(value, Self::NAME)
        }
    }

    /// 文档解析接口地址
    pub struct DocumentParseUrl;
    impl EnvVar<String> for DocumentParseUrl {
        const NAME: &'static str = "SOLAR_DOCUMENT_PARSE_URL";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("https://api.upstage.ai/v1/document-digitization".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Document parse (digitization) endpoint URL";

        fn parse(value: &str) -> EnvResult<String> {
            parse_http_url(value, Self::NAME)
        }
    }

    /// 单次补全的最大输出 token 数
    pub struct MaxTokens;
    impl EnvVar<usize> for MaxTokens {
        const NAME: &'static str = "SOLAR_MAX_TOKENS";
        const DEFAULT: Option<usize> = Some(4000);
        const DESCRIPTION: &'static str = "max_tokens sent with every completion request";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 16, 32768)
        }
    }
}

/// 准入控制（速率限制）相关环境变量
pub mod rate_limit {
    use super::*;

    /// 每个窗口内允许的翻译请求数
    pub struct TranslateLimit;
    impl EnvVar<u32> for TranslateLimit {
        const NAME: &'static str = "TRANSLATE_RATE_LIMIT";
        const DEFAULT: Option<u32> = Some(160);
        const DESCRIPTION: &'static str = "Max translation requests per client per window";

        fn parse(value: &str) -> EnvResult<u32> {
            parse_positive_usize(value, Self::NAME, 1, 1_000_000).map(|n| n as u32)
        }
    }

    /// 每个窗口内允许的上传请求数
    pub struct UploadLimit;
    impl EnvVar<u32> for UploadLimit {
        const NAME: &'static str = "UPLOAD_RATE_LIMIT";
        const DEFAULT: Option<u32> = Some(40);
        const DESCRIPTION: &'static str = "Max upload requests per client per window";

        fn parse(value: &str) -> EnvResult<u32> {
            parse_positive_usize(value, Self::NAME, 1, 1_000_000).map(|n| n as u32)
        }
    }

    /// 窗口长度
    pub struct Window;
    impl EnvVar<Duration> for Window {
        const NAME: &'static str = "SOLAR_RATE_LIMIT_WINDOW_SECS";
        const DEFAULT: Option<Duration> = Some(Duration::from_secs(3600));
        const DESCRIPTION: &'static str = "Fixed rate-limit window in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let seconds = parse_positive_usize(value, Self::NAME, 1, 86400 * 7)?;
            Ok(Duration::from_secs(seconds as u64))
        }
    }
}

/// 分块相关环境变量
pub mod chunking {
    use super::*;

    /// 分块阈值（词数）
    pub struct ChunkWords;
    impl EnvVar<usize> for ChunkWords {
        const NAME: &'static str = "SOLAR_CHUNK_WORDS";
        const DEFAULT: Option<usize> = Some(500);
        const DESCRIPTION: &'static str = "Word threshold above which pasted text is split into pages";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 10, 100_000)
        }
    }

    /// 自动翻译的最小词数
    pub struct MinAutoTranslateWords;
    impl EnvVar<usize> for MinAutoTranslateWords {
        const NAME: &'static str = "SOLAR_MIN_AUTO_TRANSLATE_WORDS";
        const DEFAULT: Option<usize> = Some(3);
        const DESCRIPTION: &'static str = "Edits must exceed this word count to auto-translate";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 0, 1000)
        }
    }
}

/// Web服务器相关环境变量
pub mod web {
    use super::*;

    /// 绑定地址
    pub struct BindAddress;
    impl EnvVar<String> for BindAddress {
        const NAME: &'static str = "SOLAR_WEB_BIND_ADDRESS";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("127.0.0.1".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Web server bind address";

        fn parse(value: &str) -> EnvResult<String> {
            let addr = value.trim();
            if addr.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Address cannot be empty".to_string(),
                });
            }
            Ok(addr.to_string())
        }
    }

    /// 端口
    pub struct Port;
    impl EnvVar<u16> for Port {
        const NAME: &'static str = "SOLAR_WEB_PORT";
        const DEFAULT: Option<u16> = Some(3000);
        const DESCRIPTION: &'static str = "Web server port";

        fn parse(value: &str) -> EnvResult<u16> {
            let port: u16 = value.parse().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: "Must be a valid port number (1-65535)".to_string(),
            })?;

            if port == 0 {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "Port cannot be 0".to_string(),
                });
            }

            Ok(port)
        }
    }

    /// 单次翻译请求允许的最大字符数
    pub struct MaxTextLength;
    impl EnvVar<usize> for MaxTextLength {
        const NAME: &'static str = "SOLAR_MAX_TEXT_LENGTH";
        const DEFAULT: Option<usize> = Some(100_000);
        const DESCRIPTION: &'static str = "Maximum characters accepted by POST /translate";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 100, 10_000_000)
        }
    }

    /// 上传文件大小上限
    pub struct MaxUploadBytes;
    impl EnvVar<usize> for MaxUploadBytes {
        const NAME: &'static str = "SOLAR_MAX_UPLOAD_BYTES";
        const DEFAULT: Option<usize> = Some(50 * 1024 * 1024);
        const DESCRIPTION: &'static str = "Maximum accepted upload size in bytes";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME, 1024, 1024 * 1024 * 1024)
        }
    }
}

/// 安全相关环境变量
pub mod security {
    use super::*;

    /// CORS允许的源
    pub struct CorsOrigins;
    impl EnvVar<Vec<String>> for CorsOrigins {
        const NAME: &'static str = "SOLAR_CORS_ORIGINS";
        const DEFAULT: Option<Vec<String>> = None;

        fn get() -> EnvResult<Vec<String>> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok(vec!["*".to_string()]),
            }
        }
        const DESCRIPTION: &'static str = "CORS allowed origins (comma-separated)";

        fn parse(value: &str) -> EnvResult<Vec<String>> {
            Ok(value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect())
        }
    }
}

/// 辅助函数
fn parse_http_url(value: &str, var_name: &str) -> EnvResult<String> {
    let url = value.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url.to_string())
    } else {
        Err(EnvError {
            variable: var_name.to_string(),
            message: "URL must start with http:// or https://".to_string(),
        })
    }
}

fn parse_positive_usize(value: &str, var_name: &str, min: usize, max: usize) -> EnvResult<usize> {
    let num: usize = value.trim().parse().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: "Must be a valid positive number".to_string(),
    })?;

    if num < min {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} is below minimum {}", num, min),
        });
    }

    if num > max {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Value {} exceeds maximum {}", num, max),
        });
    }

    Ok(num)
}

/// 环境变量配置汇总
#[derive(Debug, Clone)]
pub struct EnvConfig {
    // 核心配置
    pub mode: String,
    pub log_level: String,

    // 上游配置
    pub api_key: Option<String>,
    pub model: String,
    pub api_url: String,
    pub document_parse_url: String,
    pub max_tokens: usize,

    // 准入配置
    pub translate_rate_limit: u32,
    pub upload_rate_limit: u32,
    pub rate_limit_window: Duration,

    // 分块配置
    pub chunk_words: usize,
    pub min_auto_translate_words: usize,

    // Web配置
    pub web_bind_address: String,
    pub web_port: u16,
    pub max_text_length: usize,
    pub max_upload_bytes: usize,
    pub cors_origins: Vec<String>,
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> EnvResult<Self> {
        Ok(Self {
            mode: core::Mode::get()?,
            log_level: core::LogLevel::get()?,

            api_key: upstream::ApiKey::get().ok(),
            model: upstream::Model::get()?,
            api_url: upstream::ApiUrl::get()?,
            document_parse_url: upstream::DocumentParseUrl::get()?,
            max_tokens: upstream::MaxTokens::get()?,

            translate_rate_limit: rate_limit::TranslateLimit::get()?,
            upload_rate_limit: rate_limit::UploadLimit::get()?,
            rate_limit_window: rate_limit::Window::get()?,

            chunk_words: chunking::ChunkWords::get()?,
            min_auto_translate_words: chunking::MinAutoTranslateWords::get()?,

            web_bind_address: web::BindAddress::get()?,
            web_port: web::Port::get()?,
            max_text_length: web::MaxTextLength::get()?,
            max_upload_bytes: web::MaxUploadBytes::get()?,
            cors_origins: security::CorsOrigins::get()?,
        })
    }

    /// 打印配置摘要（隐藏敏感信息）
    pub fn print_summary(&self) {
        println!("Environment Configuration Summary:");
        println!("  Mode: {}", self.mode);
        println!("  Log Level: {}", self.log_level);
        println!("  Model: {} @ {}", self.model, self.api_url);
        println!(
            "  Rate Limits: translate {}/window, upload {}/window, window {}s",
            self.translate_rate_limit,
            self.upload_rate_limit,
            self.rate_limit_window.as_secs()
        );
        println!("  Chunk Threshold: {} words", self.chunk_words);
        println!("  Web Server: {}:{}", self.web_bind_address, self.web_port);
        if self.api_key.is_some() {
            println!("  API Key: [configured]");
        } else {
            println!("  API Key: [missing]");
        }
    }
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    fn line<T: fmt::Debug>(name: &str, description: &str, default: Option<T>) -> String {
        format!("- `{}`: {} (default: {:?})\n", name, description, default)
    }

    let mut docs = String::new();
    docs.push_str("# Environment Variables Documentation\n\n");

    docs.push_str("## Core Configuration\n\n");
    docs.push_str(&line(core::Mode::NAME, core::Mode::DESCRIPTION, Some("production")));
    docs.push_str(&line(core::LogLevel::NAME, core::LogLevel::DESCRIPTION, Some("info")));

    docs.push_str("\n## Upstream Configuration\n\n");
    docs.push_str(&line(upstream::ApiKey::NAME, upstream::ApiKey::DESCRIPTION, upstream::ApiKey::DEFAULT));
    docs.push_str(&line(upstream::Model::NAME, upstream::Model::DESCRIPTION, Some("solar-pro2-preview")));
    docs.push_str(&line(upstream::ApiUrl::NAME, upstream::ApiUrl::DESCRIPTION, None::<String>));
    docs.push_str(&line(
        upstream::DocumentParseUrl::NAME,
        upstream::DocumentParseUrl::DESCRIPTION,
        None::<String>,
    ));
    docs.push_str(&line(upstream::MaxTokens::NAME, upstream::MaxTokens::DESCRIPTION, upstream::MaxTokens::DEFAULT));

    docs.push_str("\n## Rate Limit Configuration\n\n");
    docs.push_str(&line(
        rate_limit::TranslateLimit::NAME,
        rate_limit::TranslateLimit::DESCRIPTION,
        rate_limit::TranslateLimit::DEFAULT,
    ));
    docs.push_str(&line(
        rate_limit::UploadLimit::NAME,
        rate_limit::UploadLimit::DESCRIPTION,
        rate_limit::UploadLimit::DEFAULT,
    ));
    docs.push_str(&line(rate_limit::Window::NAME, rate_limit::Window::DESCRIPTION, rate_limit::Window::DEFAULT));

    docs.push_str("\n## Chunking Configuration\n\n");
    docs.push_str(&line(chunking::ChunkWords::NAME, chunking::ChunkWords::DESCRIPTION, chunking::ChunkWords::DEFAULT));
    docs.push_str(&line(
        chunking::MinAutoTranslateWords::NAME,
        chunking::MinAutoTranslateWords::DESCRIPTION,
        chunking::MinAutoTranslateWords::DEFAULT,
    ));

    docs.push_str("\n## Web Server Configuration\n\n");
    docs.push_str(&line(web::BindAddress::NAME, web::BindAddress::DESCRIPTION, Some("127.0.0.1")));
    docs.push_str(&line(web::Port::NAME, web::Port::DESCRIPTION, web::Port::DEFAULT));
    docs.push_str(&line(web::MaxTextLength::NAME, web::MaxTextLength::DESCRIPTION, web::MaxTextLength::DEFAULT));
    docs.push_str(&line(web::MaxUploadBytes::NAME, web::MaxUploadBytes::DESCRIPTION, web::MaxUploadBytes::DEFAULT));
    docs.push_str(&line(security::CorsOrigins::NAME, security::CorsOrigins::DESCRIPTION, Some("*")));

    docs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_mode_parsing() {
        assert_eq!(core::Mode::parse("development").unwrap(), "development");
        assert_eq!(core::Mode::parse("PRODUCTION").unwrap(), "production");
        assert_eq!(core::Mode::parse("stage").unwrap(), "staging");

        assert!(core::Mode::parse("invalid").is_err());
    }

    #[test]
    fn test_url_validation() {
        assert!(upstream::ApiUrl::parse("http://localhost:1188").is_ok());
        assert!(upstream::ApiUrl::parse("https://api.upstage.ai/v1/chat/completions").is_ok());

        assert!(upstream::ApiUrl::parse("ftp://example.com").is_err());
        assert!(upstream::DocumentParseUrl::parse("not-a-url").is_err());
    }

    #[test]
    fn test_rate_limit_parsing() {
        assert_eq!(rate_limit::TranslateLimit::parse("500").unwrap(), 500);
        assert_eq!(rate_limit::UploadLimit::parse(" 100 ").unwrap(), 100);

        assert!(rate_limit::TranslateLimit::parse("0").is_err());
        assert!(rate_limit::TranslateLimit::parse("many").is_err());
        assert_eq!(
            rate_limit::Window::parse("60").unwrap(),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_api_key_rejects_blank() {
        assert!(upstream::ApiKey::parse("   ").is_err());
        assert_eq!(upstream::ApiKey::parse(" up_abc ").unwrap(), "up_abc");
    }

    #[test]
    fn test_port_parsing() {
        assert_eq!(web::Port::parse("8080").unwrap(), 8080);
        assert!(web::Port::parse("0").is_err());
        assert!(web::Port::parse("70000").is_err());
    }

    #[test]
    fn test_env_docs_mention_every_group() {
        let docs = generate_env_docs();
        assert!(docs.contains("UPSTAGE_API_KEY"));
        assert!(docs.contains("TRANSLATE_RATE_LIMIT"));
        assert!(docs.contains("SOLAR_CHUNK_WORDS"));
        assert!(docs.contains("SOLAR_WEB_PORT"));
    }
}
