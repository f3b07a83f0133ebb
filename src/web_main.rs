//! Web 服务器主程序入口

use clap::Parser;
use tracing_subscriber::EnvFilter;

use solar_translate::admission::RateLimits;
use solar_translate::env::{self, core, EnvConfig, EnvVar};
use solar_translate::translation::TranslationConfig;
use solar_translate::web::{AppState, WebConfig, WebServer};

#[derive(Parser, Debug)]
#[command(name = "solar-translate-web", version, about = "Streaming translation HTTP server")]
struct Args {
    /// Bind address (overrides SOLAR_WEB_BIND_ADDRESS)
    #[arg(short, long)]
    bind: Option<String>,

    /// Port number (overrides SOLAR_WEB_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print the environment variable reference and exit
    #[arg(long)]
    env_docs: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env::load_dotenv();
    let args = Args::parse();

    if args.env_docs {
        println!("{}", env::generate_env_docs());
        return Ok(());
    }

    init_tracing();

    let mut web_config = WebConfig::from_env()?;
    if let Some(bind) = args.bind {
        web_config.bind_addr = bind;
    }
    if let Some(port) = args.port {
        web_config.port = port;
    }
    web_config.validate()?;

    let translation_config = TranslationConfig::from_env()?;
    let limits = RateLimits::from_env()?;

    if web_config.is_development() {
        if let Ok(summary) = EnvConfig::from_env() {
            summary.print_summary();
        }
    }

    let state = AppState::from_config(&translation_config, &web_config, limits)?;
    let server = WebServer::new(web_config, state);
    server.start().await?;

    Ok(())
}

fn init_tracing() {
    let default_level = core::LogLevel::get().unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .init();
}
