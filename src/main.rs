//! 命令行入口：翻译文件或标准输入，边接收边输出译文

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use solar_translate::env::{self, core, EnvVar};
use solar_translate::translation::{
    SessionConfig, SessionEvent, TranslationConfig, TranslationError, TranslationSession,
    UnitOutcome, UnitStatus, UpstreamClient,
};

#[derive(Parser, Debug)]
#[command(name = "solar-translate", version, about = "Translate a document with streaming output")]
struct Args {
    /// Input file, or `-` for standard input
    #[arg(default_value = "-")]
    input: PathBuf,

    /// Target language code (en, ko, ja) or language name
    #[arg(short, long, default_value = "ko", env = "SOLAR_TARGET_LANG")]
    target_lang: String,

    /// Additional instructions passed to the translator
    #[arg(short, long)]
    instructions: Option<String>,

    /// Word threshold above which the input is split into pages
    #[arg(long)]
    chunk_words: Option<usize>,

    /// Only print the final translation instead of streaming deltas
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    env::load_dotenv();
    let args = Args::parse();
    init_tracing();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(args: Args) -> Result<ExitCode, TranslationError> {
    let mut config = TranslationConfig::from_env()?;
    if let Some(chunk_words) = args.chunk_words {
        config.chunk_words = chunk_words;
    }
    config.validate()?;

    if !config.has_api_key() {
        return Err(TranslationError::ConfigError(
            "UPSTAGE_API_KEY not configured".to_string(),
        ));
    }

    let text = read_input(&args.input)?;
    if text.trim().is_empty() {
        return Err(TranslationError::InvalidInput("input is empty".to_string()));
    }

    let client = Arc::new(UpstreamClient::new(config.clone())?);
    let session = TranslationSession::new(client, args.target_lang, SessionConfig::from(&config));
    session.set_instructions(args.instructions);

    let printer = (!args.quiet).then(|| tokio::spawn(print_events(session.subscribe())));

    let outcomes = match session.load_document(&text) {
        Some(run) => run.wait().await,
        None => session.translate_sequential(0, 1, None).await,
    };

    let units = session.units();
    let translation = session.full_translation();
    drop(session);

    if let Some(printer) = printer {
        if let Err(e) = printer.await {
            tracing::error!("输出任务异常退出: {}", e);
        }
    } else {
        println!("{}", translation);
    }

    let mut failed = 0usize;
    for unit in units.iter().filter(|unit| unit.status == UnitStatus::Failed) {
        failed += 1;
        eprintln!(
            "page {}: {}",
            unit.index + 1,
            unit.error_message.as_deref().unwrap_or("translation failed")
        );
    }

    let retryable = outcomes
        .iter()
        .any(|outcome| matches!(outcome, UnitOutcome::Failed(e) if e.is_retryable()));
    if retryable {
        eprintln!("Some pages failed with a temporary error; run the command again to retry.");
    }

    let cancelled = outcomes
        .iter()
        .any(|outcome| matches!(outcome, UnitOutcome::Cancelled));

    if failed > 0 || cancelled {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn read_input(input: &PathBuf) -> Result<String, TranslationError> {
    if input.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| TranslationError::InvalidInput(format!("无法读取标准输入: {}", e)))?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(input).map_err(|e| {
            TranslationError::InvalidInput(format!("无法读取文件 {}: {}", input.display(), e))
        })
    }
}

async fn print_events(mut events: tokio::sync::broadcast::Receiver<SessionEvent>) {
    let mut stdout = io::stdout();
    let mut printed_any = false;

    loop {
        match events.recv().await {
            Ok(SessionEvent::UnitStarted { .. }) => {
                if printed_any {
                    let _ = write!(stdout, "\n\n");
                }
            }
            Ok(SessionEvent::Delta { delta, .. }) => {
                printed_any = true;
                let _ = write!(stdout, "{}", delta);
                let _ = stdout.flush();
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("输出落后，跳过 {} 个事件", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }

    if printed_any {
        let _ = writeln!(stdout);
    }
}

fn init_tracing() {
    let default_level = core::LogLevel::get().unwrap_or_else(|_| "warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .init();
}
