use anyhow::{Context, Result};
use std::io::Read;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

use oe_policy::{evaluate, EvaluationRequest, PolicyConfig, SystemClock};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first - malformed tables abort startup
    let config = PolicyConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {:#}", e);
        eprintln!("Please check OE_* environment variables.");
        e
    })?;

    init_logging(&config)?;

    let engine = config.build_engine()?;

    let input = read_input(std::env::args().nth(1))?;
    let request: EvaluationRequest =
        serde_json::from_str(&input).context("Failed to parse evaluation request")?;
    info!(op = request.op(), "Evaluating policy request");

    let response = evaluate(&engine, request, &SystemClock);
    let output = serde_json::to_string_pretty(&response).context("Failed to encode response")?;
    println!("{}", output);

    Ok(())
}

/// Request body from the file named on the command line, or stdin
fn read_input(path: Option<String>) -> Result<String> {
    match path.as_deref() {
        Some(path) if path != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file {}", path)),
        _ => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read request from stdin")?;
            Ok(input)
        }
    }
}

/// Logs go to stderr; stdout carries only the JSON response
fn init_logging(config: &PolicyConfig) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_span_events(if config.logging.log_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
