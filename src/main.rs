//! 🚀 Trade Signal Agent CLI
//!
//! Evaluates one ticker as of a date and prints the decision:
//!
//! ```text
//! trade-signal-agent AAPL --date 2024-05-01
//! trade-signal-agent AAPL --dry-run --json
//! ```

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use log::{error, info};
use trade_signal_agent::{Config, PipelineError, SignalPipeline};

#[derive(Parser)]
#[command(name = "trade-signal-agent")]
#[command(about = "Fuse price, news and insider signals into a Buy/Sell/Hold decision")]
struct Cli {
    /// Ticker symbol to evaluate
    #[arg(value_name = "TICKER")]
    ticker: String,

    /// Evaluation date (YYYY-MM-DD); defaults to today (UTC)
    #[arg(short, long, value_parser = parse_date)]
    date: Option<NaiveDate>,

    /// Build the oracle request and print it without consulting the oracle
    #[arg(long)]
    dry_run: bool,

    /// Print JSON instead of the human-readable summary
    #[arg(long)]
    json: bool,
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize logger; RUST_LOG wins over LOG_LEVEL
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.log_level.as_str()),
    )
    .init();

    config.validate().context("Invalid configuration")?;
    info!("✅ Configuration: Loaded");

    let pipeline = SignalPipeline::from_config(&config).context("Failed to build pipeline")?;

    let ctrl_c = async {
        // If the handler cannot be installed, never cancel
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    if cli.dry_run {
        let request = tokio::select! {
            result = pipeline.assemble(&cli.ticker, cli.date) => result,
            _ = ctrl_c => Err(PipelineError::Cancelled),
        };
        let request = request.map_err(report)?;
        let output = if cli.json {
            serde_json::to_string_pretty(&request).context("Failed to encode request")?
        } else {
            request.to_prompt().context("Failed to encode request")?
        };
        println!("{}", output);
        return Ok(());
    }

    let record = pipeline
        .evaluate_with_cancel(&cli.ticker, cli.date, ctrl_c)
        .await
        .map_err(report)?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&record).context("Failed to encode decision")?
        );
    } else {
        println!("{}", record);
    }
    Ok(())
}

/// Log a pipeline failure with as much structure as it carries
fn report(err: PipelineError) -> anyhow::Error {
    match &err {
        PipelineError::NoSignalAvailable { failures } => {
            error!("❌ No signal available for any domain:");
            for (domain, cause) in failures {
                error!("   • {}: {}", domain, cause);
            }
        }
        PipelineError::DecisionParseError { reason, reply } => {
            error!("❌ Oracle reply rejected: {}", reason);
            if !reply.is_empty() {
                error!("   Reply was: {}", reply);
            }
        }
        other => error!("❌ {}", other),
    }
    anyhow::Error::new(err)
}
