// ABOUTME: Command-line front end for textcast.
// ABOUTME: Loads config, sets up logging, dispatches targets, prints results.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use textcast::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "textcast")]
#[command(about = "Send text messages to phone numbers through a rate-limited HTTP endpoint")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, short, env = "TEXTCAST_CONFIG", default_value = "textcast.toml")]
    config: PathBuf,

    /// Print results as JSON instead of a table
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a message to one phone number
    Send {
        /// Destination, '+' followed by 7-15 digits
        #[arg(long)]
        phone: String,
        /// Message text
        #[arg(long)]
        message: String,
        /// Number of times to send it
        #[arg(long, default_value_t = 1)]
        count: u32,
        /// Seconds between sends
        #[arg(long, default_value_t = 1.0)]
        delay: f64,
    },
    /// Send to every target listed in a file (phone,message,count,delay per line)
    Batch {
        /// Path to the target file
        file: PathBuf,
    },
    /// Print the effective configuration
    Config,
    /// Check that the API base URL is reachable
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(Some(&cli.config))
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    init_tracing(&config.logging);

    match cli.command {
        Command::Send {
            phone,
            message,
            count,
            delay,
        } => {
            let target = Target::new(phone, message, count, delay)?;
            run(&config, vec![target], cli.json).await
        }
        Command::Batch { file } => {
            let loaded = load_targets(&file)?;
            for skipped in &loaded.skipped {
                eprintln!("skipped line {}: {}", skipped.line, skipped.reason);
            }
            if loaded.targets.is_empty() {
                bail!("no valid targets in {}", file.display());
            }
            info!(targets = loaded.targets.len(), "loaded targets");
            run(&config, loaded.targets, cli.json).await
        }
        Command::Config => {
            let mut shown = config.clone();
            if shown.api.api_key.is_some() {
                shown.api.api_key = Some("********".to_string());
            }
            print!("{}", shown.to_toml_string()?);
            Ok(())
        }
        Command::Health => {
            let sender = HttpSender::new(&config.api, config.delivery.timeout())?;
            if sender.health_check().await {
                println!("{} is reachable", config.api.base_url);
                Ok(())
            } else {
                bail!("{} is not reachable", config.api.base_url)
            }
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("textcast={}", logging.level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(config: &Config, targets: Vec<Target>, json: bool) -> Result<()> {
    let dispatcher = Arc::new(Dispatcher::from_config(config)?);

    // First Ctrl-C stops new sends; in-flight requests finish on their own.
    // A second one exits immediately.
    let interrupt = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            warn!("interrupt received, finishing in-flight sends (Ctrl-C again to quit)");
            dispatcher.stop();
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("second interrupt, exiting");
                std::process::exit(130);
            }
        })
    };

    let report = dispatcher.dispatch(targets).await;
    interrupt.abort();

    let stats = dispatcher.statistics().await;
    if json {
        let out = serde_json::json!({
            "results": report,
            "statistics": stats,
            "success_rate": stats.success_rate(),
            "messages_per_second": stats.messages_per_second(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_report(&report, &stats);
    }
    Ok(())
}

fn print_report(report: &DispatchReport, stats: &StatsSnapshot) {
    let mut phones: Vec<_> = report.keys().collect();
    phones.sort();

    println!(
        "{:<18} {:<9} {:>6} {:>7} {:>12}",
        "PHONE", "STATUS", "SENT", "FAILED", "RATE-LIMITED"
    );
    for phone in phones {
        let summary = &report[phone];
        let status = if summary.success { "ok" } else { "failed" };
        println!(
            "{:<18} {:<9} {:>6} {:>7} {:>12}",
            phone, status, summary.sent, summary.failed, summary.rate_limited
        );
        if let Some(err) = &summary.error {
            println!("  error: {}", err);
        }
    }

    println!();
    println!("Total sent:      {}", stats.total_sent);
    println!("Total failed:    {}", stats.total_failed);
    println!("Rate limited:    {}", stats.total_rate_limited);
    println!("Success rate:    {:.2}%", stats.success_rate());
    println!("Throughput:      {:.2} msg/s", stats.messages_per_second());
}
