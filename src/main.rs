use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use chrono::Utc;

mod app;
mod config;
mod error;
mod feed;
mod models;
mod services;
mod store;

use app::{App, RunReport};
use config::{load_categories, Config};

const USAGE: &str = "Usage: feed-courier [--config <path>] [--categories <path>]";

struct Args {
    config: Option<PathBuf>,
    categories: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Option<Args>> {
    let mut args = Args {
        config: None,
        categories: None,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let value = iter.next().context("--config needs a path")?;
                args.config = Some(PathBuf::from(value));
            }
            "--categories" => {
                let value = iter.next().context("--categories needs a path")?;
                args.categories = Some(PathBuf::from(value));
            }
            "-h" | "--help" => return Ok(None),
            other => anyhow::bail!("unknown argument {:?}\n{}", other, USAGE),
        }
    }

    Ok(Some(args))
}

async fn run(args: Args) -> anyhow::Result<RunReport> {
    let config = Config::load(args.config.as_deref()).context("failed to load settings")?;

    let categories_path = args.categories.unwrap_or_else(|| config.categories_path.clone());
    let categories = load_categories(&categories_path).context("failed to load categories")?;
    tracing::info!(
        "Loaded {} categories from {}",
        categories.len(),
        categories_path.display()
    );

    let app = App::new(&config)?;
    let report = app.run(&categories, Utc::now()).await?;
    Ok(report)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Webhook URLs may live in a local .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = match parse_args() {
        Ok(Some(args)) => args,
        Ok(None) => {
            println!("{}", USAGE);
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("Starting collection run");
    match run(args).await {
        Ok(report) => {
            tracing::info!(
                "Run complete: {} categories ok, {} failed, {} fetched, {} announced, {} ids in history, {} indexed, {} orphans removed",
                report.categories_ok,
                report.categories_failed,
                report.fetched,
                report.notified,
                report.history_size,
                report.index_entries,
                report.orphans_removed
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("Run aborted: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
