use anyhow::Context;
use clap::Parser;
use database::Database;
use gmail_client::GmailClient;
use llm_interface::GeminiOracle;
use orchestrator::Orchestrator;
use reddit_client::RedditClient;
use replybot_core::{AppConfig, ErrorReporter};
use std::path::PathBuf;

/// Answer F5Bot mentions on Reddit, one pass per invocation.
#[derive(Debug, Parser)]
#[command(name = "replybot", version, about)]
struct Args {
    /// TOML configuration file. Environment variables override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Judge and draft replies without posting them.
    #[arg(long)]
    dry_run: bool,

    /// Gmail search query, replacing the configured one.
    #[arg(long)]
    query: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "replybot=info,orchestrator=info,gmail_client=info,reddit_client=info,llm_interface=info,database=info,notification_parser=info",
                )
            }),
        )
        .init();

    tracing::info!("Starting Reddit bot");

    let mut config = AppConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(query) = args.query {
        config.mailbox.query = Some(query);
    }
    config.validate().context("validating configuration")?;

    let reporter = ErrorReporter::new();

    let gmail = GmailClient::new(&config.mailbox).context("configuring Gmail")?;
    gmail
        .authenticate()
        .await
        .map_err(|e| {
            reporter.report_error(&e);
            e
        })
        .context("authenticating with Gmail")?;

    let oracle = GeminiOracle::new(&config.oracle).context("configuring Gemini")?;

    let reddit = if args.dry_run {
        tracing::info!("--dry-run given, replies will not be posted");
        None
    } else {
        connect_reddit(&config, &reporter).await
    };

    let mut ledger = Database::new(config.database.connection_string());
    ledger.connect().await.context("opening the ledger")?;
    ledger
        .run_migrations()
        .await
        .context("migrating the ledger")?;

    let bot = Orchestrator::new(
        gmail,
        oracle,
        reddit,
        ledger,
        config.mailbox.query(),
        config.summary.clone(),
    );

    let result = bot.run().await;
    bot.into_ledger().close().await;

    let report = result.context("processing notifications")?;
    tracing::info!(
        "Done: {} processed, {} relevant, {} posted, {} errors",
        report.processed,
        report.relevant,
        report.posted,
        report.errors()
    );
    Ok(())
}

/// A ready Reddit client, or `None` to run without posting.
async fn connect_reddit(config: &AppConfig, reporter: &ErrorReporter) -> Option<RedditClient> {
    if !config.reddit.has_credentials() {
        tracing::warn!("Reddit credentials missing, continuing without posting");
        return None;
    }

    let client = match RedditClient::new(&config.reddit) {
        Ok(client) => client,
        Err(e) => {
            reporter.report_warning(&e);
            return None;
        }
    };

    match client.authenticate().await {
        Ok(_) => Some(client),
        Err(e) => {
            reporter.report_warning(&e);
            tracing::warn!("Reddit authentication failed, continuing without posting");
            None
        }
    }
}
