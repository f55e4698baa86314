use std::{env, error::Error, sync::Arc};

use clap::{Parser, ValueEnum};
use rusqlite::Connection;
use time::OffsetDateTime;
use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use pennywise_rs::{
    AppState, DEFAULT_TIMEZONE, FcmClient, SummaryPeriod, token_provider_from_env,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Period {
    Weekly,
    Monthly,
}

impl From<Period> for SummaryPeriod {
    fn from(period: Period) -> Self {
        match period {
            Period::Weekly => SummaryPeriod::Weekly,
            Period::Monthly => SummaryPeriod::Monthly,
        }
    }
}

/// Send one round of weekly or monthly spending summaries right now.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// Which summary to send.
    #[arg(long, value_enum)]
    period: Period,

    /// The canonical timezone used to work out last week.
    #[arg(long, default_value = DEFAULT_TIMEZONE)]
    timezone: String,

    /// The Firebase project that push notifications are sent through.
    #[arg(long)]
    fcm_project_id: String,

    /// The number of users to send summaries to at once.
    #[arg(long, default_value_t = 1)]
    concurrency: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_filter(filter::LevelFilter::INFO),
        )
        .init();

    let args = Args::parse();

    let tokens = token_provider_from_env()?;

    let fcm_client = match env::var("FCM_ENDPOINT") {
        Ok(endpoint) => FcmClient::with_endpoint(&endpoint, &args.fcm_project_id, tokens)?,
        Err(_) => FcmClient::new(&args.fcm_project_id, tokens)?,
    };

    let conn = Connection::open(&args.db_path)?;
    let state = AppState::new(conn, Arc::new(fcm_client), &args.timezone)?
        .with_concurrency(args.concurrency);

    let report = state
        .notifier
        .run(args.period.into(), OffsetDateTime::now_utc())
        .await?;

    println!(
        "Sent {} summaries for {} to {}: {} delivered, {} skipped, {} failed",
        report.period,
        report.window.start,
        report.window.end,
        report.delivered(),
        report.skipped(),
        report.failed()
    );

    Ok(())
}
