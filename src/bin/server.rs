use std::{
    env,
    fs::OpenOptions,
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use pennywise_rs::{
    AppState, DEFAULT_TIMEZONE, FcmClient, Schedule, SummaryPeriod, build_router,
    graceful_shutdown, logging_middleware, run_schedule, token_provider_from_env,
};

/// The REST API server for pennywise_rs, which also sends the scheduled spending summaries.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The address to serve the API from.
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// The canonical timezone summaries are scheduled in.
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
async fn main() {
    // A missing .env file is fine, the variables may come from the environment.
    let _ = dotenvy::dotenv();
    setup_logging();

    let args = Args::parse();

    let addr = SocketAddr::from((args.host, args.port));

    let tokens = token_provider_from_env().expect("Could not set up FCM credentials");

    let fcm_client = match env::var("FCM_ENDPOINT") {
        Ok(endpoint) => FcmClient::with_endpoint(&endpoint, &args.fcm_project_id, tokens),
        Err(_) => FcmClient::new(&args.fcm_project_id, tokens),
    }
    .expect("Could not create the FCM client");

    let conn = Connection::open(&args.db_path).expect("Could not open the database");
    let state = AppState::new(conn, Arc::new(fcm_client), &args.timezone)
        .expect("Could not create the app state")
        .with_concurrency(args.concurrency);

    let (shutdown_sender, shutdown_receiver) = watch::channel(false);

    for period in [SummaryPeriod::Weekly, SummaryPeriod::Monthly] {
        tokio::spawn(run_schedule(
            state.notifier.clone(),
            period,
            Schedule::for_period(period),
            shutdown_receiver.clone(),
        ));
    }

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone(), shutdown_sender));

    let router = add_tracing_layer(
        build_router(state).layer(middleware::from_fn(logging_middleware)),
    );

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .unwrap();
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // Errors are already logged by the handlers.
        .on_failure(());

    router.layer(tracing_layer)
}
