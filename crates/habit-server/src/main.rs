use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use habit_bus::EventBus;
use habit_engine::{ReminderEngine, Ticker, TickerConfig, TrackingLifecycle};
use habit_notifier::DynNotifier;
use habit_notifier_email::EmailNotifier;
use habit_server::api::{router, AppState};
use habit_server::config::HabitConfig;
use habit_state::Store;
use habit_state_memory::MemoryStore;

/// Habit reminder engine HTTP server.
#[derive(Parser, Debug)]
#[command(name = "habit-server", about = "Standalone HTTP server for the habit reminder engine")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "habit.toml")]
    config: String,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config: HabitConfig = if Path::new(&cli.config).exists() {
        let contents = std::fs::read_to_string(&cli.config)?;
        toml::from_str(&contents)?
    } else {
        info!(path = %cli.config, "config file not found, using defaults");
        toml::from_str("")?
    };

    let store: Arc<dyn Store> = build_store(&config).await?;

    let bus = Arc::new(EventBus::new(config.sse_queue_depth));
    let engine = Arc::new(ReminderEngine::new(Arc::clone(&store), Arc::clone(&bus)));
    let lifecycle = Arc::new(TrackingLifecycle::new(
        Arc::clone(&store),
        Arc::clone(&bus),
        Arc::clone(&engine),
    ));

    let notifier: Arc<dyn DynNotifier> = Arc::new(EmailNotifier::new(config.smtp.clone().into())?);

    let ticker_config = TickerConfig {
        tick_interval: Duration::from_secs(config.tick_interval_seconds),
        notifier_max_concurrency: config.notifier_max_concurrency,
        shutdown_grace: Duration::from_secs(config.shutdown_grace_seconds),
    };
    let (mut ticker, ticker_shutdown_tx) = Ticker::new(
        ticker_config,
        Arc::clone(&store),
        Arc::clone(&bus),
        Arc::clone(&engine),
        notifier,
    );
    let ticker_handle = tokio::spawn(async move {
        ticker.run().await;
    });

    let state = AppState {
        store,
        bus,
        engine,
        lifecycle,
    };
    let app = router(state);

    let host = cli.host.unwrap_or(config.server.host);
    let port = cli.port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "habit-server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop accepting new ticks and let the in-flight notifier dispatch jobs
    // drain within their own shutdown grace period.
    let _ = ticker_shutdown_tx.send(()).await;
    if tokio::time::timeout(Duration::from_secs(config.shutdown_grace_seconds + 1), ticker_handle)
        .await
        .is_err()
    {
        tracing::warn!("ticker did not stop within its shutdown grace period");
    }

    info!("habit-server shut down");
    Ok(())
}

/// Build the persistence backend named by `config.store.backend`. Only
/// `"memory"` and `"postgres"` are recognized; anything else is a
/// configuration error the process refuses to start with.
async fn build_store(config: &HabitConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    match config.store.backend.as_str() {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        #[cfg(feature = "postgres")]
        "postgres" => {
            let url = config
                .store
                .url
                .clone()
                .ok_or("store.url is required when store.backend = \"postgres\"")?;
            let pg_config = habit_state_postgres::PostgresConfig {
                url,
                pool_size: config.store.pool_size,
            };
            let store = habit_state_postgres::PostgresStore::new(pg_config).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        "postgres" => Err("this build was compiled without the postgres feature".into()),
        other => Err(format!("unknown store backend: {other}").into()),
    }
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM, then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
