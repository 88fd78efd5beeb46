use clap::Parser;
use pulsetrade::api::{InstrumentMaster, YahooClient};
use pulsetrade::config::Settings;
use pulsetrade::db::PostgresPersistence;
use pulsetrade::dispatch::{Dispatcher, WebhookNotifier};
use pulsetrade::feed::{CandleBuffer, FeedStatus, PollingFeed, StreamFeed};
use pulsetrade::scanner::ScanLoop;
use pulsetrade::sentiment::HeadlineSentiment;
use pulsetrade::strategy::signals::SignalConfig;
use pulsetrade::strategy::{Strategy, TaSentimentStrategy};
use pulsetrade::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

/// Market data worker: ticks to candles to periodic trade signals
#[derive(Parser, Debug)]
#[command(name = "pulsetrade", version)]
struct Cli {
    /// Read environment variables from this file instead of `.env`
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path)?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    setup_logging();

    tracing::info!("🚀 PulseTrade worker starting");

    let settings = Settings::load()?;
    log_settings(&settings);

    // Candle store shared by ingestion (writer) and the scan loop (reader)
    let buffer = CandleBuffer::new(settings.candle_seconds);
    for symbol in &settings.symbols {
        buffer.ensure(symbol)?;
    }

    let postgres = connect_to_postgres(settings.database_url.as_deref()).await;

    let strategy = Arc::new(TaSentimentStrategy::new(SignalConfig {
        min_candles: settings.min_candles,
        ..SignalConfig::default()
    }));
    let dispatcher = build_dispatcher(&settings, strategy.name(), postgres.clone())?;
    tracing::info!("  Sinks: {:?}", dispatcher.sink_names());

    let yahoo = YahooClient::new()?;
    let (status_tx, status_rx) = watch::channel(FeedStatus::Disabled);
    let _ingestion = spawn_ingestion(&settings, buffer.clone(), yahoo.clone(), status_tx)?;

    let sentiment = Arc::new(HeadlineSentiment::new(Arc::new(yahoo)));
    let mut scan = ScanLoop::new(
        buffer,
        strategy,
        sentiment,
        dispatcher,
        settings.scan_interval,
    );
    if let Some(db) = postgres {
        scan = scan.with_heartbeat(db, settings.worker_id.clone(), status_rx);
    }

    tracing::info!("\nPress Ctrl+C to stop...\n");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("\n⚠️  Received Ctrl+C, shutting down...");
        }
        _ = scan.run() => {}
    }

    tracing::info!("👋 PulseTrade worker stopped");
    Ok(())
}

// ============================================================================
// Initialization Functions
// ============================================================================

fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pulsetrade=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn log_settings(settings: &Settings) {
    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Symbols: {}", settings.symbols.join(", "));
    tracing::info!("  Candle width: {}s", settings.candle_seconds);
    tracing::info!("  Scan interval: {}s", settings.scan_interval.as_secs());
    tracing::info!("  Min candles: {}", settings.min_candles);
    tracing::info!("  Worker: {}", settings.worker_id);
}

async fn connect_to_postgres(database_url: Option<&str>) -> Option<Arc<PostgresPersistence>> {
    let Some(database_url) = database_url else {
        tracing::info!("No database URL set, continuing without persistence");
        return None;
    };

    match PostgresPersistence::new(database_url).await {
        Ok(p) => {
            tracing::info!("Postgres persistence enabled (signals & worker health)");
            Some(Arc::new(p))
        }
        Err(e) => {
            tracing::warn!(
                "Failed to connect to Postgres ({}), continuing without persistence",
                e
            );
            None
        }
    }
}

fn build_dispatcher(
    settings: &Settings,
    strategy_name: &str,
    postgres: Option<Arc<PostgresPersistence>>,
) -> Result<Dispatcher> {
    let mut dispatcher = Dispatcher::new();

    if let Some(db) = postgres {
        dispatcher = dispatcher.with_sink(db);
    }
    if let Some(url) = &settings.signals_push_url {
        dispatcher = dispatcher.with_sink(Arc::new(WebhookNotifier::new(url, strategy_name)?));
    }

    Ok(dispatcher)
}

/// Start exactly one ingestion strategy; streaming wins when configured
fn spawn_ingestion(
    settings: &Settings,
    buffer: CandleBuffer,
    yahoo: YahooClient,
    status: watch::Sender<FeedStatus>,
) -> Result<JoinHandle<()>> {
    if let Some(stream) = settings.stream.clone() {
        tracing::info!("📡 Ingestion: streaming quotes ({})", stream.mode);

        let master = InstrumentMaster::new(
            settings.instruments_csv_url.clone(),
            Some(stream.token.clone()),
        )?;
        let feed = StreamFeed::new(stream, buffer)
            .with_instrument_master(master, settings.symbols.clone(), settings.map_by)
            .with_status(status);

        return Ok(tokio::spawn(async move {
            if feed.run().await.is_err() {
                tracing::warn!("Streaming ingestion stopped; scan loop continues on existing candles");
            }
        }));
    }

    tracing::info!("📡 Ingestion: polling latest bars");
    let feed = PollingFeed::new(
        Arc::new(yahoo),
        buffer,
        settings.symbols.clone(),
        settings.poll_interval,
    )
    .with_clock(settings.poll_bucket_clock)
    .with_status(status);

    Ok(tokio::spawn(feed.run()))
}
