//! L3 Recorder
//!
//! Captures one symbol's Binance trade and depth-delta streams for a fixed
//! duration and writes a normalized CSV event log.

use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use l3_recorder::cli::Cli;
use l3_recorder::{
    health, AppState, CaptureSession, Config, EventSink, LogFormat, RecorderMetrics,
    SessionController,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load()?;
    if let Some(duration_secs) = cli.duration_secs {
        config.duration_secs = duration_secs;
    }

    init_logging(config.log_format)?;

    info!(
        symbol = %config.symbol,
        duration_secs = config.duration_secs,
        output = %config.output_path.display(),
        "Starting L3 recorder"
    );

    // Storage failures abort before any session exists
    let sink = EventSink::create(&config.output_path)?;
    let session = Arc::new(CaptureSession::new(
        &config.symbol,
        config.duration(),
        sink,
    ));
    let metrics = Arc::new(RecorderMetrics::new()?);
    let config = Arc::new(config);

    if let Some(port) = config.health_port {
        let state = Arc::new(AppState {
            session: session.clone(),
            metrics: metrics.clone(),
            config: config.clone(),
        });
        tokio::spawn(async move {
            if let Err(e) = health::serve(port, state).await {
                warn!(error = %e, "Health server error");
            }
        });
    }

    let controller = SessionController::new(
        session,
        metrics,
        &config.ws_endpoint,
        config.progress_interval,
    );

    let stop = controller.stop_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping");
                stop.stop();
            }
            Err(e) => warn!(error = %e, "Failed to listen for interrupt signal"),
        }
    });

    let report = controller.run().await;
    println!(
        "Recording {:?}. {} events saved to {}.",
        report.outcome,
        report.event_count,
        config.output_path.display()
    );

    match report.error {
        Some(error) => anyhow::bail!("capture failed: {}", error),
        None => Ok(()),
    }
}

fn init_logging(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(Level::INFO.into()));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer()).try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))
}
