mod baseline;
mod bus;
mod config;
mod db;
mod error;
mod pipeline;
mod registry;
mod sampling;
mod telemetry;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::baseline::BaselineCalibrator;
use crate::bus::SimulatedBus;
use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::registry::ChannelRegistry;
use crate::sampling::{Averager, OutlierGuard, SampleReader};
use crate::telemetry::{FallbackStore, TelemetryPublisher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strainstation_daemon=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();

    // Connect to the fallback database
    let pool = db::connect(&config.database_url).await?;
    db::migrate(&pool).await?;

    // Enumerate sensor slots. A hardware SensorBus implementation plugs in
    // here; the simulated bus lets the daemon run without the rig attached.
    let mut sensor_bus = SimulatedBus::new(&config.mux_addresses);
    let registry = ChannelRegistry::discover(&mut sensor_bus, &config.mux_addresses);
    anyhow::ensure!(
        !registry.is_empty(),
        "no ADC channels found behind {:?}",
        config.mux_addresses
    );

    let channel_count = registry.len();
    let publisher = TelemetryPublisher::connect(&config);

    let mut pipeline = Pipeline::new(
        registry,
        SampleReader::new(sensor_bus),
        OutlierGuard::new(config.retry_policy()),
        Averager::new(config.batch_size),
        BaselineCalibrator::new(),
        publisher,
        FallbackStore::new(pool),
        config.poll_interval,
    );

    // Operator-gated zero-reference capture before the first cycle
    if config.capture_baseline {
        println!("Press enter to capture baseline measurements...");
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        pipeline.capture_baseline().await;
    }

    tracing::info!(
        channels = channel_count,
        interval = ?config.poll_interval,
        batch_size = config.batch_size,
        "strainstation daemon polling"
    );

    tokio::select! {
        _ = pipeline.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }

    Ok(())
}
