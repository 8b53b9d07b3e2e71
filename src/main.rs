//! Process bootstrapper: initialises the schema, ensures a trained
//! model is available, runs the collector until a termination signal
//! arrives, then lets the in-flight tick finish before exiting.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use traffic_control::collector::Collector;
use traffic_control::config::Config;
use traffic_control::model::{ModelState, TrafficPredictor};
use traffic_control::simulator::SensorSimulator;
use traffic_control::store::TrafficStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "traffic_control=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!(
        database_url = %config.database_url,
        model_dir = %config.model_dir.display(),
        interval_secs = config.collect_interval.as_secs(),
        "starting traffic control pipeline"
    );

    let store = Arc::new(TrafficStore::connect(&config.database_url).await?);
    store.init_schema().await?;

    let predictor = Arc::new(TrafficPredictor::new(&config.model_dir));
    if predictor.state() == ModelState::Untrained {
        let score = predictor.train();
        tracing::info!(score, "initial model training complete");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let collector = Collector::new(
        SensorSimulator::new(),
        Arc::clone(&predictor),
        Arc::clone(&store),
        config.collect_interval,
    );
    let collector_handle = tokio::spawn(collector.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    collector_handle.await?;

    Ok(())
}
