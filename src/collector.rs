//! Background collection loop.
//!
//! On a fixed interval the collector samples every location, attaches
//! a flow prediction for the current wall clock (weather is not sensed,
//! only drawn at random), and appends the enriched records to the
//! store. A failed write skips that record, never the tick; a failed
//! tick never terminates the loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::model::TrafficPredictor;
use crate::simulator::SensorSimulator;
use crate::store::RecordSink;
use crate::types::{PredictionFeatures, TrafficRecord};

pub const DEFAULT_COLLECT_INTERVAL: Duration = Duration::from_secs(30);

pub struct Collector<S: RecordSink> {
    simulator: SensorSimulator,
    predictor: Arc<TrafficPredictor>,
    sink: Arc<S>,
    interval: Duration,
    rng: StdRng,
}

impl<S: RecordSink> Collector<S> {
    pub fn new(
        simulator: SensorSimulator,
        predictor: Arc<TrafficPredictor>,
        sink: Arc<S>,
        interval: Duration,
    ) -> Self {
        Self::with_rng(simulator, predictor, sink, interval, StdRng::from_entropy())
    }

    pub fn with_rng(
        simulator: SensorSimulator,
        predictor: Arc<TrafficPredictor>,
        sink: Arc<S>,
        interval: Duration,
        rng: StdRng,
    ) -> Self {
        Self {
            simulator,
            predictor,
            sink,
            interval,
            rng,
        }
    }

    /// Run until the shutdown channel fires. The in-flight tick always
    /// finishes before the loop exits.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_secs = self.interval.as_secs(), "collector started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let stored = self.tick(Utc::now()).await;
                    tracing::info!(records = stored, "collection tick complete");
                }
                _ = shutdown.changed() => {
                    tracing::info!("collector shutting down");
                    break;
                }
            }
        }
    }

    /// One collection pass: simulate, predict, persist. Returns how
    /// many records made it to the sink.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> usize {
        let readings = self.simulator.generate_readings(now);
        let mut stored = 0;

        for reading in readings {
            let weather = self.rng.gen_range(0..=2);
            let predicted_flow = self
                .predictor
                .predict(PredictionFeatures::at(now, weather)) as i64;
            let record = TrafficRecord::from_reading(reading, predicted_flow);

            match self.sink.insert(&record).await {
                Ok(()) => stored += 1,
                Err(e) => {
                    tracing::error!(
                        sensor_id = %record.sensor_id,
                        error = %e,
                        "failed to store record, skipping"
                    );
                }
            }
        }

        stored
    }
}
