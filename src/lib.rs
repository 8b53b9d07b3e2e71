//! Smart traffic prediction-and-collection pipeline.
//!
//! Simulates an IoT traffic-sensor network over a fixed set of
//! intersections, predicts near-term traffic flow with a regression
//! forest, and persists enriched observations to SQLite for aggregate
//! querying. The crate exposes four cooperating components:
//!
//! - [`simulator::SensorSimulator`] generates per-location readings;
//! - [`model::TrafficPredictor`] owns the train/persist/load/predict
//!   lifecycle of the flow model;
//! - [`collector::Collector`] runs the periodic sample-predict-store
//!   loop;
//! - [`store::TrafficStore`] and [`analytics::TrafficAnalytics`] cover
//!   the durable write and aggregate read paths.

pub mod analytics;
pub mod collector;
pub mod config;
pub mod error;
pub mod forest;
pub mod model;
pub mod simulator;
pub mod store;
pub mod types;

pub use error::TrafficError;
