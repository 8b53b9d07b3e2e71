//! Environment-driven configuration.
//!
//! | Variable                | Default                     | Description                      |
//! |-------------------------|-----------------------------|----------------------------------|
//! | `TRAFFIC_DATABASE_URL`  | `sqlite://traffic_data.db`  | SQLite database URL              |
//! | `TRAFFIC_MODEL_DIR`     | `models`                    | Directory for model artifacts    |
//! | `COLLECT_INTERVAL_SECS` | `30`                        | Seconds between collection ticks |

use std::path::PathBuf;
use std::time::Duration;

use crate::collector::DEFAULT_COLLECT_INTERVAL;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub model_dir: PathBuf,
    pub collect_interval: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let database_url = std::env::var("TRAFFIC_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://traffic_data.db".to_string());
        let model_dir = std::env::var("TRAFFIC_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("models"));
        let collect_interval = std::env::var("COLLECT_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_COLLECT_INTERVAL);

        Self {
            database_url,
            model_dir,
            collect_interval,
        }
    }
}
