//! Read-side aggregate queries over the full observation history.

use serde::Serialize;
use sqlx::FromRow;
use sqlx::sqlite::SqlitePool;

use crate::error::TrafficError;
use crate::store::TrafficStore;

/// Mean traffic for one hour-of-day across all stored history.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct HourlyTraffic {
    pub hour: i64,
    pub avg_vehicles: f64,
    pub avg_speed: f64,
}

/// Row count for one congestion level label.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CongestionBucket {
    pub level: String,
    pub count: i64,
}

/// Pure read-side aggregation; never mutates the store.
#[derive(Debug, Clone)]
pub struct TrafficAnalytics {
    pool: SqlitePool,
}

impl TrafficAnalytics {
    pub fn new(store: &TrafficStore) -> Self {
        Self {
            pool: store.pool().clone(),
        }
    }

    /// Mean vehicle count and speed per hour-of-day present in the
    /// history, hour ascending.
    pub async fn hourly_summary(&self) -> Result<Vec<HourlyTraffic>, TrafficError> {
        let rows = sqlx::query_as::<_, HourlyTraffic>(
            r#"
            SELECT CAST(strftime('%H', timestamp) AS INTEGER) AS hour,
                   AVG(vehicle_count) AS avg_vehicles,
                   AVG(avg_speed) AS avg_speed
            FROM traffic_data
            GROUP BY hour
            ORDER BY hour
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Stored row count per congestion level label.
    pub async fn congestion_distribution(&self) -> Result<Vec<CongestionBucket>, TrafficError> {
        let rows = sqlx::query_as::<_, CongestionBucket>(
            r#"
            SELECT congestion_level AS level, COUNT(*) AS count
            FROM traffic_data
            GROUP BY congestion_level
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
