//! Durable append-only storage for traffic records.
//!
//! Backed by SQLite through an sqlx pool. The observation table is
//! write-once per row: the pipeline only ever inserts and reads, never
//! updates or deletes.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error::TrafficError;
use crate::types::TrafficRecord;

/// Default row cap for the recency read path.
pub const DEFAULT_RECENT_LIMIT: i64 = 100;

/// A persisted row as read back from the store.
#[derive(Debug, Clone, FromRow)]
pub struct StoredRecord {
    pub id: i64,
    pub sensor_id: String,
    pub timestamp: DateTime<Utc>,
    pub vehicle_count: i64,
    pub avg_speed: f64,
    pub congestion_level: String,
    pub predicted_flow: i64,
}

/// Write side of the store. The collector goes through this seam so
/// tests can drive it against a failing sink.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn insert(&self, record: &TrafficRecord) -> Result<(), TrafficError>;
}

#[derive(Debug, Clone)]
pub struct TrafficStore {
    pool: SqlitePool,
}

impl TrafficStore {
    /// Open (creating if missing) the database at the given sqlite URL.
    pub async fn connect(url: &str) -> Result<Self, TrafficError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// An in-memory store for tests. Pinned to a single connection so
    /// every query sees the same database.
    pub async fn in_memory() -> Result<Self, TrafficError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }

    /// Create the observation table if it does not exist. Called once
    /// by the bootstrapper before the collector starts.
    pub async fn init_schema(&self) -> Result<(), TrafficError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS traffic_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sensor_id TEXT,
                timestamp TEXT,
                vehicle_count INTEGER,
                avg_speed REAL,
                congestion_level TEXT,
                predicted_flow INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert(&self, record: &TrafficRecord) -> Result<(), TrafficError> {
        sqlx::query(
            r#"
            INSERT INTO traffic_data
                (sensor_id, timestamp, vehicle_count, avg_speed, congestion_level, predicted_flow)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&record.sensor_id)
        .bind(record.timestamp)
        .bind(record.vehicle_count as i64)
        .bind(record.avg_speed)
        .bind(record.congestion_level.as_str())
        .bind(record.predicted_flow)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn append(&self, records: &[TrafficRecord]) -> Result<(), TrafficError> {
        for record in records {
            self.insert(record).await?;
        }
        Ok(())
    }

    /// Most recent rows, newest first, capped at
    /// [`DEFAULT_RECENT_LIMIT`].
    pub async fn recent_default(&self) -> Result<Vec<StoredRecord>, TrafficError> {
        self.recent(DEFAULT_RECENT_LIMIT).await
    }

    /// Most recent rows, newest first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<StoredRecord>, TrafficError> {
        let rows = sqlx::query_as::<_, StoredRecord>(
            r#"
            SELECT id, sensor_id, timestamp, vehicle_count, avg_speed,
                   congestion_level, predicted_flow
            FROM traffic_data
            ORDER BY timestamp DESC, id DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RecordSink for TrafficStore {
    async fn insert(&self, record: &TrafficRecord) -> Result<(), TrafficError> {
        TrafficStore::insert(self, record).await
    }
}
