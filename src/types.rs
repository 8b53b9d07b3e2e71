//! Core data types shared across the pipeline.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Static congestion class of a monitored intersection. Shapes the
/// magnitude of simulated traffic, never the per-reading label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CongestionClass {
    High,
    Medium,
    Low,
}

/// Congestion level derived from a single reading's vehicle count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CongestionLevel {
    Low,
    Medium,
    High,
}

impl CongestionLevel {
    /// Label thresholds are fixed: >80 High, >40 Medium, else Low.
    pub fn from_vehicle_count(count: u32) -> Self {
        if count > 80 {
            CongestionLevel::High
        } else if count > 40 {
            CongestionLevel::Medium
        } else {
            CongestionLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CongestionLevel::Low => "Low",
            CongestionLevel::Medium => "Medium",
            CongestionLevel::High => "High",
        }
    }
}

/// A monitored intersection. The set of locations is fixed at compile
/// time and never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct Location {
    pub id: &'static str,
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
    pub congestion_class: CongestionClass,
}

impl Location {
    /// All monitored intersections across Delhi NCR, Bengaluru, Mumbai
    /// and Chennai.
    pub fn all() -> &'static [Location] {
        &LOCATIONS
    }

    /// Traffic density multiplier keyed off the city prefix of the
    /// sensor id. Mumbai is the densest.
    pub fn city_multiplier(&self) -> f64 {
        if self.id.starts_with("mumbai") {
            1.4
        } else if self.id.starts_with("delhi") || self.id.starts_with("blr") {
            1.2
        } else if self.id.starts_with("chennai") {
            1.1
        } else {
            1.0
        }
    }
}

static LOCATIONS: [Location; 12] = [
    Location {
        id: "delhi_cp",
        name: "Connaught Place, Delhi",
        lat: 28.6315,
        lng: 77.2167,
        congestion_class: CongestionClass::High,
    },
    Location {
        id: "delhi_iffco",
        name: "IFFCO Chowk, Gurgaon",
        lat: 28.4595,
        lng: 77.0266,
        congestion_class: CongestionClass::High,
    },
    Location {
        id: "delhi_lajpat",
        name: "Lajpat Nagar, Delhi",
        lat: 28.5677,
        lng: 77.2334,
        congestion_class: CongestionClass::Medium,
    },
    Location {
        id: "delhi_dwarka",
        name: "Dwarka Sector 21, Delhi",
        lat: 28.5921,
        lng: 77.0460,
        congestion_class: CongestionClass::Low,
    },
    Location {
        id: "blr_silk",
        name: "Silk Board Junction, Bengaluru",
        lat: 12.9279,
        lng: 77.6271,
        congestion_class: CongestionClass::High,
    },
    Location {
        id: "blr_electronic",
        name: "Electronic City, Bengaluru",
        lat: 12.8456,
        lng: 77.6632,
        congestion_class: CongestionClass::High,
    },
    Location {
        id: "blr_jayanagar",
        name: "Jayanagar 4th Block, Bengaluru",
        lat: 12.9250,
        lng: 77.5946,
        congestion_class: CongestionClass::Medium,
    },
    Location {
        id: "blr_hebbal",
        name: "Hebbal Flyover, Bengaluru",
        lat: 13.0358,
        lng: 77.5970,
        congestion_class: CongestionClass::Low,
    },
    Location {
        id: "mumbai_bandra",
        name: "Bandra Kurla Complex, Mumbai",
        lat: 19.0596,
        lng: 72.8295,
        congestion_class: CongestionClass::High,
    },
    Location {
        id: "mumbai_andheri",
        name: "Andheri East, Mumbai",
        lat: 19.1136,
        lng: 72.8697,
        congestion_class: CongestionClass::Medium,
    },
    Location {
        id: "chennai_adyar",
        name: "Adyar Signal, Chennai",
        lat: 13.0067,
        lng: 80.2206,
        congestion_class: CongestionClass::Medium,
    },
    Location {
        id: "chennai_omr",
        name: "OMR IT Corridor, Chennai",
        lat: 12.8406,
        lng: 80.1534,
        congestion_class: CongestionClass::Low,
    },
];

/// One simulated observation. Ephemeral until the collector enriches
/// it with a prediction and persists it.
#[derive(Debug, Clone, Serialize)]
pub struct SensorReading {
    pub sensor_id: String,
    pub timestamp: DateTime<Utc>,
    pub vehicle_count: u32,
    pub avg_speed: f64,
    pub congestion_level: CongestionLevel,
}

/// Weather codes used as a prediction feature.
pub const WEATHER_SUNNY: u32 = 0;
pub const WEATHER_RAINY: u32 = 1;
pub const WEATHER_CLOUDY: u32 = 2;

/// The sole input contract of the prediction model: hour-of-day in
/// [0,23], day-of-week in [0,6] (Monday = 0), weather code in {0,1,2}.
///
/// Values outside these ranges are passed through to the regressor
/// unvalidated; input validation is an explicit non-goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionFeatures {
    pub hour: u32,
    pub day_of_week: u32,
    pub weather: u32,
}

impl PredictionFeatures {
    pub fn new(hour: u32, day_of_week: u32, weather: u32) -> Self {
        Self {
            hour,
            day_of_week,
            weather,
        }
    }

    /// Features for a wall-clock instant plus an assumed weather code.
    pub fn at(instant: DateTime<Utc>, weather: u32) -> Self {
        Self {
            hour: instant.hour(),
            day_of_week: instant.weekday().num_days_from_monday(),
            weather,
        }
    }

    pub fn as_array(&self) -> [f64; 3] {
        [
            self.hour as f64,
            self.day_of_week as f64,
            self.weather as f64,
        ]
    }
}

/// A persisted observation. Append-only; `predicted_flow` is always
/// filled in at write time, never backfilled.
#[derive(Debug, Clone, Serialize)]
pub struct TrafficRecord {
    pub sensor_id: String,
    pub timestamp: DateTime<Utc>,
    pub vehicle_count: u32,
    pub avg_speed: f64,
    pub congestion_level: CongestionLevel,
    pub predicted_flow: i64,
}

impl TrafficRecord {
    pub fn from_reading(reading: SensorReading, predicted_flow: i64) -> Self {
        Self {
            sensor_id: reading.sensor_id,
            timestamp: reading.timestamp,
            vehicle_count: reading.vehicle_count,
            avg_speed: reading.avg_speed,
            congestion_level: reading.congestion_level,
            predicted_flow,
        }
    }
}
