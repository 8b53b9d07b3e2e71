//! IoT sensor simulation.
//!
//! Produces one [`SensorReading`] per monitored location per tick,
//! reflecting extended rush hours, afternoon traffic, quiet nights and
//! per-city density differences. Randomness comes from an injectable
//! [`StdRng`] so tests can fix the seed.

use chrono::{DateTime, Timelike, Utc};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::types::{CongestionClass, CongestionLevel, Location, SensorReading};

pub struct SensorSimulator {
    locations: &'static [Location],
    rng: StdRng,
}

impl Default for SensorSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorSimulator {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            locations: Location::all(),
            rng,
        }
    }

    /// Generate one reading per location for the given instant.
    pub fn generate_readings(&mut self, now: DateTime<Utc>) -> Vec<SensorReading> {
        let locations = self.locations;
        locations
            .iter()
            .map(|location| self.simulate(location, now))
            .collect()
    }

    fn simulate(&mut self, location: &Location, now: DateTime<Utc>) -> SensorReading {
        let hour = now.hour();
        let class = location.congestion_class;

        let mut vehicles: i64 = match class {
            CongestionClass::High => 60,
            CongestionClass::Medium => 35,
            CongestionClass::Low => 20,
        };

        if (7..=11).contains(&hour) || (16..=21).contains(&hour) {
            // Extended rush hours
            vehicles += match class {
                CongestionClass::High => self.rng.gen_range(100..=180),
                CongestionClass::Medium => self.rng.gen_range(60..=120),
                CongestionClass::Low => self.rng.gen_range(30..=80),
            };
        } else if (12..=15).contains(&hour) {
            // Afternoon traffic
            vehicles += match class {
                CongestionClass::High => self.rng.gen_range(40..=80),
                CongestionClass::Medium => self.rng.gen_range(20..=50),
                CongestionClass::Low => self.rng.gen_range(10..=30),
            };
        } else if hour >= 22 || hour <= 5 {
            // Night time replaces the base entirely
            vehicles = match class {
                CongestionClass::High => self.rng.gen_range(15..=35),
                CongestionClass::Medium => self.rng.gen_range(8..=20),
                CongestionClass::Low => self.rng.gen_range(3..=12),
            };
        }

        vehicles = (vehicles as f64 * location.city_multiplier()) as i64;
        vehicles += self.rng.gen_range(-15..=15);

        // Speed falls off with vehicle count; slope and floor depend on
        // the congestion class. Computed from the unclamped count.
        let avg_speed = match class {
            CongestionClass::High => f64::max(
                2.0,
                18.0 - vehicles as f64 * 0.15 + self.rng.gen_range(-10..=5) as f64,
            ),
            CongestionClass::Medium => f64::max(
                5.0,
                28.0 - vehicles as f64 * 0.18 + self.rng.gen_range(-8..=8) as f64,
            ),
            CongestionClass::Low => f64::max(
                8.0,
                40.0 - vehicles as f64 * 0.22 + self.rng.gen_range(-5..=10) as f64,
            ),
        };

        let vehicle_count = vehicles.max(0) as u32;

        SensorReading {
            sensor_id: location.id.to_string(),
            timestamp: now,
            vehicle_count,
            avg_speed: (avg_speed * 10.0).round() / 10.0,
            congestion_level: CongestionLevel::from_vehicle_count(vehicle_count),
        }
    }
}
