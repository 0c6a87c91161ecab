//! Travel-time providers.
//!
//! The engine never interprets a travel time beyond comparing it with the
//! infeasibility sentinel; a provider either returns seconds or `None` for an
//! unroutable pair. Same-location pairs go through the same lookup as any
//! other pair.

use std::collections::HashMap;

use crate::services::geo::great_circle_metres;
use crate::types::{Address, TravelTimeEntry};

/// Travel time between two addresses, or `None` when the pair is infeasible.
pub trait TravelTimeProvider: Send + Sync {
    fn travel_seconds(&self, from: &Address, to: &Address) -> Option<i64>;
}

/// Matrix-backed provider. Entries are directed; symmetry is never assumed.
/// A missing or negative entry is infeasible.
pub struct MatrixTravelProvider {
    entries: HashMap<(i64, i64), i64>,
}

impl MatrixTravelProvider {
    pub fn from_entries(entries: &[TravelTimeEntry]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|entry| ((entry.from_address_id, entry.to_address_id), entry.seconds))
                .collect(),
        }
    }
}

impl TravelTimeProvider for MatrixTravelProvider {
    fn travel_seconds(&self, from: &Address, to: &Address) -> Option<i64> {
        self.entries
            .get(&(from.id, to.id))
            .copied()
            .filter(|seconds| *seconds >= 0)
    }
}

/// Haversine estimate used when no matrix is supplied: straight-line distance
/// times a road coefficient at an average speed, with a minimum floor.
pub struct HaversineTravelProvider {
    pub road_coefficient: f64,
    pub average_speed_kmh: f64,
    pub min_travel_seconds: i64,
}

impl Default for HaversineTravelProvider {
    fn default() -> Self {
        Self {
            road_coefficient: 1.3,
            average_speed_kmh: 40.0,
            min_travel_seconds: 300,
        }
    }
}

impl HaversineTravelProvider {
    pub fn with_floor(min_travel_seconds: i64) -> Self {
        Self {
            min_travel_seconds,
            ..Self::default()
        }
    }
}

impl TravelTimeProvider for HaversineTravelProvider {
    fn travel_seconds(&self, from: &Address, to: &Address) -> Option<i64> {
        let road_km = great_circle_metres(&from.coordinates, &to.coordinates) / 1000.0
            * self.road_coefficient;
        let seconds = (road_km / self.average_speed_kmh * 3600.0).ceil() as i64;
        Some(seconds.max(self.min_travel_seconds))
    }
}
