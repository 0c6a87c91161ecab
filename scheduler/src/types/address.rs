//! Geographic coordinates and addresses.

use serde::{Deserialize, Serialize};

/// A WGS84 latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// A physical location: a human-readable address plus its coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: i64,
    pub street_address: String,
    pub coordinates: Coordinates,
}
