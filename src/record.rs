use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::measurement::{MeasurementKind, ValidationError, parse_measurement};

/// One stored BMI calculation as returned by the backend
///
/// Records are created remotely and only ever read here. Field names on the
/// wire follow the backend (`altura`, `peso`, `resultado`, `categoria`,
/// `createdAt`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalculationRecord {
    /// Identifier assigned by the backend
    pub id: i64,

    /// Height in meters
    #[serde(rename = "altura")]
    pub height: f64,

    /// Weight in kilograms
    #[serde(rename = "peso")]
    pub weight: f64,

    /// Computed body-mass index
    #[serde(rename = "resultado")]
    pub index: f64,

    /// Category label assigned by the backend ("Bajo peso", "Normal", ...)
    #[serde(rename = "categoria")]
    pub category: String,

    /// Creation instant
    #[serde(rename = "createdAt", deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Payload sent to the calculation service
///
/// Only built from values that passed [`parse_measurement`], so the backend
/// never receives an out-of-range measurement from this side.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CalculationRequest {
    #[serde(rename = "altura")]
    height: f64,

    #[serde(rename = "peso")]
    weight: f64,
}

impl CalculationRequest {
    /// Validate both numbers against their bounds and build the payload
    pub fn new(height: f64, weight: f64) -> Result<Self, ValidationError> {
        let height = parse_measurement(&height.to_string(), MeasurementKind::Height)?;
        let weight = parse_measurement(&weight.to_string(), MeasurementKind::Weight)?;
        Ok(Self { height, weight })
    }

    pub(crate) fn from_validated(height: f64, weight: f64) -> Self {
        Self { height, weight }
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }
}

/// Order records newest first, the order the history table starts from
pub fn sort_newest_first(records: &mut [CalculationRecord]) {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Order records oldest first, the order the evolution series is drawn in
pub fn sort_oldest_first(records: &mut [CalculationRecord]) {
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
}

// The backend sends RFC 3339 timestamps, but older rows were stored without an
// offset; those are taken as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!("invalid createdAt timestamp: {}", raw))
    })
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
