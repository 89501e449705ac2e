use crate::writers::SqlValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One grid cell of a methane file, as stored in `methane_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub methane_data_file_id: i64,
    pub recorded_at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub methane: f64,
}

impl MeasurementRecord {
    pub fn new(
        methane_data_file_id: i64,
        recorded_at: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        methane: f64,
    ) -> Self {
        Self {
            methane_data_file_id,
            recorded_at,
            latitude,
            longitude,
            methane,
        }
    }

    /// Parameters for the measurement insert, in column order.
    pub fn to_params(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Int(self.methane_data_file_id),
            SqlValue::Timestamp(self.recorded_at),
            SqlValue::Float(self.latitude),
            SqlValue::Float(self.longitude),
            SqlValue::Float(self.methane),
        ]
    }
}

impl fmt::Display for MeasurementRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.to_params().iter().map(ToString::to_string).collect();
        write!(f, "({})", params.join(", "))
    }
}
