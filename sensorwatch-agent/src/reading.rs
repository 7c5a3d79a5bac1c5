//! Telemetry payload sent to the kernel's `/ingest` endpoint

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// One timestamped telemetry snapshot from this host
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Reading {
    pub hostname: String,
    pub os: String,
    pub timestamp: f64,
    pub cpu_temp: Option<f64>,
    pub gpu_temp: Option<f64>,
    pub memory_usage: Option<MemoryInfo>,
}

/// Memory usage, rounded when probed (GB to 2 decimals, percent to 1)
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MemoryInfo {
    #[serde(rename = "total")]
    pub total_gb: f64,
    #[serde(rename = "used")]
    pub used_gb: f64,
    #[serde(rename = "available")]
    pub available_gb: f64,
    pub percent: f64,
}

/// Unix seconds with sub-second precision
pub fn unix_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}

struct Celsius(Option<f64>);

impl fmt::Display for Celsius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{v}°C"),
            None => f.write_str("N/A"),
        }
    }
}

impl Reading {
    /// Compact sensor summary used in delivery logs
    pub fn summary(&self) -> String {
        let mut out = format!("CPU={}, GPU={}", Celsius(self.cpu_temp), Celsius(self.gpu_temp));
        if let Some(mem) = &self.memory_usage {
            out.push_str(&format!(", Memory={}%", mem.percent));
        }
        out
    }
}
