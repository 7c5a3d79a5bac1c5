use serde::Serialize;
use std::time::Instant;

use crate::store::{StoreStats, TimeSeriesStore};

/// Réponse de GET /health
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub machines_count: usize,
}

/// Réponse de GET /system/health
#[derive(Debug, Serialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub memory_usage_mb: f32,
    pub max_history: usize,
    pub store: StoreStats,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self { start_time: Instant::now() }
    }

    pub fn get_status(&self, store: &TimeSeriesStore) -> HealthStatus {
        HealthStatus {
            status: "healthy",
            machines_count: store.get_all_hostnames().len(),
        }
    }

    pub fn get_health(&self, store: &TimeSeriesStore) -> KernelHealth {
        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            memory_usage_mb: get_memory_usage_mb(),
            max_history: store.max_history(),
            store: store.stats(),
        }
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn get_memory_usage_mb() -> f32 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            let rss_kb = status
                .lines()
                .find(|line| line.starts_with("VmRSS:"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<u64>().ok());
            if let Some(kb) = rss_kb {
                return (kb as f32) / 1024.0; // KB -> MB
            }
        }
    }

    // inconnu hors Linux
    0.0
}
