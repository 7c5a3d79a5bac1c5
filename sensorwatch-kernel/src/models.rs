use serde::{Deserialize, Serialize};

/// Une lecture télémétrique horodatée d'un hôte (payload de POST /ingest)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Reading {
    pub hostname: String,
    pub os: String,
    pub timestamp: f64,                     // secondes unix
    pub cpu_temp: Option<f64>,
    pub gpu_temp: Option<f64>,
    pub memory_usage: Option<MemoryInfo>,
}

/// Mémoire déjà arrondie côté agent (2 décimales GB, 1 décimale %)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MemoryInfo {
    #[serde(rename = "total")]
    pub total_gb: f64,
    #[serde(rename = "used")]
    pub used_gb: f64,
    #[serde(rename = "available")]
    pub available_gb: f64,
    pub percent: f64,
}
