use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

use crate::store::DEFAULT_MAX_HISTORY;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct KernelConfig {
    pub listen: String,        // ex: "0.0.0.0:8000"
    pub store: StoreConf,
    pub api: ApiConf,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StoreConf {
    pub max_history: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ApiConf {
    pub default_history_limit: usize,
    pub static_dir: String,    // script des graphiques, relatif au répertoire courant
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("store.max_history must be at least 1")]
    ZeroHistory,
    #[error("invalid listen address '{0}'")]
    BadListen(String),
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".into(),
            store: StoreConf::default(),
            api: ApiConf::default(),
        }
    }
}

impl Default for StoreConf {
    fn default() -> Self {
        Self { max_history: DEFAULT_MAX_HISTORY }
    }
}

impl Default for ApiConf {
    fn default() -> Self {
        Self { default_history_limit: 60, static_dir: "static".into() }
    }
}

impl KernelConfig {
    /// Valeurs sémantiquement invalides → erreur fatale au démarrage
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.max_history == 0 {
            return Err(ConfigError::ZeroHistory);
        }
        if self.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::BadListen(self.listen.clone()));
        }
        Ok(())
    }
}

pub fn parse_config(txt: &str) -> KernelConfig {
    if txt.trim().is_empty() { return KernelConfig::default(); }
    serde_yaml::from_str(txt).unwrap_or_else(|e| {
        warn!("[kernel] config invalide: {e}");
        KernelConfig::default()
    })
}

pub async fn load_config() -> KernelConfig {
    let path = std::env::var("SENSORWATCH_KERNEL_CONFIG").unwrap_or_else(|_| "kernel.yaml".into());
    if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        info!("[kernel] config chargée depuis {path}");
        parse_config(&txt)
    } else {
        info!("[kernel] pas de {path}, usage config par défaut");
        KernelConfig::default()
    }
}
