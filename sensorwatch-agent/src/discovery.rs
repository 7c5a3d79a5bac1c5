//! System identification for SensorWatch agents
//!
//! Resolves the hostname readings are keyed by and the OS family name
//! reported alongside them. Failing to resolve the hostname is fatal.

use anyhow::{bail, Context, Result};
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct SystemInfo {
    pub hostname: String,
    pub os: String,
}

impl SystemInfo {
    pub fn discover() -> Result<Self> {
        let hostname = hostname::get()
            .context("Failed to resolve hostname")?
            .to_string_lossy()
            .trim()
            .to_string();
        if hostname.is_empty() {
            bail!("Hostname resolved to an empty string");
        }

        let os = os_family(std::env::consts::OS).to_string();
        info!("Discovery complete - Hostname: {}, OS: {}", hostname, os);

        Ok(SystemInfo { hostname, os })
    }
}

/// Platform family name as reported on the dashboard
pub fn os_family(target_os: &str) -> &str {
    match target_os {
        "linux" | "android" => "Linux",
        "windows" => "Windows",
        "macos" | "ios" => "Darwin",
        "freebsd" => "FreeBSD",
        other => other,
    }
}
