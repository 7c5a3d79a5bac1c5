/**
 * SENSORWATCH KERNEL - Point d'entrée du collecteur central
 *
 * RÔLE : Orchestration des modules : config, store, health, HTTP.
 * Bootstrap du système complet avec gestion d'erreurs et logging.
 *
 * ARCHITECTURE : agents → POST /ingest → TimeSeriesStore ← API REST / dashboard.
 * UTILITÉ : Point central de la télémétrie matérielle des machines du réseau.
 */

mod models;
mod store;
mod http;
mod config;
mod health;

use crate::config::{load_config, KernelConfig};
use crate::health::HealthTracker;
use crate::http::AppState;
use crate::store::TimeSeriesStore;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use time::UtcOffset;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Charger les variables d'environnement depuis .env (si présent), RUST_LOG compris
    dotenvy::dotenv().ok(); // Ok si .env n'existe pas

    tracing_subscriber::fmt().with_env_filter(log_filter()).init();

    // l'offset local n'est lisible de façon sûre qu'avant le démarrage des threads du runtime
    let local_offset = UtcOffset::current_local_offset().unwrap_or_else(|_| {
        warn!("[kernel] local offset indisponible, dashboard en UTC");
        UtcOffset::UTC
    });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(serve(local_offset))
}

/// RUST_LOG (environnement ou .env), "info" par défaut
fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

async fn serve(local_offset: UtcOffset) -> Result<()> {
    let cfg: KernelConfig = load_config().await;
    cfg.validate().context("invalid kernel configuration")?;

    // store explicite, partagé par Arc avec tous les handlers
    let store = Arc::new(TimeSeriesStore::new(cfg.store.max_history));
    info!("[kernel] store ready (max_history = {})", store.max_history());

    let api_key = std::env::var("SENSORWATCH_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
        .map(Arc::<str>::from);
    if api_key.is_none() {
        warn!("[kernel] SENSORWATCH_API_KEY not set - API is open");
    }

    // fabrique l'état unique pour Axum
    let app_state = AppState {
        store,
        health_tracker: HealthTracker::new(),
        default_history_limit: cfg.api.default_history_limit,
        api_key,
        local_offset,
        static_dir: PathBuf::from(&cfg.api.static_dir),
    };

    let app = http::build_router(app_state);

    let addr: SocketAddr = cfg.listen.parse().context("invalid listen address")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("[kernel] listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("[kernel] shutdown requested");
        })
        .await
        .context("HTTP server failed")?;
    Ok(())
}
