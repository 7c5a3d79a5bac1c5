/**
 * API REST SENSORWATCH - Frontière HTTP du collecteur
 *
 * RÔLE :
 * Reçoit les lectures des agents (POST /ingest) et expose le TimeSeriesStore
 * au dashboard et aux clients API.
 *
 * FONCTIONNEMENT :
 * - Serveur Axum, état unique AppState injecté dans chaque handler (pas de global)
 * - Validation du payload par l'extracteur Json<Reading> : un payload incomplet
 *   est rejeté (4xx) avant d'atteindre le store
 * - Routes : /, /ingest, /api/current, /api/history/{hostname}, /health, /system/health
 * - Dashboard rendu par Askama (templates/dashboard.html), graphiques servis sous /static
 *
 * SÉCURITÉ :
 * - Si SENSORWATCH_API_KEY est défini, header x-api-key obligatoire
 *   sur toutes les routes sauf /health (dashboard et /static compris)
 * - Sans clé configurée, l'API est ouverte
 */

use askama::Template;
use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tower_http::services::ServeDir;
use tracing::{debug, error, warn};

use crate::health::{HealthStatus, HealthTracker, KernelHealth};
use crate::models::Reading;
use crate::store::SharedStore;

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub health_tracker: HealthTracker,
    pub default_history_limit: usize,
    pub api_key: Option<Arc<str>>,
    pub local_offset: UtcOffset,   // résolu avant le démarrage du runtime
    pub static_dir: PathBuf,
}

#[derive(Debug, Serialize)]
struct IngestAck {
    status: &'static str,
    hostname: String,
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct HistoryView {
    hostname: String,
    readings: Vec<Reading>,
}

/// Ligne du dashboard, valeurs déjà formatées pour l'affichage
struct MachineRow {
    hostname: String,
    os: String,
    cpu: String,
    gpu: String,
    memory: String,
    updated: String,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    machines: Vec<MachineRow>,
}

/// Rendu Askama → réponse Axum (500 si le rendu échoue)
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(rendered) => Html(rendered).into_response(),
            Err(e) => {
                error!("[http] template render failed: {e}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

async fn require_api_key(
    State(app): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = app.api_key.as_deref() else {
        return Ok(next.run(req).await);
    };

    // Health check toujours accessible
    let path = req.uri().path();
    if path.starts_with("/health") {
        return Ok(next.run(req).await);
    }

    let ok = req.headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false);

    if !ok {
        warn!("[http] unauthorized request on {path}");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/ingest", post(ingest))
        .route("/api/current", get(get_current))
        .route("/api/history/{hostname}", get(get_history))
        .route("/health", get(get_status))
        .route("/system/health", get(get_system_health))
        .nest_service("/static", ServeDir::new(&app_state.static_dir))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_api_key))
        .with_state(app_state)
}

// POST /ingest
async fn ingest(State(app): State<AppState>, Json(reading): Json<Reading>) -> Json<IngestAck> {
    let hostname = reading.hostname.clone();
    if app.store.add_reading(reading) {
        debug!("[http] ingested reading from {hostname}");
    }
    Json(IngestAck { status: "ok", hostname })
}

// GET /api/current
async fn get_current(State(app): State<AppState>) -> Json<BTreeMap<String, Reading>> {
    Json(app.store.get_current_data())
}

// GET /api/history/{hostname}?limit=N
async fn get_history(
    State(app): State<AppState>,
    Path(hostname): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Json<HistoryView> {
    let limit = params.limit.unwrap_or(app.default_history_limit);
    let readings = app.store.get_history(&hostname, limit);
    Json(HistoryView { hostname, readings })
}

// GET /health
async fn get_status(State(app): State<AppState>) -> Json<HealthStatus> {
    Json(app.health_tracker.get_status(&app.store))
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.health_tracker.get_health(&app.store))
}

// GET / (dashboard)
async fn dashboard(State(app): State<AppState>) -> HtmlTemplate<DashboardTemplate> {
    let machines = app
        .store
        .get_current_data()
        .into_iter()
        .map(|(hostname, r)| to_row(hostname, &r, app.local_offset))
        .collect();
    HtmlTemplate(DashboardTemplate { machines })
}

/// Timestamp unix → "YYYY-MM-DD HH:MM:SS" dans le fuseau donné
pub fn format_timestamp(timestamp: f64, offset: UtcOffset) -> String {
    if !timestamp.is_finite() {
        return "-".into();
    }
    match OffsetDateTime::from_unix_timestamp(timestamp.trunc() as i64) {
        Ok(dt) => dt
            .to_offset(offset)
            .format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
            .unwrap_or_else(|_| "-".into()),
        Err(_) => "-".into(),
    }
}

fn fmt_temp(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.1} °C")).unwrap_or_else(|| "N/A".into())
}

fn to_row(hostname: String, r: &Reading, offset: UtcOffset) -> MachineRow {
    let memory = r
        .memory_usage
        .as_ref()
        .map(|m| format!("{:.2} / {:.2} GB ({:.1}%)", m.used_gb, m.total_gb, m.percent))
        .unwrap_or_else(|| "N/A".into());
    MachineRow {
        hostname,
        os: r.os.clone(),
        cpu: fmt_temp(r.cpu_temp),
        gpu: fmt_temp(r.gpu_temp),
        memory,
        updated: format_timestamp(r.timestamp, offset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TimeSeriesStore;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    fn test_state(max_history: usize, api_key: Option<&str>) -> AppState {
        AppState {
            store: Arc::new(TimeSeriesStore::new(max_history)),
            health_tracker: HealthTracker::new(),
            default_history_limit: 60,
            api_key: api_key.map(Arc::from),
            local_offset: UtcOffset::UTC,
            static_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/static")),
        }
    }

    async fn start_test_server(state: AppState) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = build_router(state);
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn payload(host: &str, ts: f64) -> Value {
        json!({
            "hostname": host, "os": "Linux", "timestamp": ts,
            "cpu_temp": 55.0, "gpu_temp": null,
            "memory_usage": { "total": 16.0, "used": 8.0, "available": 8.0, "percent": 50.0 }
        })
    }

    #[tokio::test]
    async fn test_ingest_then_current() {
        let base = start_test_server(test_state(100, None)).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/ingest"))
            .json(&json!({
                "hostname": "node1", "os": "Linux", "timestamp": 1000,
                "cpu_temp": 55.0, "gpu_temp": null,
                "memory_usage": { "total": 16, "used": 8, "available": 8, "percent": 50.0 }
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let ack: Value = resp.json().await.unwrap();
        assert_eq!(ack, json!({ "status": "ok", "hostname": "node1" }));

        let current: BTreeMap<String, Reading> = client
            .get(format!("{base}/api/current"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(current.len(), 1);
        let expected: Reading = serde_json::from_value(payload("node1", 1000.0)).unwrap();
        assert_eq!(current["node1"], expected);
    }

    #[tokio::test]
    async fn test_history_returns_last_sixty_oldest_first() {
        let base = start_test_server(test_state(100, None)).await;
        let client = reqwest::Client::new();

        for i in 1..=150 {
            let resp = client
                .post(format!("{base}/ingest"))
                .json(&payload("node1", i as f64))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), 200);
        }

        let body: Value = client
            .get(format!("{base}/api/history/node1?limit=60"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["hostname"], "node1");
        let ts: Vec<f64> = body["readings"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["timestamp"].as_f64().unwrap())
            .collect();
        let expected: Vec<f64> = (91..=150).map(|i| i as f64).collect();
        assert_eq!(ts, expected);

        // limite par défaut = 60
        let body: Value = client
            .get(format!("{base}/api/history/node1"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["readings"].as_array().unwrap().len(), 60);
    }

    #[tokio::test]
    async fn test_unknown_host_history_is_empty() {
        let base = start_test_server(test_state(100, None)).await;
        let body: Value = reqwest::get(format!("{base}/api/history/ghost?limit=10"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({ "hostname": "ghost", "readings": [] }));
    }

    #[tokio::test]
    async fn test_invalid_payload_is_rejected_without_mutation() {
        let state = test_state(100, None);
        let store = state.store.clone();
        let base = start_test_server(state).await;
        let client = reqwest::Client::new();

        let bad = [
            json!({ "os": "Linux", "timestamp": 1.0 }),
            json!({ "hostname": "h", "timestamp": 1.0 }),
            json!({ "hostname": "h", "os": "Linux", "timestamp": "yesterday" }),
            json!({ "hostname": 42, "os": "Linux", "timestamp": 1.0 }),
        ];
        for body in bad {
            let resp = client.post(format!("{base}/ingest")).json(&body).send().await.unwrap();
            assert!(resp.status().is_client_error(), "accepted {body}");
        }
        assert!(store.get_current_data().is_empty());
        assert_eq!(store.stats().ingested, 0);
    }

    #[tokio::test]
    async fn test_empty_hostname_is_acknowledged_but_not_stored() {
        let state = test_state(100, None);
        let store = state.store.clone();
        let base = start_test_server(state).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/ingest"))
            .json(&payload("", 1.0))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert!(store.get_all_hostnames().is_empty());
        assert_eq!(store.stats().rejected, 1);
    }

    #[tokio::test]
    async fn test_health_counts_machines() {
        let state = test_state(100, None);
        let store = state.store.clone();
        let base = start_test_server(state).await;

        for host in ["a", "b", "a"] {
            store.add_reading(serde_json::from_value(payload(host, 1.0)).unwrap());
        }
        let body: Value = reqwest::get(format!("{base}/health")).await.unwrap().json().await.unwrap();
        assert_eq!(body, json!({ "status": "healthy", "machines_count": 2 }));

        let body: Value = reqwest::get(format!("{base}/system/health")).await.unwrap().json().await.unwrap();
        assert_eq!(body["store"]["ingested"], 3);
        assert_eq!(body["max_history"], 100);
    }

    #[tokio::test]
    async fn test_api_key_guard() {
        let base = start_test_server(test_state(100, Some("s3cret"))).await;
        let client = reqwest::Client::new();

        let resp = client.get(format!("{base}/api/current")).send().await.unwrap();
        assert_eq!(resp.status(), 401);

        let resp = client
            .get(format!("{base}/api/current"))
            .header("x-api-key", "s3cret")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let resp = client.get(format!("{base}/health")).send().await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn test_api_key_guards_dashboard_and_static() {
        let state = test_state(100, Some("s3cret"));
        let mut reading: Value = payload("secret-host", 1.0);
        reading["cpu_temp"] = json!(77.0);
        state.store.add_reading(serde_json::from_value(reading).unwrap());
        let base = start_test_server(state).await;
        let client = reqwest::Client::new();

        for path in ["/", "/static/charts.js"] {
            let resp = client.get(format!("{base}{path}")).send().await.unwrap();
            assert_eq!(resp.status(), 401, "{path} served without key");
            let body = resp.text().await.unwrap();
            assert!(!body.contains("secret-host"));
        }

        let html = client
            .get(format!("{base}/"))
            .header("x-api-key", "s3cret")
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(html.contains("secret-host"));
        assert!(html.contains("77.0 °C"));
    }

    #[tokio::test]
    async fn test_dashboard_renders_formatted_time() {
        let state = test_state(100, None);
        state.store.add_reading(serde_json::from_value(payload("<node>", 0.0)).unwrap());
        let base = start_test_server(state).await;

        let html = reqwest::get(format!("{base}/")).await.unwrap().text().await.unwrap();
        assert!(html.contains("1970-01-01 00:00:00"));
        assert!(!html.contains("<node>"));
        assert!(html.contains("&lt;node&gt;") || html.contains("&#60;node&#62;"));
        assert!(html.contains("55.0 °C"));
        assert!(html.contains("8.00 / 16.00 GB (50.0%)"));
        assert!(!html.contains("No machines reporting yet"));
    }

    #[tokio::test]
    async fn test_dashboard_has_one_chart_per_host() {
        let state = test_state(100, None);
        for host in ["alpha", "beta"] {
            state.store.add_reading(serde_json::from_value(payload(host, 1.0)).unwrap());
        }
        let base = start_test_server(state).await;

        let html = reqwest::get(format!("{base}/")).await.unwrap().text().await.unwrap();
        assert_eq!(html.matches("class=\"chart-container\"").count(), 2);
        assert!(html.contains("data-hostname=\"alpha\""));
        assert!(html.contains("data-hostname=\"beta\""));
        assert!(html.contains("/static/charts.js"));
    }

    #[tokio::test]
    async fn test_empty_dashboard() {
        let base = start_test_server(test_state(100, None)).await;

        let resp = reqwest::get(format!("{base}/")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let html = resp.text().await.unwrap();
        assert!(html.contains("No machines reporting yet"));
        assert!(!html.contains("class=\"chart-container\""));
    }

    #[tokio::test]
    async fn test_chart_script_is_served() {
        let base = start_test_server(test_state(100, None)).await;

        let resp = reqwest::get(format!("{base}/static/charts.js")).await.unwrap();
        assert_eq!(resp.status(), 200);
        let script = resp.text().await.unwrap();
        assert!(script.contains("/api/history/"));
        assert!(script.contains("function updateAllCharts"));

        let resp = reqwest::get(format!("{base}/static/missing.js")).await.unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(1000.9, UtcOffset::UTC), "1970-01-01 00:16:40");
        let plus_two = UtcOffset::from_hms(2, 0, 0).unwrap();
        assert_eq!(format_timestamp(0.0, plus_two), "1970-01-01 02:00:00");
        assert_eq!(format_timestamp(f64::NAN, UtcOffset::UTC), "-");
    }
}
