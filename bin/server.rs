// Vehicle Registration Dashboard - Web Server
// JSON API + single-page UI with Axum

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use clap::Parser;
use registration_dashboard::{
    export::to_csv_bytes, load_dataset, logging, Config, Dashboard, DashboardView, FilterError,
    FilterOptions, FilterQuery, LoadWarning, EXPORT_FILE_NAME,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared application state
#[derive(Clone)]
struct AppState {
    dashboard: Arc<RwLock<Dashboard>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::<()>::err(message))).into_response()
}

fn query_rejection_response(rejection: QueryRejection) -> Response {
    warn!(error = %rejection.body_text(), "rejected query string");
    error_response(StatusCode::BAD_REQUEST, rejection.body_text())
}

fn filter_error_response(e: FilterError) -> Response {
    let status = match e {
        FilterError::NoData => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_REQUEST,
    };
    error_response(status, e.to_string())
}

/// Options response: everything the filter widgets need
#[derive(Serialize)]
struct OptionsResponse {
    options: Option<FilterOptions>,
    files_found: Vec<String>,
    files_loaded: usize,
    warnings: Vec<LoadWarning>,
    fingerprint: String,
}

#[derive(Serialize)]
struct ReloadResponse {
    changed: bool,
    fingerprint: String,
    files_loaded: usize,
    warnings: Vec<LoadWarning>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/options - Filter choices and load diagnostics
async fn get_options(State(state): State<AppState>) -> Response {
    let Ok(dashboard) = state.dashboard.read() else {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "dashboard state poisoned");
    };
    let dataset = dashboard.dataset();

    let response = OptionsResponse {
        options: dashboard.options().cloned(),
        files_found: dataset.files_found.iter().map(|p| p.display().to_string()).collect(),
        files_loaded: dataset.files_loaded,
        warnings: dataset.warnings.clone(),
        fingerprint: dataset.fingerprint(),
    };
    (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
}

/// GET /api/dashboard - Full view for the requested filters
async fn get_dashboard(
    State(state): State<AppState>,
    query: Result<Query<FilterQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return query_rejection_response(rejection),
    };
    let Ok(dashboard) = state.dashboard.read() else {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "dashboard state poisoned");
    };

    match dashboard.resolve(&query) {
        Ok(filter) => {
            let view: DashboardView = dashboard.view(&filter);
            (StatusCode::OK, Json(ApiResponse::ok(view))).into_response()
        }
        Err(e) => {
            warn!(error = %e, "rejected dashboard query");
            filter_error_response(e)
        }
    }
}

/// GET /api/export - Filtered data as a CSV download
async fn export_csv(
    State(state): State<AppState>,
    query: Result<Query<FilterQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return query_rejection_response(rejection),
    };
    let Ok(dashboard) = state.dashboard.read() else {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "dashboard state poisoned");
    };

    let filter = match dashboard.resolve(&query) {
        Ok(filter) => filter,
        Err(e) => return filter_error_response(e),
    };

    match to_csv_bytes(&dashboard.filtered(&filter)) {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            error!("Error exporting CSV: {:#}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to build CSV export")
        }
    }
}

/// POST /api/reload - Re-read the data folder
async fn reload(State(state): State<AppState>) -> Response {
    let data_dir = match state.dashboard.read() {
        Ok(dashboard) => dashboard.config.data_dir.clone(),
        Err(_) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, "dashboard state poisoned"),
    };

    // Blocking I/O, run on the blocking pool
    let loaded = tokio::task::spawn_blocking(move || load_dataset(&data_dir)).await;
    let dataset = match loaded {
        Ok(Ok(dataset)) => dataset,
        Ok(Err(e)) => {
            error!("Error reloading data: {:#}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e));
        }
        Err(e) => {
            error!("Reload task failed: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "reload task failed");
        }
    };

    let Ok(mut dashboard) = state.dashboard.write() else {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "dashboard state poisoned");
    };
    let changed = dashboard.replace(dataset);
    let dataset = dashboard.dataset();
    let response = ReloadResponse {
        changed,
        fingerprint: dataset.fingerprint(),
        files_loaded: dataset.files_loaded,
        warnings: dataset.warnings.clone(),
    };
    (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
}

/// GET / - Serve index.html
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

// ============================================================================
// Main Server
// ============================================================================

#[derive(Parser)]
#[command(name = "dashboard-server")]
#[command(about = "Web UI for the vehicle registration dashboard", version)]
struct Cli {
    /// Config file (defaults to ./dashboard.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Folder containing the <year>/<year>-<MON>.csv files
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Address to listen on, e.g. 127.0.0.1:3000
    #[arg(long)]
    bind: Option<String>,
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/options", get(get_options))
        .route("/dashboard", get(get_dashboard))
        .route("/export", get(export_csv))
        .route("/reload", post(reload))
        .with_state(state);

    Router::new()
        .route("/", get(serve_index))
        .nest("/api", api_routes)
        .nest_service("/static", ServeDir::new("web"))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init("info,tower_http=info");
    let cli = Cli::parse();

    println!("🌐 Vehicle Registration Dashboard - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }

    let dashboard = Dashboard::load(config.clone())?;
    {
        let dataset = dashboard.dataset();
        println!(
            "✓ Loaded {} records from {} files in {}",
            dataset.records.len(),
            dataset.files_loaded,
            dataset.base.display()
        );
        for warning in &dataset.warnings {
            println!("⚠️  {}", warning);
        }
    }

    let state = AppState {
        dashboard: Arc::new(RwLock::new(dashboard)),
    };

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(addr = %config.server.bind, "listening");

    println!("\n🚀 Server running on http://{}", config.server.bind);
    println!("   API: http://{}/api/dashboard", config.server.bind);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use registration_dashboard::{Dataset, MonthKey, RegistrationRecord};
    use std::fs;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn state() -> AppState {
        let rec = |month: u32, maker: &str, two: u64| RegistrationRecord {
            period: MonthKey::new(2024, month).unwrap(),
            maker: maker.to_string(),
            two_wheeler: two,
            three_wheeler: 0,
            four_wheeler: 0,
        };
        let dataset = Dataset::from_records(vec![rec(1, "Hero", 100), rec(2, "Hero", 150), rec(2, "TVS", 50)]);
        AppState {
            dashboard: Arc::new(RwLock::new(Dashboard::new(dataset, Config::default()))),
        }
    }

    fn folder_state(dir: &TempDir) -> AppState {
        let year_dir = dir.path().join("2024");
        fs::create_dir_all(&year_dir).unwrap();
        fs::write(year_dir.join("2024-JAN.csv"), "Maker,2W,3W,4W\nHero,10,0,0\nTata,0,2,30\n").unwrap();

        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        AppState {
            dashboard: Arc::new(RwLock::new(Dashboard::load(config).unwrap())),
        }
    }

    async fn send(state: AppState, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router(state)
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        send(state(), "GET", uri).await
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json("/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "OK");
    }

    #[tokio::test]
    async fn test_dashboard_monthly() {
        let (status, body) = get_json("/api/dashboard?mode=monthly&year=2024&month=2").await;

        assert_eq!(status, StatusCode::OK);
        let metrics = &body["data"]["metrics"];
        assert_eq!(metrics["total_registrations"], 200);
        assert_eq!(metrics["growth"][0]["kind"], "MoM");
        assert_eq!(metrics["growth"][0]["percent"], 100.0);
        assert!(metrics["growth"][1]["percent"].is_null());
    }

    #[tokio::test]
    async fn test_dashboard_bad_query() {
        let (status, body) = get_json("/api/dashboard?mode=weekly").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_export_download() {
        let response = router(state())
            .oneshot(Request::builder().uri("/api/export?makers=TVS").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("TVS,2024,2,2W,50"));
    }

    #[tokio::test]
    async fn test_dashboard_non_numeric_param() {
        let (status, body) = get_json("/api/dashboard?mode=monthly&year=abc&month=2").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("deserialize"));
    }

    #[tokio::test]
    async fn test_export_non_numeric_param() {
        let (status, body) = get_json("/api/export?from=last").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_options() {
        let dir = TempDir::new().unwrap();
        let state = folder_state(&dir);
        let expected = state.dashboard.read().unwrap().dataset().fingerprint();

        let (status, body) = send(state, "GET", "/api/options").await;

        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["files_loaded"], 1);
        assert_eq!(data["files_found"].as_array().unwrap().len(), 1);
        assert_eq!(data["fingerprint"], expected.as_str());
        assert_eq!(data["options"]["max_year"], 2024);
        assert_eq!(data["options"]["default_makers"], serde_json::json!(["Tata", "Hero"]));
    }

    #[tokio::test]
    async fn test_options_without_data() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let state = AppState {
            dashboard: Arc::new(RwLock::new(Dashboard::load(config).unwrap())),
        };

        let (status, body) = send(state, "GET", "/api/options").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["options"].is_null());
        assert_eq!(body["data"]["warnings"][0]["kind"], "no_data");
    }

    #[tokio::test]
    async fn test_reload_reports_changes() {
        let dir = TempDir::new().unwrap();
        let state = folder_state(&dir);
        let initial = state.dashboard.read().unwrap().dataset().fingerprint();

        let (status, body) = send(state.clone(), "POST", "/api/reload").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["changed"], false);
        assert_eq!(body["data"]["fingerprint"], initial.as_str());

        fs::write(dir.path().join("2024").join("2024-FEB.csv"), "Maker,2W,3W,4W\nHero,25,0,0\n").unwrap();

        let (status, body) = send(state.clone(), "POST", "/api/reload").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["changed"], true);
        assert_eq!(body["data"]["files_loaded"], 2);
        assert_ne!(body["data"]["fingerprint"], initial.as_str());

        let (_, body) = send(state, "GET", "/api/dashboard?mode=monthly&year=2024&month=2").await;
        assert_eq!(body["data"]["metrics"]["total_registrations"], 25);
    }
}
