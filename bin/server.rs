// Initech CRM - Web Server
// Funnel and customer table pages backed by a JSON API over the in-memory store

use anyhow::{Context, Result};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use initech_crm::{
    backend_for, build_store, init_logging, load_settings, BackendKind, CrmError, Customer,
    CustomerBackend, CustomerStatus, CustomerStore, FunnelGrouping, LogSink, StatusChange,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<RwLock<CustomerStore>>,
    backend: Arc<dyn CustomerBackend + Send + Sync>,
    avatar_base_url: Arc<str>,
}

impl AppState {
    fn new(store: CustomerStore, backend: Arc<dyn CustomerBackend + Send + Sync>, avatar_base_url: &str) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
            backend,
            avatar_base_url: Arc::from(avatar_base_url),
        }
    }

    // A panicked writer cannot leave a half-built snapshot behind, so a
    // poisoned lock is still safe to use.
    fn read_store(&self) -> RwLockReadGuard<'_, CustomerStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_store(&self) -> RwLockWriteGuard<'_, CustomerStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ApiError>,
    /// Local change applied but not persisted
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            warning: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiError {
    code: &'static str,
    message: String,
}

/// Customer as shown by both pages
#[derive(Debug, Serialize)]
struct CustomerResponse {
    id: u32,
    name: String,
    email: String,
    status: CustomerStatus,
    initials: String,
    avatar_url: String,
}

impl CustomerResponse {
    fn new(customer: &Customer, avatar_base_url: &str) -> Self {
        Self {
            id: customer.id,
            name: customer.name.clone(),
            email: customer.email.clone(),
            status: customer.status,
            initials: customer.initials(),
            avatar_url: customer.avatar_url(avatar_base_url),
        }
    }
}

#[derive(Debug, Serialize)]
struct FunnelStageResponse {
    status: CustomerStatus,
    color: &'static str,
    count: usize,
    customers: Vec<CustomerResponse>,
}

#[derive(Debug, Serialize)]
struct StatusOption {
    value: CustomerStatus,
    color: &'static str,
}

#[derive(Debug, Deserialize)]
struct StatusUpdateRequest {
    status: String,
}

fn failure(status: StatusCode, code: &'static str, message: String) -> Response {
    let body = ApiResponse::<()> {
        success: false,
        data: None,
        error: Some(ApiError { code, message }),
        warning: None,
    };

    (status, Json(body)).into_response()
}

fn error_response(err: CrmError) -> Response {
    let status = match err {
        CrmError::NotFound(_) => StatusCode::NOT_FOUND,
        CrmError::InvalidStatus(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CrmError::Backend(_) => StatusCode::BAD_GATEWAY,
        CrmError::DuplicateId(_) | CrmError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    failure(status, err.code(), err.to_string())
}

/// Malformed path or body, answered in the same envelope as every other error
fn bad_request(status: StatusCode, message: String) -> Response {
    failure(status, "bad_request", message)
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/statuses - Status options in funnel order
async fn get_statuses() -> impl IntoResponse {
    let options: Vec<StatusOption> = CustomerStatus::ALL
        .iter()
        .map(|status| StatusOption {
            value: *status,
            color: status.color_name(),
        })
        .collect();

    Json(ApiResponse::ok(options))
}

/// GET /api/customers - All customers in collection order
async fn get_customers(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.read_store().snapshot();

    let response: Vec<CustomerResponse> = snapshot
        .iter()
        .map(|customer| CustomerResponse::new(customer, &state.avatar_base_url))
        .collect();

    Json(ApiResponse::ok(response))
}

/// GET /api/funnel - Customers grouped by stage, empty stages included
async fn get_funnel(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.read_store().snapshot();
    let funnel = FunnelGrouping::group(&snapshot);

    let response: Vec<FunnelStageResponse> = funnel
        .stages()
        .map(|(status, bucket)| FunnelStageResponse {
            status,
            color: status.color_name(),
            count: bucket.len(),
            customers: bucket
                .iter()
                .map(|customer| CustomerResponse::new(customer, &state.avatar_base_url))
                .collect(),
        })
        .collect();

    Json(ApiResponse::ok(response))
}

/// GET /api/history - Applied status changes, oldest first
async fn get_history(State(state): State<AppState>) -> impl IntoResponse {
    let history: Vec<StatusChange> = state.read_store().history().to_vec();
    Json(ApiResponse::ok(history))
}

/// POST /api/customers/:id/status - Change one customer's status
async fn update_status(
    State(state): State<AppState>,
    customer_id: Result<Path<u32>, PathRejection>,
    request: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> Response {
    let Path(customer_id) = match customer_id {
        Ok(path) => path,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "rejecting customer id");
            return bad_request(rejection.status(), rejection.body_text());
        }
    };
    let Json(request) = match request {
        Ok(json) => json,
        Err(rejection) => {
            warn!(customer_id, error = %rejection.body_text(), "rejecting status update body");
            return bad_request(rejection.status(), rejection.body_text());
        }
    };

    let status: CustomerStatus = match request.status.parse() {
        Ok(status) => status,
        Err(err) => {
            warn!(customer_id, raw = %request.status, "rejecting invalid status");
            return error_response(err);
        }
    };

    let result = state.write_store().try_set_status(customer_id, status);
    let updated = match result {
        Ok(customer) => customer,
        Err(err) => {
            warn!(customer_id, status = %status, error = %err, "status change ignored");
            return error_response(err);
        }
    };

    // Local state stays updated even when persisting fails
    let warning = match state.backend.update_customer_status(&updated, status) {
        Ok(_) => None,
        Err(err) => {
            error!(customer_id, backend = state.backend.name(), error = %err, "failed to persist status");
            Some(err.to_string())
        }
    };

    let response = ApiResponse {
        success: true,
        data: Some(CustomerResponse::new(&updated, &state.avatar_base_url)),
        error: None,
        warning,
    };

    (StatusCode::OK, Json(response)).into_response()
}

/// GET / - Serve funnel page
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

/// GET /customers - Serve customers table page
async fn serve_customers() -> impl IntoResponse {
    Html(include_str!("../web/customers.html"))
}

/// GET /static/app.js - Shared page script
async fn serve_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        include_str!("../web/app.js"),
    )
}

fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/statuses", get(get_statuses))
        .route("/customers", get(get_customers))
        .route("/customers/:id/status", post(update_status))
        .route("/funnel", get(get_funnel))
        .route("/history", get(get_history))
        .with_state(state);

    Router::new()
        .route("/", get(serve_index))
        .route("/customers", get(serve_customers))
        .route("/static/app.js", get(serve_script))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "crm-server", version, about = "Initech CRM web server")]
struct Cli {
    /// Settings file (defaults to ./crm.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed customers from a CSV file (id,name,email,status)
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:3000
    #[arg(long)]
    bind: Option<String>,

    /// Where status changes are saved (local or offline)
    #[arg(long)]
    backend: Option<BackendKind>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(seed) = cli.seed {
        settings.seed_file = Some(seed);
    }
    if let Some(bind) = cli.bind {
        settings.bind_addr = bind;
    }
    if let Some(backend) = cli.backend {
        settings.backend = backend;
    }

    init_logging(&settings.log_filter, settings.log_file.as_deref(), LogSink::Stdout)?;

    let store = build_store(&settings)?;
    info!(customers = store.snapshot().len(), "customer store ready");

    let backend: Arc<dyn CustomerBackend + Send + Sync> = Arc::from(backend_for(settings.backend));
    info!(backend = backend.name(), "status changes saved through backend");

    let state = AppState::new(store, backend, &settings.avatar_base_url);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", settings.bind_addr))?;

    info!(addr = %settings.bind_addr, "server listening");
    info!("UI: http://{}/  API: http://{}/api/customers", settings.bind_addr, settings.bind_addr);

    axum::serve(listener, app).await.context("Server failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body, body::Body, http::Request};
    use initech_crm::{seed_customers, LocalOnlyBackend, UnavailableBackend, DEFAULT_AVATAR_BASE_URL};
    use serde_json::Value;
    use tower::ServiceExt;

    fn test_state(backend: Arc<dyn CustomerBackend + Send + Sync>) -> AppState {
        let store = CustomerStore::from_customers(seed_customers()).expect("store");
        AppState::new(store, backend, DEFAULT_AVATAR_BASE_URL)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).expect("json"))
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).expect("request")
    }

    fn status_request(id: &str, status: &str) -> Request<Body> {
        Request::post(format!("/api/customers/{}/status", id))
            .header("content-type", "application/json")
            .body(Body::from(serde_json::json!({ "status": status }).to_string()))
            .expect("request")
    }

    fn raw_status_request(id: &str, body: &str) -> Request<Body> {
        Request::post(format!("/api/customers/{}/status", id))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn test_health() {
        let app = build_router(test_state(Arc::new(LocalOnlyBackend)));
        let (status, json) = send(app, get_request("/api/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], "OK");
    }

    #[tokio::test]
    async fn test_customers_in_seed_order() {
        let app = build_router(test_state(Arc::new(LocalOnlyBackend)));
        let (status, json) = send(app, get_request("/api/customers")).await;

        assert_eq!(status, StatusCode::OK);
        let customers = json["data"].as_array().expect("array");
        assert_eq!(customers.len(), 5);
        assert_eq!(customers[0]["name"], "Alice Johnson");
        assert_eq!(customers[0]["initials"], "AJ");
        assert_eq!(customers[0]["status"], "New");
        assert_eq!(
            customers[0]["avatar_url"],
            "https://api.dicebear.com/6.x/initials/svg?seed=Alice%20Johnson"
        );
        assert_eq!(customers[4]["id"], 5);
    }

    #[tokio::test]
    async fn test_statuses_in_funnel_order() {
        let app = build_router(test_state(Arc::new(LocalOnlyBackend)));
        let (_, json) = send(app, get_request("/api/statuses")).await;

        let values: Vec<&str> = json["data"]
            .as_array()
            .expect("array")
            .iter()
            .map(|s| s["value"].as_str().expect("str"))
            .collect();
        assert_eq!(values, vec!["New", "Contract Sent", "Contract Signed"]);
    }

    #[tokio::test]
    async fn test_funnel_counts() {
        let app = build_router(test_state(Arc::new(LocalOnlyBackend)));
        let (status, json) = send(app, get_request("/api/funnel")).await;

        assert_eq!(status, StatusCode::OK);
        let stages = json["data"].as_array().expect("array");
        assert_eq!(stages.len(), 3);
        assert_eq!(stages[0]["status"], "New");
        assert_eq!(stages[0]["count"], 2);
        assert_eq!(stages[1]["count"], 2);
        assert_eq!(stages[2]["count"], 1);
        assert_eq!(stages[2]["color"], "green");
        assert_eq!(stages[0]["customers"][1]["name"], "David Lee");
    }

    #[tokio::test]
    async fn test_update_status_regroups() {
        let app = build_router(test_state(Arc::new(LocalOnlyBackend)));

        let (status, json) = send(app.clone(), status_request("1", "Contract Signed")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "Contract Signed");
        assert_eq!(json["data"]["name"], "Alice Johnson");
        assert!(json.get("warning").is_none());

        let (_, funnel) = send(app.clone(), get_request("/api/funnel")).await;
        assert_eq!(funnel["data"][0]["count"], 1);
        assert_eq!(funnel["data"][1]["count"], 2);
        assert_eq!(funnel["data"][2]["count"], 2);
        assert_eq!(funnel["data"][2]["customers"][0]["id"], 1);

        let (_, history) = send(app, get_request("/api/history")).await;
        assert_eq!(history["data"][0]["customer_id"], 1);
        assert_eq!(history["data"][0]["from"], "New");
        assert_eq!(history["data"][0]["to"], "Contract Signed");
    }

    #[tokio::test]
    async fn test_update_unknown_customer() {
        let app = build_router(test_state(Arc::new(LocalOnlyBackend)));

        let (_, before) = send(app.clone(), get_request("/api/customers")).await;
        let (status, json) = send(app.clone(), status_request("999", "New")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "not_found");

        let (_, after) = send(app, get_request("/api/customers")).await;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_update_invalid_status() {
        let app = build_router(test_state(Arc::new(LocalOnlyBackend)));

        let (status, json) = send(app.clone(), status_request("2", "Closed Won")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error"]["code"], "invalid_status");

        let (_, customers) = send(app, get_request("/api/customers")).await;
        assert_eq!(customers["data"][1]["status"], "Contract Sent");
    }

    #[tokio::test]
    async fn test_update_malformed_body_uses_envelope() {
        let app = build_router(test_state(Arc::new(LocalOnlyBackend)));

        let (status, json) = send(app.clone(), raw_status_request("1", r#"{"stat":1}"#)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "bad_request");
        assert!(json["error"]["message"].is_string());

        let (status, json) = send(app.clone(), raw_status_request("1", r#"{"status":"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "bad_request");

        let (_, customers) = send(app, get_request("/api/customers")).await;
        assert_eq!(customers["data"][0]["status"], "New");
    }

    #[tokio::test]
    async fn test_update_non_numeric_id_uses_envelope() {
        let app = build_router(test_state(Arc::new(LocalOnlyBackend)));

        let (status, json) = send(app, status_request("abc", "New")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_backend_failure_keeps_local_change() {
        let backend = UnavailableBackend {
            reason: "offline".to_string(),
        };
        let app = build_router(test_state(Arc::new(backend)));

        let (status, json) = send(app.clone(), status_request("4", "contract_sent")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "Contract Sent");
        assert_eq!(
            json["warning"],
            "backend error: could not save customer 4: offline"
        );

        let (_, customers) = send(app, get_request("/api/customers")).await;
        assert_eq!(customers["data"][3]["status"], "Contract Sent");
    }

    #[tokio::test]
    async fn test_offline_backend_setting_warns() {
        let app = build_router(test_state(Arc::from(backend_for(BackendKind::Offline))));

        let (status, json) = send(app, status_request("2", "New")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "New");
        assert_eq!(
            json["warning"],
            "backend error: could not save customer 2: backend is offline"
        );
    }

    #[tokio::test]
    async fn test_pages_served() {
        let app = build_router(test_state(Arc::new(LocalOnlyBackend)));

        for uri in ["/", "/customers", "/static/app.js"] {
            let response = app.clone().oneshot(get_request(uri)).await.expect("response");
            assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        }
    }
}
