//! REST API Handlers
//!
//! HTTP surface of the FCP engine: template lifecycle, default bindings,
//! device usage bookkeeping and per-guest reservation.

use crate::controlplane::FcpEngine;
use crate::domain::{FcpId, TemplateEdit, TemplateSpec};
use crate::error::{Error, ErrorKind};
use axum::{
    extract::{Json, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Comma-separated template id filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateListQuery {
    #[serde(default)]
    pub ids: Option<String>,
}

/// Options of the template details report
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplateDetailsQuery {
    #[serde(default)]
    pub raw: bool,
    #[serde(default = "default_true")]
    pub statistics: bool,
    /// Refresh the device table from the inventory first
    #[serde(default)]
    pub sync: bool,
}

/// Device preview strategy
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DevicePreviewQuery {
    #[serde(default)]
    pub same_index: bool,
}

/// Comma-separated storage provider filter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageProviderQuery {
    #[serde(default)]
    pub names: Option<String>,
}

/// Storage providers to bind to a template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindStorageProvidersRequest {
    pub storage_providers: Vec<String>,
}

/// Usage columns to write to a device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateUsageRequest {
    #[serde(default)]
    pub assigner_id: String,
    #[serde(default)]
    pub reserved: bool,
    #[serde(default)]
    pub connections: u32,
    #[serde(default)]
    pub tmpl_id: String,
}

/// Reservation request of a guest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReserveRequest {
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub storage_provider: Option<String>,
}

/// Release request of a guest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnreserveRequest {
    #[serde(default)]
    pub template_id: Option<String>,
}

/// Devices released by an unreserve call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnreserveResponse {
    pub assigner_id: String,
    pub released: Vec<FcpId>,
}

/// Connection counter after a change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionsResponse {
    pub fcp_id: FcpId,
    pub connections: u32,
}

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

fn default_true() -> bool {
    true
}

// =============================================================================
// REST Router
// =============================================================================

/// REST API router builder
pub struct RestRouter {
    engine: Arc<FcpEngine>,
}

impl RestRouter {
    pub fn new(engine: Arc<FcpEngine>) -> Self {
        Self { engine }
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        let state = AppState {
            engine: self.engine,
        };

        Router::new()
            // Template endpoints
            .route("/v1/templates", get(list_templates).post(create_template))
            .route(
                "/v1/templates/:id",
                get(get_template).put(edit_template).delete(delete_template),
            )
            .route("/v1/templates/:id/details", get(get_template_details))
            .route("/v1/templates/:id/devices", get(preview_devices))
            .route(
                "/v1/templates/:id/storage-providers",
                put(bind_storage_providers),
            )
            // Default binding endpoints
            .route("/v1/defaults/host", get(host_defaults))
            .route("/v1/defaults/storage-providers", get(storage_provider_defaults))
            // Device endpoints
            .route("/v1/fcp", get(list_fcps))
            .route("/v1/fcp/sync", post(sync_fcps))
            .route("/v1/fcp/:id/usage", get(get_usage).put(update_usage))
            .route(
                "/v1/fcp/:id/connections",
                post(increase_connections).delete(decrease_connections),
            )
            // Guest endpoints
            .route("/v1/guests/:assigner/fcps", get(guest_fcps))
            .route("/v1/guests/:assigner/templates", get(guest_templates))
            .route("/v1/guests/:assigner/reserve", post(reserve))
            .route("/v1/guests/:assigner/unreserve", post(unreserve))
            // Health & metrics
            .route("/health", get(health_check))
            .route("/metrics", get(metrics))
            .with_state(state)
    }
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    engine: Arc<FcpEngine>,
}

/// Map an engine error onto an HTTP response
fn error_response(e: Error) -> Response {
    let status = match e.kind() {
        ErrorKind::NotExist => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::Internal => {
            error!("Request failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let details = match &e {
        Error::FcpInUse { fcp_ids, .. }
        | Error::FcpMappedElsewhere { fcp_ids, .. }
        | Error::TemplateInUse { fcp_ids, .. } => Some(fcp_ids.clone()),
        _ => None,
    };
    (
        status,
        Json(ApiErrorResponse {
            error: e.kind().to_string(),
            message: e.to_string(),
            details,
        }),
    )
        .into_response()
}

fn split_list(raw: Option<&str>) -> Option<Vec<String>> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
}

fn parse_fcp_id(raw: &str) -> std::result::Result<FcpId, Response> {
    raw.parse().map_err(error_response)
}

// =============================================================================
// Template Handlers
// =============================================================================

async fn list_templates(
    State(state): State<AppState>,
    Query(query): Query<TemplateListQuery>,
) -> Response {
    let ids = split_list(query.ids.as_deref());
    match state.engine.get_fcp_templates(ids.as_deref()) {
        Ok(templates) => (StatusCode::OK, Json(templates)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn create_template(
    State(state): State<AppState>,
    Json(spec): Json<TemplateSpec>,
) -> Response {
    info!("Creating FCP Multipath Template {}", spec.name);
    match state.engine.create_fcp_template(&spec) {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_template(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.engine.get_fcp_templates(Some(std::slice::from_ref(&id))) {
        Ok(mut templates) => match templates.pop() {
            Some(template) => (StatusCode::OK, Json(template)).into_response(),
            None => error_response(Error::Internal("empty template lookup".into())),
        },
        Err(e) => error_response(e),
    }
}

async fn edit_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(changes): Json<TemplateEdit>,
) -> Response {
    match state.engine.edit_fcp_template(&id, &changes) {
        Ok(edited) => (StatusCode::OK, Json(edited)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn delete_template(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.engine.delete_fcp_template(&id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_template_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<TemplateDetailsQuery>,
) -> Response {
    match state.engine.get_fcp_templates_details(
        Some(std::slice::from_ref(&id)),
        query.raw,
        query.statistics,
        query.sync,
    ) {
        Ok(mut details) => match details.pop() {
            Some(report) => (StatusCode::OK, Json(report)).into_response(),
            None => error_response(Error::Internal("empty template report".into())),
        },
        Err(e) => error_response(e),
    }
}

/// Devices the allocator would hand out right now, without reserving them
async fn preview_devices(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DevicePreviewQuery>,
) -> Response {
    let picked = if query.same_index {
        state.engine.get_fcp_devices_with_same_index(&id)
    } else {
        state.engine.get_fcp_devices(&id)
    };
    match picked {
        Ok(devices) => (StatusCode::OK, Json(devices)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn bind_storage_providers(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<BindStorageProvidersRequest>,
) -> Response {
    match state
        .engine
        .defaults()
        .bulk_set_sp_default_by_fcp_template(&id, &request.storage_providers)
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

// =============================================================================
// Default Binding Handlers
// =============================================================================

async fn host_defaults(State(state): State<AppState>) -> Response {
    match state.engine.defaults().get_host_default_fcp_template(true) {
        Ok(templates) => (StatusCode::OK, Json(templates)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn storage_provider_defaults(
    State(state): State<AppState>,
    Query(query): Query<StorageProviderQuery>,
) -> Response {
    let names = split_list(query.names.as_deref()).unwrap_or_default();
    match state.engine.defaults().get_sp_default_fcp_template(&names) {
        Ok(templates) => (StatusCode::OK, Json(templates)).into_response(),
        Err(e) => error_response(e),
    }
}

// =============================================================================
// Device Handlers
// =============================================================================

async fn list_fcps(State(state): State<AppState>) -> Response {
    match state.engine.registry().get_all_fcps() {
        Ok(devices) => (StatusCode::OK, Json(devices)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn sync_fcps(State(state): State<AppState>) -> Response {
    match state.engine.sync_fcp_devices() {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn get_usage(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let fcp_id = match parse_fcp_id(&id) {
        Ok(fcp_id) => fcp_id,
        Err(response) => return response,
    };
    match state.engine.registry().get_usage_of_fcp(&fcp_id) {
        Ok(usage) => (StatusCode::OK, Json(usage)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn update_usage(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateUsageRequest>,
) -> Response {
    let fcp_id = match parse_fcp_id(&id) {
        Ok(fcp_id) => fcp_id,
        Err(response) => return response,
    };
    let registry = state.engine.registry();
    let updated = registry
        .update_usage_of_fcp(
            &fcp_id,
            &request.assigner_id,
            request.reserved,
            request.connections,
            &request.tmpl_id,
        )
        .and_then(|()| registry.get_usage_of_fcp(&fcp_id));
    match updated {
        Ok(usage) => (StatusCode::OK, Json(usage)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn increase_connections(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let fcp_id = match parse_fcp_id(&id) {
        Ok(fcp_id) => fcp_id,
        Err(response) => return response,
    };
    match state.engine.registry().increase_connections(&fcp_id) {
        Ok(connections) => {
            (StatusCode::OK, Json(ConnectionsResponse { fcp_id, connections })).into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn decrease_connections(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let fcp_id = match parse_fcp_id(&id) {
        Ok(fcp_id) => fcp_id,
        Err(response) => return response,
    };
    match state.engine.registry().decrease_connections(&fcp_id) {
        Ok(connections) => {
            (StatusCode::OK, Json(ConnectionsResponse { fcp_id, connections })).into_response()
        }
        Err(e) => error_response(e),
    }
}

// =============================================================================
// Guest Handlers
// =============================================================================

async fn guest_fcps(State(state): State<AppState>, Path(assigner): Path<String>) -> Response {
    match state.engine.registry().get_all_fcps_of_assigner(Some(&assigner)) {
        Ok(devices) => (StatusCode::OK, Json(devices)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn guest_templates(State(state): State<AppState>, Path(assigner): Path<String>) -> Response {
    match state.engine.defaults().get_fcp_template_by_assigner_id(&assigner) {
        Ok(templates) => (StatusCode::OK, Json(templates)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn reserve(
    State(state): State<AppState>,
    Path(assigner): Path<String>,
    Json(request): Json<ReserveRequest>,
) -> Response {
    debug!("Reserve request from {}: {:?}", assigner, request);
    match state.engine.reserve_fcp_devices(
        &assigner,
        request.template_id.as_deref(),
        request.storage_provider.as_deref(),
    ) {
        Ok(allocation) => (StatusCode::OK, Json(allocation)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn unreserve(
    State(state): State<AppState>,
    Path(assigner): Path<String>,
    Json(request): Json<UnreserveRequest>,
) -> Response {
    match state
        .engine
        .unreserve_fcp_devices(&assigner, request.template_id.as_deref())
    {
        Ok(released) => (
            StatusCode::OK,
            Json(UnreserveResponse {
                assigner_id: assigner,
                released,
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

// =============================================================================
// Health & Metrics
// =============================================================================

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.engine.db().is_open() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "database closed")
    }
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.engine.encode_metrics() {
        Ok((content_type, body)) => {
            (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], body).into_response()
        }
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AllocationConfig;
    use crate::hardware::testing::seeded_db;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router() -> Router {
        let config = AllocationConfig {
            rng_seed: Some(5),
            ..Default::default()
        };
        let engine = FcpEngine::new(seeded_db("1a00-1a01;1b00-1b01"), &config, None).unwrap();
        RestRouter::new(engine).build()
    }

    async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn template_body() -> Value {
        json!({
            "id": "t1",
            "name": "rack 4",
            "fcp_devices": "1a00-1a01;1b00-1b01",
            "host_default": true,
        })
    }

    #[tokio::test]
    async fn test_template_crud() {
        let router = router();

        let (status, created) = call(&router, "POST", "/v1/templates", Some(template_body())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["id"], "t1");
        assert_eq!(created["min_fcp_paths_count"], -1);

        let (status, _) = call(&router, "POST", "/v1/templates", Some(template_body())).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, edited) = call(
            &router,
            "PUT",
            "/v1/templates/t1",
            Some(json!({ "description": "primary" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(edited["description"], "primary");

        let (status, listed) = call(&router, "GET", "/v1/templates?ids=t1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, _) = call(&router, "DELETE", "/v1/templates/t1", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = call(&router, "GET", "/v1/templates/t1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_exist");
    }

    #[tokio::test]
    async fn test_reserve_and_release() {
        let router = router();
        call(&router, "POST", "/v1/templates", Some(template_body())).await;

        let (status, allocation) =
            call(&router, "POST", "/v1/guests/guest1/reserve", Some(json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(allocation["tmpl_id"], "t1");
        assert_eq!(allocation["fcps"].as_array().unwrap().len(), 2);

        let (status, devices) = call(&router, "GET", "/v1/guests/guest1/fcps", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(devices.as_array().unwrap().len(), 2);

        let (status, released) = call(
            &router,
            "POST",
            "/v1/guests/guest1/unreserve",
            Some(json!({ "template_id": "t1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(released["released"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let router = router();

        // no host default template yet
        let (status, body) =
            call(&router, "POST", "/v1/guests/guest1/reserve", Some(json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_exist");

        let (status, body) = call(&router, "GET", "/v1/fcp/zz99/usage", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_input");

        let (status, _) = call(
            &router,
            "POST",
            "/v1/templates",
            Some(json!({ "name": "bad", "fcp_devices": "1a00", "min_fcp_paths_count": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        // no inventory configured
        let (status, _) = call(&router, "POST", "/v1/fcp/sync", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_usage_and_connections() {
        let router = router();

        let (status, usage) = call(
            &router,
            "PUT",
            "/v1/fcp/1a00/usage",
            Some(json!({ "assigner_id": "guest1", "reserved": true, "tmpl_id": "t1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(usage["assigner_id"], "guest1");

        let (status, body) = call(&router, "POST", "/v1/fcp/1a00/connections", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connections"], 1);

        let (status, body) = call(&router, "DELETE", "/v1/fcp/1a00/connections", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connections"], 0);

        let (status, _) = call(&router, "DELETE", "/v1/fcp/1a00/connections", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_details_and_defaults() {
        let router = router();
        call(&router, "POST", "/v1/templates", Some(template_body())).await;

        let (status, _) = call(
            &router,
            "PUT",
            "/v1/templates/t1/storage-providers",
            Some(json!({ "storage_providers": ["v7k"] })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, bound) =
            call(&router, "GET", "/v1/defaults/storage-providers?names=v7k", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bound.as_array().unwrap().len(), 1);

        let (status, hosts) = call(&router, "GET", "/v1/defaults/host", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(hosts[0]["id"], "t1");

        let (status, details) =
            call(&router, "GET", "/v1/templates/t1/details?raw=true", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(details["raw"].as_array().unwrap().len(), 4);
        assert_eq!(details["statistics"]["0"]["available_count"], 2);

        let (status, preview) =
            call(&router, "GET", "/v1/templates/t1/devices?same_index=true", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(preview.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let router = router();
        let response = router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("fcp_devices_reserved"));
    }
}
