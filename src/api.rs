//! HTTP surface under `/api`.
//!
//! Every storage failure is logged and collapsed into a `500` carrying a
//! fixed per-operation message; callers never see the underlying cause.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use rentbook_core::{Booking, Expense, Page, Property, Record, Unit};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    exchange::{ExportBundle, ImportPayload},
    manager::RentalManager,
    storage::{Collection, StorageError},
};

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<RentalManager>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(manager: Arc<RentalManager>) -> Self {
        Self {
            manager,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

#[derive(Debug)]
pub struct ApiError {
    message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>, source: StorageError) -> Self {
        let message = message.into();
        tracing::error!(error = %source, "{}", message);
        Self { message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": self.message })),
        )
            .into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let router = Router::new()
        .route("/api", get(root))
        .route("/api/", get(root))
        .route("/api/health", get(health))
        .route("/api/data/import", post(import_data))
        .route("/api/data/export", get(export_data))
        .route("/api/data/initialize", post(initialize_data))
        .route("/metrics", get(render_metrics));

    let router = record_routes::<Property>(router);
    let router = record_routes::<Unit>(router);
    let router = record_routes::<Booking>(router);
    let router = record_routes::<Expense>(router);

    router.with_state(state)
}

fn record_routes<R: Record>(router: Router<AppState>) -> Router<AppState> {
    let base = format!("/api/{}", R::COLLECTION.name());
    router
        .route(&base, get(list_records::<R>).post(create_record::<R>))
        .route(
            &format!("{}/:id", base),
            put(update_record::<R>).delete(delete_record::<R>),
        )
}

fn deleted_message(collection: Collection) -> &'static str {
    match collection {
        Collection::Properties => "Property and associated data deleted successfully",
        Collection::Units => "Unit and associated data deleted successfully",
        Collection::Bookings => "Booking deleted successfully",
        Collection::Expenses => "Expense deleted successfully",
    }
}

async fn root() -> Json<Message> {
    Message::new("Property Management System API")
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.manager.storage().ping() {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "database": "connected" })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unhealthy", "database": "disconnected" })),
            )
        }
    }
}

async fn list_records<R: Record>(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<R>>, ApiError> {
    state
        .manager
        .list::<R>(page)
        .map(Json)
        .map_err(|e| ApiError::new(format!("Failed to fetch {}", R::COLLECTION), e))
}

async fn create_record<R: Record>(
    State(state): State<AppState>,
    Json(record): Json<R>,
) -> Result<Json<R>, ApiError> {
    state
        .manager
        .create(record)
        .map(Json)
        .map_err(|e| ApiError::new(format!("Failed to create {}", R::COLLECTION.singular()), e))
}

async fn update_record<R: Record>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(record): Json<R>,
) -> Result<Json<R>, ApiError> {
    state
        .manager
        .update(&id, record)
        .map(Json)
        .map_err(|e| ApiError::new(format!("Failed to update {}", R::COLLECTION.singular()), e))
}

async fn delete_record<R: Record>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Message>, ApiError> {
    state
        .manager
        .delete::<R>(&id)
        .map(|()| Message::new(deleted_message(R::COLLECTION)))
        .map_err(|e| ApiError::new(format!("Failed to delete {}", R::COLLECTION.singular()), e))
}

async fn import_data(
    State(state): State<AppState>,
    Json(payload): Json<ImportPayload>,
) -> Result<Json<Message>, ApiError> {
    state
        .manager
        .import_all(payload)
        .map(|()| Message::new("Data imported successfully"))
        .map_err(|e| ApiError::new("Failed to import data", e))
}

async fn export_data(State(state): State<AppState>) -> Result<Json<ExportBundle>, ApiError> {
    state
        .manager
        .export_all()
        .map(Json)
        .map_err(|e| ApiError::new("Failed to export data", e))
}

async fn initialize_data(State(state): State<AppState>) -> Result<Json<Message>, ApiError> {
    state
        .manager
        .initialize_sample_data()
        .map(|outcome| Message::new(outcome.message()))
        .map_err(|e| ApiError::new("Failed to initialize sample data", e))
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
