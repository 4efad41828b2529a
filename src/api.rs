use axum::{
    extract::{rejection::JsonRejection, Json, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::config::Config;
use crate::devices::DeviceDirectory;
use crate::error::{StoreError, StoreResult};
use crate::metrics;
use crate::models::{Device, DeviceNameRequest, DeviceSummary, NewNotification, Notification};
use crate::notifications::NotificationStore;

// Request models
#[derive(Deserialize)]
struct RangeQuery {
    start: Option<String>,
    end: Option<String>,
}

#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

// API state
pub struct ApiState {
    pub notifications: NotificationStore,
    pub devices: DeviceDirectory,
}

impl ApiState {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self {
            notifications: NotificationStore::new(db_pool.clone()),
            devices: DeviceDirectory::new(db_pool),
        }
    }
}

type ApiResult<T> = Result<T, StoreError>;

// Set up API router
pub fn create_api_router(state: Arc<ApiState>, config: &Config) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/notifications", post(create_notification))
        .route("/api/notifications/all", delete(delete_all_notifications))
        .route("/api/notifications/purge", post(purge_deleted_notifications))
        .route(
            "/api/notifications/:id",
            get(get_notification).delete(delete_notification),
        )
        .route(
            "/api/notifications/device/:device_id",
            get(get_notifications_by_device),
        )
        .route(
            "/api/notifications/device/:device_id/range",
            get(get_notifications_by_date_range),
        )
        .route(
            "/api/notifications/device/:device_id/search",
            get(search_notifications),
        )
        .route("/api/devices", get(list_devices_with_names))
        .route("/api/devices/ids", get(list_device_ids))
        .route(
            "/api/devices/names",
            get(list_device_names).post(upsert_device_name),
        )
        .route(
            "/api/devices/names/:device_id",
            get(get_device_name).delete(delete_device_name),
        )
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(ConcurrencyLimitLayer::new(config.max_concurrent_requests))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()) // For development - restrict in production
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics_endpoint() -> Response {
    match metrics::encode() {
        Ok(exposition) => (
            [(header::CONTENT_TYPE, exposition.content_type)],
            exposition.body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Error encoding metrics: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn parse_instant(name: &str, raw: Option<String>) -> StoreResult<OffsetDateTime> {
    let raw = raw
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| StoreError::invalid(format!("{} is required", name)))?;
    // An unescaped '+' offset arrives as a space after query decoding.
    let raw = raw.trim().replace(' ', "+");
    OffsetDateTime::parse(&raw, &Rfc3339)
        .map_err(|_| StoreError::invalid(format!("invalid {} date format", name)))
}

// Notification handlers
async fn create_notification(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<NewNotification>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Notification>)> {
    let Json(req) = payload.map_err(|e| StoreError::invalid(e.body_text()))?;
    req.validate()?;

    let created = state.notifications.create(&req).await?;
    tracing::info!(id = created.id, device_id = %created.device_id, "Notification ingested");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_notification(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Notification>> {
    let id: i64 = id
        .parse()
        .map_err(|_| StoreError::invalid("invalid id format"))?;
    Ok(Json(state.notifications.get_by_id(id).await?))
}

async fn delete_notification(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id: i64 = id
        .parse()
        .map_err(|_| StoreError::invalid("invalid id format"))?;
    state.notifications.delete(id).await?;
    Ok(Json(json!({ "message": "Notification deleted successfully" })))
}

async fn get_notifications_by_device(
    State(state): State<Arc<ApiState>>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<Vec<Notification>>> {
    Ok(Json(state.notifications.get_by_device(&device_id).await?))
}

async fn get_notifications_by_date_range(
    State(state): State<Arc<ApiState>>,
    Path(device_id): Path<String>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    let start = parse_instant("start", query.start)?;
    let end = parse_instant("end", query.end)?;
    if start > end {
        return Err(StoreError::invalid("start must not be after end"));
    }

    Ok(Json(
        state
            .notifications
            .get_by_date_range(&device_id, start, end)
            .await?,
    ))
}

async fn search_notifications(
    State(state): State<Arc<ApiState>>,
    Path(device_id): Path<String>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    let q = query
        .q
        .filter(|q| !q.is_empty())
        .ok_or_else(|| StoreError::invalid("search query is required"))?;

    Ok(Json(state.notifications.search(&device_id, &q).await?))
}

async fn delete_all_notifications(State(state): State<Arc<ApiState>>) -> ApiResult<Json<Value>> {
    let deleted = state.notifications.delete_all().await?;
    Ok(Json(json!({
        "message": "All notifications deleted successfully",
        "deleted": deleted,
    })))
}

async fn purge_deleted_notifications(
    State(state): State<Arc<ApiState>>,
) -> ApiResult<Json<Value>> {
    let purged = state.notifications.purge_deleted().await?;
    Ok(Json(json!({ "purged": purged })))
}

// Device handlers
async fn list_devices_with_names(
    State(state): State<Arc<ApiState>>,
) -> ApiResult<Json<Vec<DeviceSummary>>> {
    Ok(Json(state.notifications.list_devices_with_names().await?))
}

async fn list_device_ids(State(state): State<Arc<ApiState>>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.notifications.list_devices().await?))
}

async fn list_device_names(State(state): State<Arc<ApiState>>) -> ApiResult<Json<Vec<Device>>> {
    Ok(Json(state.devices.list_all().await?))
}

async fn upsert_device_name(
    State(state): State<Arc<ApiState>>,
    payload: Result<Json<DeviceNameRequest>, JsonRejection>,
) -> ApiResult<Json<Device>> {
    let Json(req) = payload.map_err(|e| StoreError::invalid(e.body_text()))?;
    req.validate()?;

    Ok(Json(
        state.devices.upsert(&req.device_id, &req.custom_name).await?,
    ))
}

async fn get_device_name(
    State(state): State<Arc<ApiState>>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<DeviceSummary>> {
    let display_name = state.devices.get_display_name(&device_id).await?;
    Ok(Json(DeviceSummary {
        device_id,
        display_name,
    }))
}

async fn delete_device_name(
    State(state): State<Arc<ApiState>>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<Value>> {
    if device_id.trim().is_empty() {
        return Err(StoreError::invalid("device_id is required"));
    }
    state.devices.delete(&device_id).await?;
    Ok(Json(json!({ "message": "Device deleted successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_instant_accepts_decoded_plus_offset() {
        let ts = parse_instant("start", Some("2024-03-01T12:00:00 02:00".into())).unwrap();
        assert_eq!(ts, time::macros::datetime!(2024-03-01 10:00:00 UTC));
    }

    #[test]
    fn parse_instant_rejects_missing_and_malformed() {
        assert!(matches!(
            parse_instant("start", None),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(matches!(
            parse_instant("end", Some("yesterday".into())),
            Err(StoreError::InvalidArgument(_))
        ));
    }
}
