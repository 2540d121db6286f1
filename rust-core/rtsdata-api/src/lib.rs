// SPDX-License-Identifier: PMPL-1.0-or-later
//! rtsdata API
//!
//! HTTP query server for well channels. Serves date bounds and clamped,
//! capped range queries over numeric readings and discrete label intervals.

pub mod auth;
pub mod config;

use std::collections::BTreeMap;
use std::num::IntErrorKind;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rtsdata_model::time::{format_bound, format_record_time, parse_query_time};
use rtsdata_query::{QueryEngine, QueryError, RangeRequest};
use rtsdata_registry::{IdentityRegistry, RegistryError, SharedRegistry};
use rtsdata_storage::{Bounds, MeasurementStore, StorageError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tracing::{info, instrument, warn};

pub use auth::{auth_middleware, ApiKeyRegistry, AuthConfig, AuthState};
pub use config::{ApiConfig, ConfigError};

/// API errors
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("missing parameters")]
    MissingParameters,

    #[error("invalid {name}: {value}")]
    InvalidParameter { name: &'static str, value: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingParameters | ApiError::InvalidParameter { .. } => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Registry(RegistryError::Storage(err)) => storage_status(err),
            ApiError::Registry(RegistryError::DuplicateName { .. }) => StatusCode::CONFLICT,
            ApiError::Registry(_) => StatusCode::BAD_REQUEST,
            ApiError::Query(QueryError::RangeUnavailable { .. }) => StatusCode::NOT_FOUND,
            ApiError::Query(QueryError::Storage(err)) | ApiError::Storage(err) => {
                storage_status(err)
            }
        }
    }
}

fn storage_status(err: &StorageError) -> StatusCode {
    if err.is_unavailable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "request failed");
        }
        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: status.as_u16(),
        });
        (status, body).into_response()
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

/// Errors that stop the server from starting
#[derive(Error, Debug)]
pub enum ServeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub engine: QueryEngine,
    pub registry: Arc<SharedRegistry>,
    pub start_time: std::time::Instant,
}

impl AppState {
    /// State over `store`, with a registry snapshot taken now.
    pub async fn load(store: Arc<MeasurementStore>) -> Result<Self, RegistryError> {
        let registry = IdentityRegistry::snapshot(&store).await?;
        Ok(Self::new(store, registry))
    }

    pub fn new(store: Arc<MeasurementStore>, registry: IdentityRegistry) -> Self {
        Self {
            engine: QueryEngine::new(store),
            registry: Arc::new(SharedRegistry::new(registry)),
            start_time: std::time::Instant::now(),
        }
    }
}

/// Query string shared by every channel endpoint.
///
/// Everything arrives as text so that bad values produce JSON errors.
#[derive(Debug, Default, Deserialize)]
pub struct ChannelParams {
    pub well: Option<String>,
    pub pi_tag: Option<String>,
    pub control_tag: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub limit: Option<String>,
    pub time: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_time(name: &'static str, value: Option<&str>) -> Result<Option<DateTime<Utc>>, ApiError> {
    value
        .map(|v| {
            parse_query_time(v).map_err(|_| ApiError::InvalidParameter {
                name,
                value: v.to_string(),
            })
        })
        .transpose()
}

impl ChannelParams {
    /// Well and tag names, both required.
    pub fn channel(&self) -> Result<(&str, &str), ApiError> {
        match (present(&self.well), present(&self.pi_tag)) {
            (Some(well), Some(tag)) => Ok((well, tag)),
            _ => Err(ApiError::MissingParameters),
        }
    }

    pub fn control_tag(&self) -> Option<&str> {
        present(&self.control_tag)
    }

    pub fn range_request(&self) -> Result<RangeRequest, ApiError> {
        let start = parse_time("start_time", present(&self.start_time))?;
        let end = parse_time("end_time", present(&self.end_time))?;
        let limit = present(&self.limit).map(parse_limit).transpose()?;
        Ok(RangeRequest::new(start, end, limit))
    }
}

/// Integer limit; out-of-range digits saturate and are clamped later.
fn parse_limit(value: &str) -> Result<i64, ApiError> {
    value.parse::<i64>().or_else(|err| match err.kind() {
        IntErrorKind::PosOverflow => Ok(i64::MAX),
        IntErrorKind::NegOverflow => Ok(i64::MIN),
        _ => Err(ApiError::InvalidParameter {
            name: "limit",
            value: value.to_string(),
        }),
    })
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backend: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DateLimitResponse {
    pub message: String,
    pub well: String,
    pub pi_tag: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub control_tag: Option<String>,
    pub date_min: Option<String>,
    pub date_max: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MeasurementsResponse {
    pub message: String,
    pub well: String,
    pub pi_tag: String,
    /// `(timestamp, value)` pairs, newest first
    pub measurements: Vec<(String, f64)>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ControlMeasurementsResponse {
    pub message: String,
    pub well: String,
    pub pi_tag: String,
    /// Label name to `(timestamp, 0|1)` pairs, newest first
    pub control_tags: BTreeMap<String, Vec<(String, u8)>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StateResponse {
    pub message: String,
    pub well: String,
    pub pi_tag: String,
    pub control_tag: String,
    pub time: String,
    /// `None` before the label's first row
    pub value: Option<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WellEntry {
    pub unique_id: u64,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub message: String,
    pub wells: usize,
    pub tags: usize,
    pub labels: usize,
}

fn ok() -> String {
    "ok".to_string()
}

fn bound_strings(bounds: Option<Bounds>) -> (Option<String>, Option<String>) {
    match bounds {
        Some((min, max)) => (Some(format_bound(&min)), Some(format_bound(&max))),
        None => (None, None),
    }
}

/// Build the API router, mounted under `root_path` when one is set.
pub fn build_router(state: AppState, auth: AuthState, root_path: Option<&str>) -> Router {
    let routes = Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/measurements/dt_limit", get(measurements_dt_limit_handler))
        .route("/measurements/", get(measurements_handler))
        .route(
            "/control_measurements/dt_limit",
            get(control_dt_limit_handler),
        )
        .route("/control_measurements/", get(control_measurements_handler))
        .route("/control_measurements/state", get(control_state_handler))
        .route("/wells/", get(wells_handler))
        .route("/pi_tags/", get(pi_tags_handler))
        .route("/registry/reload", post(reload_handler))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(middleware::from_fn_with_state(auth, auth_middleware)));

    match root_path.and_then(config::normalize_root_path) {
        Some(prefix) => Router::new().nest(&prefix, routes),
        None => routes,
    }
}

/// Health check handler
#[instrument(skip(state))]
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.engine.store().backend_name().to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

/// Ready once the store answers a read.
#[instrument(skip(state))]
async fn ready_handler(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.engine.store().reference_counts().await?;
    Ok(StatusCode::OK)
}

#[instrument(skip(state))]
async fn measurements_dt_limit_handler(
    State(state): State<AppState>,
    Query(params): Query<ChannelParams>,
) -> Result<Json<DateLimitResponse>, ApiError> {
    let (well_name, tag_name) = params.channel()?;
    let registry = state.registry.current().await;
    let (well, tag) = registry.resolve_channel(well_name, tag_name)?;

    let (date_min, date_max) = bound_strings(state.engine.date_bounds(well, tag).await?);
    Ok(Json(DateLimitResponse {
        message: ok(),
        well: well_name.to_string(),
        pi_tag: tag_name.to_string(),
        control_tag: None,
        date_min,
        date_max,
    }))
}

#[instrument(skip(state))]
async fn measurements_handler(
    State(state): State<AppState>,
    Query(params): Query<ChannelParams>,
) -> Result<Json<MeasurementsResponse>, ApiError> {
    let (well_name, tag_name) = params.channel()?;
    let request = params.range_request()?;
    let registry = state.registry.current().await;
    let (well, tag) = registry.resolve_channel(well_name, tag_name)?;

    let records = state.engine.query_numeric(well, tag, &request).await?;
    let measurements = records
        .iter()
        .map(|r| (format_record_time(&r.timestamp), r.value))
        .collect();
    Ok(Json(MeasurementsResponse {
        message: ok(),
        well: well_name.to_string(),
        pi_tag: tag_name.to_string(),
        measurements,
    }))
}

#[instrument(skip(state))]
async fn control_dt_limit_handler(
    State(state): State<AppState>,
    Query(params): Query<ChannelParams>,
) -> Result<Json<DateLimitResponse>, ApiError> {
    let (well_name, tag_name) = params.channel()?;
    let registry = state.registry.current().await;
    let (well, tag) = registry.resolve_channel(well_name, tag_name)?;
    let label = params
        .control_tag()
        .map(|name| registry.resolve_label(name))
        .transpose()?;

    let bounds = state.engine.interval_bounds(well, tag, label).await?;
    let (date_min, date_max) = bound_strings(bounds);
    Ok(Json(DateLimitResponse {
        message: ok(),
        well: well_name.to_string(),
        pi_tag: tag_name.to_string(),
        control_tag: params.control_tag().map(str::to_string),
        date_min,
        date_max,
    }))
}

#[instrument(skip(state))]
async fn control_measurements_handler(
    State(state): State<AppState>,
    Query(params): Query<ChannelParams>,
) -> Result<Json<ControlMeasurementsResponse>, ApiError> {
    let (well_name, tag_name) = params.channel()?;
    let request = params.range_request()?;
    let registry = state.registry.current().await;
    let (well, tag) = registry.resolve_channel(well_name, tag_name)?;
    let label = params
        .control_tag()
        .map(|name| registry.resolve_label(name))
        .transpose()?;

    let grouped = state
        .engine
        .query_intervals_by_label(well, tag, label, &request)
        .await?;
    let control_tags = grouped
        .into_iter()
        .map(|(label, records)| {
            let name = registry
                .label_name(label)
                .map_or_else(|| label.to_string(), str::to_string);
            let rows = records
                .iter()
                .map(|r| (format_record_time(&r.timestamp), r.value))
                .collect();
            (name, rows)
        })
        .collect();
    Ok(Json(ControlMeasurementsResponse {
        message: ok(),
        well: well_name.to_string(),
        pi_tag: tag_name.to_string(),
        control_tags,
    }))
}

#[instrument(skip(state))]
async fn control_state_handler(
    State(state): State<AppState>,
    Query(params): Query<ChannelParams>,
) -> Result<Json<StateResponse>, ApiError> {
    let (well_name, tag_name) = params.channel()?;
    let (Some(label_name), Some(time)) = (params.control_tag(), present(&params.time)) else {
        return Err(ApiError::MissingParameters);
    };
    let at = parse_time("time", Some(time))?.ok_or(ApiError::MissingParameters)?;
    let registry = state.registry.current().await;
    let (well, tag) = registry.resolve_channel(well_name, tag_name)?;
    let label = registry.resolve_label(label_name)?;

    let value = state.engine.state_at(well, tag, label, at).await?;
    Ok(Json(StateResponse {
        message: ok(),
        well: well_name.to_string(),
        pi_tag: tag_name.to_string(),
        control_tag: label_name.to_string(),
        time: format_bound(&at),
        value,
    }))
}

/// Well name to id and role
#[instrument(skip(state))]
async fn wells_handler(State(state): State<AppState>) -> Json<BTreeMap<String, WellEntry>> {
    let registry = state.registry.current().await;
    let wells = registry
        .wells()
        .map(|w| {
            let entry = WellEntry {
                unique_id: w.id.get(),
                kind: w.role.as_str().to_string(),
            };
            (w.name.clone(), entry)
        })
        .collect();
    Json(wells)
}

/// Well name to tag names, optionally for one well
#[instrument(skip(state))]
async fn pi_tags_handler(
    State(state): State<AppState>,
    Query(params): Query<ChannelParams>,
) -> Result<Json<BTreeMap<String, Vec<String>>>, ApiError> {
    let registry = state.registry.current().await;
    let wells = match present(&params.well) {
        Some(name) => {
            let id = registry.resolve_well(name)?;
            registry.well(id).into_iter().collect::<Vec<_>>()
        }
        None => registry.wells().collect(),
    };

    let tags = wells
        .into_iter()
        .map(|w| {
            let mut names: Vec<String> = registry.tags_of(w.id).map(|t| t.name.clone()).collect();
            names.sort();
            (w.name.clone(), names)
        })
        .collect();
    Ok(Json(tags))
}

/// Rebuild the identity snapshot from storage and swap it in.
#[instrument(skip(state))]
async fn reload_handler(State(state): State<AppState>) -> Result<Json<ReloadResponse>, ApiError> {
    let fresh = state.registry.reload(state.engine.store()).await?;
    let wells = fresh.wells().count();
    let tags: usize = fresh.wells().map(|w| fresh.tags_of(w.id).count()).sum();
    info!(wells, tags, labels = fresh.label_count(), "registry reloaded");
    Ok(Json(ReloadResponse {
        message: ok(),
        wells,
        tags,
        labels: fresh.label_count(),
    }))
}

/// Open the configured store and serve until the process stops.
pub async fn serve(config: ApiConfig) -> Result<(), ServeError> {
    let store = match &config.db_path {
        Some(path) => {
            info!(path = %path.display(), "opening store");
            MeasurementStore::open(path)?
        }
        None => {
            warn!("no RTSDATA_DB_PATH set, serving an empty in-memory store");
            MeasurementStore::in_memory()
        }
    };
    let state = AppState::load(Arc::new(store)).await?;

    let keys = ApiKeyRegistry::from_keys(&config.api_keys);
    if config.auth_enabled && keys.is_empty() {
        warn!("authentication enabled with no api keys, every query will be rejected");
    }
    let auth = AuthState::new(
        AuthConfig {
            enabled: config.auth_enabled,
            allow_public_health: config.public_health,
        },
        keys,
    );
    let app = build_router(state, auth, config.root_path.as_deref());

    let addr = config.bind_address();
    info!("Starting rtsdata API server on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
