// REST API - Axum router over the entry store and the aggregator
// Only compiled with the `server` feature

use crate::aggregator::{aggregate, total_for_kind, AggregatedPeriodPoint, DateWindow, PeriodTotals, TimeRange};
use crate::db;
use crate::entry::{EntryDraft, EntryKind, FinancialEntry, KindFilter};
use crate::parser::{parse_date, RecordError};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, put},
    Router,
};
use chrono::{Local, NaiveDate};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub default_range: TimeRange,
}

impl AppState {
    pub fn new(conn: Connection, default_range: TimeRange) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            default_range,
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::internal_message("database lock poisoned"))
    }
}

/// API Response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal_message(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(record_err) = err.downcast_ref::<RecordError>() {
            return ApiError::bad_request(record_err.to_string());
        }
        error!("request failed: {:#}", err);
        ApiError::internal_message("internal error")
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::err(self.message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

// ============================================================================
// Query parameters and responses
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub range: Option<String>,
    pub end: Option<String>,
}

impl WindowQuery {
    fn resolve(&self, default_range: TimeRange) -> Result<(TimeRange, DateWindow), ApiError> {
        let range = match &self.range {
            Some(r) => r.parse::<TimeRange>().map_err(ApiError::bad_request)?,
            None => default_range,
        };
        let end: NaiveDate = match &self.end {
            Some(e) => parse_date(e).map_err(|err| ApiError::bad_request(err.to_string()))?,
            None => Local::now().date_naive(),
        };
        Ok((range, range.window(end)))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub range: TimeRange,
    pub window: DateWindow,
    pub totals: PeriodTotals,
    pub all_time_income: f64,
    pub entry_count: i64,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/owners/:owner/entries?kind= - Listing table, newest first
async fn get_entries(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<FinancialEntry>> {
    let filter = match query.kind.as_deref() {
        Some(kind) => kind.parse::<KindFilter>().map_err(ApiError::bad_request)?,
        None => KindFilter::All,
    };

    let conn = state.conn()?;
    let entries = db::list_entries(&conn, &owner, filter)?;
    Ok(Json(ApiResponse::ok(entries)))
}

/// POST /api/owners/:owner/entries - Record a new entry
async fn post_entry(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    body: Result<Json<EntryDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<FinancialEntry>>), ApiError> {
    info!(owner = %owner, "POST entry");
    let Json(draft) = body?;
    let conn = state.conn()?;
    let entry = db::insert_entry(&conn, &owner, &draft)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(entry))))
}

/// PUT /api/owners/:owner/entries/:id - Edit an entry
async fn put_entry(
    State(state): State<AppState>,
    Path((owner, id)): Path<(String, String)>,
    body: Result<Json<EntryDraft>, JsonRejection>,
) -> ApiResult<FinancialEntry> {
    let Json(draft) = body?;
    let conn = state.conn()?;
    if !db::update_entry(&conn, &owner, &id, &draft)? {
        return Err(ApiError::not_found(format!("entry {} not found", id)));
    }
    let entry = db::get_entry(&conn, &owner, &id)?;
    Ok(Json(ApiResponse::ok(entry)))
}

/// DELETE /api/owners/:owner/entries/:id - Remove an entry
async fn remove_entry(
    State(state): State<AppState>,
    Path((owner, id)): Path<(String, String)>,
) -> ApiResult<String> {
    let conn = state.conn()?;
    if !db::delete_entry(&conn, &owner, &id)? {
        return Err(ApiError::not_found(format!("entry {} not found", id)));
    }
    Ok(Json(ApiResponse::ok(id)))
}

/// GET /api/owners/:owner/series?range=&end= - Gap-filled daily series
async fn get_series(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Query(query): Query<WindowQuery>,
) -> ApiResult<Vec<AggregatedPeriodPoint>> {
    let (_, window) = query.resolve(state.default_range)?;

    let conn = state.conn()?;
    let entries = db::entries_between(&conn, &owner, window.start, window.end)?;
    Ok(Json(ApiResponse::ok(aggregate(&entries, window.start, window.end))))
}

/// GET /api/owners/:owner/summary?range=&end= - Window totals and all-time income
async fn get_summary(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Query(query): Query<WindowQuery>,
) -> ApiResult<SummaryResponse> {
    let (range, window) = query.resolve(state.default_range)?;

    let conn = state.conn()?;
    let in_window = db::entries_between(&conn, &owner, window.start, window.end)?;
    let points = aggregate(&in_window, window.start, window.end);
    let income = db::list_entries(&conn, &owner, KindFilter::Only(EntryKind::Income))?;

    Ok(Json(ApiResponse::ok(SummaryResponse {
        range,
        window,
        totals: PeriodTotals::from_points(&points),
        all_time_income: total_for_kind(&income, EntryKind::Income),
        entry_count: db::count_entries(&conn, &owner)?,
    })))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/owners/:owner/entries", get(get_entries).post(post_entry))
        .route("/owners/:owner/entries/:id", put(put_entry).delete(remove_entry))
        .route("/owners/:owner/series", get(get_series))
        .route("/owners/:owner/summary", get(get_summary))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
