use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use crate::model::{Booking, Customer, CustomerPatch, NewCustomer, Room, Stay};
use crate::observability;
use crate::ops::{Desk, OpsError};
use crate::rate_limit::{Category, CategoryLimit, RateLimits, enforce};
use crate::store::{
    BookingFilter, BookingSortField, CustomerFilter, CustomerSortField, Page, RoomFilter,
    RoomSortField, SortOrder,
};

const MAX_PAGE_LIMIT: usize = 1000;

/// Builds the full application router. Route groups share one limiter but
/// count against different quota categories; health endpoints are exempt so
/// probes are never throttled.
pub fn router(desk: Arc<Desk>, limits: Arc<RateLimits>) -> Router {
    let search = Router::new()
        .route("/rooms", get(list_rooms))
        .route("/customers", get(list_customers))
        .route("/bookings", get(list_bookings))
        .route_layer(middleware::from_fn_with_state(
            CategoryLimit {
                limits: limits.clone(),
                category: Category::Search,
            },
            enforce,
        ));

    let read = Router::new()
        .route("/room/:id", get(get_room))
        .route("/customer/:id", get(get_customer))
        .route("/booking/:id", get(get_booking))
        .route_layer(middleware::from_fn_with_state(
            CategoryLimit {
                limits: limits.clone(),
                category: Category::Read,
            },
            enforce,
        ));

    let write = Router::new()
        .route("/customer", post(create_customer))
        .route("/customer/:id", patch(update_customer))
        .route("/booking", post(create_booking))
        .route("/booking/:id", patch(update_booking))
        .route_layer(middleware::from_fn_with_state(
            CategoryLimit {
                limits: limits.clone(),
                category: Category::Write,
            },
            enforce,
        ));

    let remove = Router::new()
        .route("/booking/:id", delete(delete_booking))
        .route_layer(middleware::from_fn_with_state(
            CategoryLimit {
                limits,
                category: Category::Delete,
            },
            enforce,
        ));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/health/", get(health))
        .route("/health/ready", get(ready))
        .merge(search)
        .merge(read)
        .merge(write)
        .merge(remove)
        .layer(middleware::from_fn(track))
        .layer(TraceLayer::new_for_http())
        .with_state(desk)
}

async fn track(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let start = Instant::now();
    let response = next.run(request).await;
    metrics::counter!(
        observability::REQUESTS_TOTAL,
        "method" => method.clone(),
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);
    metrics::histogram!(observability::REQUEST_DURATION_SECONDS, "method" => method)
        .record(start.elapsed().as_secs_f64());
    response
}

// ── Error mapping ────────────────────────────────────────────────

/// Bridges service errors to HTTP responses. The body shape is part of the
/// client contract: `error`, `message`, `details`, plus `resource_type` and
/// `resource_id` for not-found cases.
pub struct ApiError(pub OpsError);

impl From<OpsError> for ApiError {
    fn from(err: OpsError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.0.to_string();
        let (status, body) = match &self.0 {
            OpsError::NotFound { resource, id } => (
                StatusCode::NOT_FOUND,
                json!({
                    "error": "Resource Not Found",
                    "message": message,
                    "resource_type": resource.as_str(),
                    "resource_id": id,
                    "details": {},
                }),
            ),
            OpsError::InvalidDateRange {
                check_in,
                check_out,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": "Validation Error",
                    "message": message,
                    "details": {
                        "check_in": check_in.to_string(),
                        "check_out": check_out.to_string(),
                        "days": (*check_out - *check_in).num_days(),
                    },
                }),
            ),
            OpsError::StayConflict {
                room_id,
                booking_id,
                check_in,
                check_out,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": "Validation Error",
                    "message": message,
                    "details": {
                        "room_id": room_id,
                        "conflicting_booking_id": booking_id,
                        "check_in": check_in.to_string(),
                        "check_out": check_out.to_string(),
                    },
                }),
            ),
            OpsError::Validation { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": "Validation Error",
                    "message": message,
                    "details": {},
                }),
            ),
            OpsError::ForeignKeyViolation { detail } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": "Foreign Key Violation",
                    "message": message,
                    "details": { "constraint": detail },
                }),
            ),
            OpsError::Database { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "Database Error",
                    "message": "An internal database error occurred",
                    "details": {},
                }),
            ),
        };

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "request failed");
        } else {
            tracing::warn!(status = %status, error = %self.0, "request rejected");
        }
        (status, Json(body)).into_response()
    }
}

fn page(skip: usize, limit: usize) -> Result<Page, ApiError> {
    if limit < 1 || limit > MAX_PAGE_LIMIT {
        return Err(OpsError::Validation {
            detail: format!("limit must be between 1 and {MAX_PAGE_LIMIT}"),
        }
        .into());
    }
    Ok(Page { skip, limit })
}

fn require_positive(id: i64, what: &str) -> Result<(), ApiError> {
    if id <= 0 {
        return Err(OpsError::Validation {
            detail: format!("{what} must be positive"),
        }
        .into());
    }
    Ok(())
}

fn default_limit() -> usize {
    100
}

// ── Root & health ────────────────────────────────────────────────

async fn root() -> &'static str {
    "The server is watching you, without blinking."
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "innkeep",
    }))
}

/// Readiness differs from liveness: it exercises the store before answering.
async fn ready(State(desk): State<Arc<Desk>>) -> Response {
    match desk.ping().await {
        Ok(()) => Json(json!({
            "status": "ready",
            "service": "innkeep",
            "database": "connected",
        }))
        .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "detail": format!("Database not ready: {err}") })),
            )
                .into_response()
        }
    }
}

// ── Rooms ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RoomListParams {
    #[serde(default)]
    skip: usize,
    #[serde(default = "default_limit")]
    limit: usize,
    available: Option<bool>,
    min_price: Option<i64>,
    max_price: Option<i64>,
    #[serde(default)]
    sort_by: RoomSortField,
    #[serde(default)]
    order: SortOrder,
}

async fn list_rooms(
    State(desk): State<Arc<Desk>>,
    Query(params): Query<RoomListParams>,
) -> Result<Json<Vec<Room>>, ApiError> {
    let page = page(params.skip, params.limit)?;
    let filter = RoomFilter {
        available: params.available,
        min_price: params.min_price,
        max_price: params.max_price,
    };
    let rooms = desk
        .list_rooms(filter, page, params.sort_by, params.order)
        .await?;
    Ok(Json(rooms))
}

async fn get_room(
    State(desk): State<Arc<Desk>>,
    Path(id): Path<i64>,
) -> Result<Json<Room>, ApiError> {
    require_positive(id, "Room ID")?;
    Ok(Json(desk.get_room(id).await?))
}

// ── Customers ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CustomerListParams {
    #[serde(default)]
    skip: usize,
    #[serde(default = "default_limit")]
    limit: usize,
    name: Option<String>,
    email: Option<String>,
    #[serde(default)]
    sort_by: CustomerSortField,
    #[serde(default)]
    order: SortOrder,
}

async fn list_customers(
    State(desk): State<Arc<Desk>>,
    Query(params): Query<CustomerListParams>,
) -> Result<Json<Vec<Customer>>, ApiError> {
    let page = page(params.skip, params.limit)?;
    let filter = CustomerFilter {
        name: params.name,
        email: params.email,
    };
    let customers = desk
        .list_customers(filter, page, params.sort_by, params.order)
        .await?;
    Ok(Json(customers))
}

async fn get_customer(
    State(desk): State<Arc<Desk>>,
    Path(id): Path<i64>,
) -> Result<Json<Customer>, ApiError> {
    require_positive(id, "Customer ID")?;
    Ok(Json(desk.get_customer(id).await?))
}

async fn create_customer(
    State(desk): State<Arc<Desk>>,
    Json(new): Json<NewCustomer>,
) -> Result<Json<Customer>, ApiError> {
    Ok(Json(desk.create_customer(new).await?))
}

async fn update_customer(
    State(desk): State<Arc<Desk>>,
    Path(id): Path<i64>,
    Json(patch): Json<CustomerPatch>,
) -> Result<Json<Customer>, ApiError> {
    require_positive(id, "Customer ID")?;
    Ok(Json(desk.update_customer(id, patch).await?))
}

// ── Bookings ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct BookingListParams {
    #[serde(default)]
    skip: usize,
    #[serde(default = "default_limit")]
    limit: usize,
    customer_id: Option<i64>,
    room_id: Option<i64>,
    #[serde(default)]
    sort_by: BookingSortField,
    #[serde(default)]
    order: SortOrder,
}

#[derive(Debug, Deserialize)]
struct CreateBookingRequest {
    room_id: i64,
    customer_id: i64,
    check_in: NaiveDate,
    check_out: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct RescheduleRequest {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

async fn list_bookings(
    State(desk): State<Arc<Desk>>,
    Query(params): Query<BookingListParams>,
) -> Result<Json<Vec<Booking>>, ApiError> {
    let page = page(params.skip, params.limit)?;
    if let Some(id) = params.customer_id {
        require_positive(id, "Customer ID")?;
    }
    if let Some(id) = params.room_id {
        require_positive(id, "Room ID")?;
    }
    let filter = BookingFilter {
        customer_id: params.customer_id,
        room_id: params.room_id,
    };
    let bookings = desk
        .list_bookings(filter, page, params.sort_by, params.order)
        .await?;
    Ok(Json(bookings))
}

async fn get_booking(
    State(desk): State<Arc<Desk>>,
    Path(id): Path<i64>,
) -> Result<Json<Booking>, ApiError> {
    require_positive(id, "Booking ID")?;
    Ok(Json(desk.get_booking(id).await?))
}

async fn create_booking(
    State(desk): State<Arc<Desk>>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<Json<Booking>, ApiError> {
    let stay = Stay::new(req.check_in, req.check_out);
    let booking = desk
        .create_booking(req.room_id, req.customer_id, stay)
        .await?;
    Ok(Json(booking))
}

async fn update_booking(
    State(desk): State<Arc<Desk>>,
    Path(id): Path<i64>,
    Json(req): Json<RescheduleRequest>,
) -> Result<Json<Booking>, ApiError> {
    require_positive(id, "Booking ID")?;
    let stay = Stay::new(req.check_in, req.check_out);
    Ok(Json(desk.update_booking_dates(id, stay).await?))
}

async fn delete_booking(
    State(desk): State<Arc<Desk>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    require_positive(id, "Booking ID")?;
    desk.delete_booking(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
