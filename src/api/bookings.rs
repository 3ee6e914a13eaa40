//! Booking endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::booking::{Booking, BookingDetails, CreateBooking, ProcessPayment, UpdateBooking},
};

use super::AuthenticatedUser;

/// Create a booking request
#[utoipa::path(
    post,
    path = "/bookings",
    tag = "bookings",
    security(("bearer_auth" = [])),
    request_body = CreateBooking,
    responses(
        (status = 201, description = "Booking created in pending status", body = Booking),
        (status = 400, description = "Invalid dates, equipment in maintenance or overlapping booking"),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn create_booking(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateBooking>,
) -> AppResult<(StatusCode, Json<Booking>)> {
    data.validate()?;

    let created = state.services.bookings.create(&claims, data).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// List bookings: every booking for admins, own bookings for farmers
#[utoipa::path(
    get,
    path = "/bookings",
    tag = "bookings",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Bookings, newest first", body = Vec<BookingDetails>)
    )
)]
pub async fn list_bookings(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BookingDetails>>> {
    let bookings = state.services.bookings.list_all(&claims).await?;
    Ok(Json(bookings))
}

/// List the caller's bookings
#[utoipa::path(
    get,
    path = "/bookings/user",
    tag = "bookings",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Caller's bookings, newest first", body = Vec<BookingDetails>)
    )
)]
pub async fn list_user_bookings(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BookingDetails>>> {
    let bookings = state.services.bookings.list_user(&claims).await?;
    Ok(Json(bookings))
}

/// List rentals running today (admin only)
#[utoipa::path(
    get,
    path = "/bookings/active",
    tag = "bookings",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active bookings", body = Vec<BookingDetails>),
        (status = 403, description = "Admin access required")
    )
)]
pub async fn list_active_bookings(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BookingDetails>>> {
    let bookings = state.services.bookings.list_active(&claims).await?;
    Ok(Json(bookings))
}

/// Get a booking by ID
#[utoipa::path(
    get,
    path = "/bookings/{id}",
    tag = "bookings",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Booking details", body = BookingDetails),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Booking not found")
    )
)]
pub async fn get_booking(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BookingDetails>> {
    let booking = state.services.bookings.get(&claims, id).await?;
    Ok(Json(booking))
}

/// Update a booking
#[utoipa::path(
    put,
    path = "/bookings/{id}",
    tag = "bookings",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Booking ID")
    ),
    request_body = UpdateBooking,
    responses(
        (status = 200, description = "Booking updated", body = Booking),
        (status = 400, description = "Invalid input, overlap or booking no longer editable"),
        (status = 403, description = "Not the owner, or status change by a farmer"),
        (status = 404, description = "Booking not found")
    )
)]
pub async fn update_booking(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<UpdateBooking>,
) -> AppResult<Json<Booking>> {
    data.validate()?;

    let updated = state.services.bookings.update(&claims, id, data).await?;
    Ok(Json(updated))
}

/// Cancel a booking
#[utoipa::path(
    patch,
    path = "/bookings/{id}/cancel",
    tag = "bookings",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Booking cancelled", body = Booking),
        (status = 400, description = "Booking can no longer be cancelled"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Booking not found")
    )
)]
pub async fn cancel_booking(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Booking>> {
    let cancelled = state.services.bookings.cancel(&claims, id).await?;
    Ok(Json(cancelled))
}

/// Accept a pending booking (admin only)
#[utoipa::path(
    patch,
    path = "/bookings/{id}/accept",
    tag = "bookings",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Booking moved to In Progress", body = Booking),
        (status = 400, description = "Booking is not pending"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Booking not found")
    )
)]
pub async fn accept_booking(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Booking>> {
    let accepted = state.services.bookings.accept(&claims, id).await?;
    Ok(Json(accepted))
}

/// Deny a pending booking (admin only)
#[utoipa::path(
    patch,
    path = "/bookings/{id}/deny",
    tag = "bookings",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Booking cancelled", body = Booking),
        (status = 400, description = "Booking is not pending"),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Booking not found")
    )
)]
pub async fn deny_booking(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Booking>> {
    let denied = state.services.bookings.deny(&claims, id).await?;
    Ok(Json(denied))
}

/// Capture payment for a booking
///
/// Also served at `/payments/process`.
#[utoipa::path(
    post,
    path = "/bookings/payments/process",
    tag = "bookings",
    security(("bearer_auth" = [])),
    request_body = ProcessPayment,
    responses(
        (status = 200, description = "Payment captured, booking confirmed", body = Booking),
        (status = 400, description = "Already paid or booking not payable"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Booking not found"),
        (status = 502, description = "Payment gateway refused or failed")
    )
)]
pub async fn process_payment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<ProcessPayment>,
) -> AppResult<Json<Booking>> {
    let paid = state.services.bookings.process_payment(&claims, data).await?;
    Ok(Json(paid))
}
