//! Booking statistics endpoint

use axum::{extract::State, Json};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{booking::BookingStatus, equipment::Equipment},
};

use super::AuthenticatedUser;

/// Booking statistics response
#[derive(Debug, Serialize, ToSchema)]
pub struct BookingStatistics {
    /// Bookings whose equipment still exists
    pub total_bookings: i64,
    pub bookings_by_status: Vec<StatusCount>,
    /// Sum of confirmed, active and completed booking amounts
    #[schema(value_type = String)]
    pub revenue: Decimal,
    /// Bookings created per month over the trailing window, oldest first
    pub bookings_by_month: Vec<MonthCount>,
    /// Most booked equipment, most bookings first
    pub popular_equipment: Vec<PopularEquipment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusCount {
    pub status: BookingStatus,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MonthCount {
    pub year: i32,
    /// 1-12
    pub month: u32,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PopularEquipment {
    pub equipment_id: i32,
    pub count: i64,
    pub equipment: Option<Equipment>,
}

/// Get booking statistics (admin only)
#[utoipa::path(
    get,
    path = "/bookings/statistics",
    tag = "bookings",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Booking statistics", body = BookingStatistics),
        (status = 403, description = "Admin access required")
    )
)]
pub async fn get_statistics(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<BookingStatistics>> {
    claims.require_admin()?;

    let stats = state.services.stats.booking_statistics().await?;
    Ok(Json(stats))
}
