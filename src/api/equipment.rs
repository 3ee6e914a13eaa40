//! Equipment registry endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        booking::{AvailabilityReport, DateRange, DateRangeQuery},
        equipment::{CreateEquipment, EquipmentView, SetAvailability, SetMaintenance, UpdateEquipment},
    },
};

use super::AuthenticatedUser;

/// List all equipment
#[utoipa::path(
    get,
    path = "/equipment",
    tag = "equipment",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All equipment", body = Vec<EquipmentView>)
    )
)]
pub async fn list_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<EquipmentView>>> {
    let equipment = state.services.equipment.list().await?;
    Ok(Json(equipment.into_iter().map(EquipmentView::from).collect()))
}

/// Get equipment by ID
#[utoipa::path(
    get,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Equipment ID")
    ),
    responses(
        (status = 200, description = "Equipment details", body = EquipmentView),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn get_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<EquipmentView>> {
    let equipment = state.services.equipment.get_by_id(id).await?;
    Ok(Json(equipment.into()))
}

/// Create equipment (admin only)
#[utoipa::path(
    post,
    path = "/equipment",
    tag = "equipment",
    security(("bearer_auth" = [])),
    request_body = CreateEquipment,
    responses(
        (status = 201, description = "Equipment created", body = EquipmentView),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Admin access required")
    )
)]
pub async fn create_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateEquipment>,
) -> AppResult<(StatusCode, Json<EquipmentView>)> {
    claims.require_admin()?;
    data.validate()?;

    let created = state.services.equipment.create(&data).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// Update equipment (admin only)
#[utoipa::path(
    put,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Equipment ID")
    ),
    request_body = UpdateEquipment,
    responses(
        (status = 200, description = "Equipment updated", body = EquipmentView),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn update_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<UpdateEquipment>,
) -> AppResult<Json<EquipmentView>> {
    claims.require_admin()?;
    data.validate()?;

    let updated = state.services.equipment.update(id, &data).await?;
    Ok(Json(updated.into()))
}

/// Delete equipment (admin only)
#[utoipa::path(
    delete,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Equipment ID")
    ),
    responses(
        (status = 204, description = "Equipment deleted"),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn delete_equipment(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;

    state.services.equipment.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Put equipment in or out of maintenance (admin only)
#[utoipa::path(
    patch,
    path = "/equipment/{id}/maintenance",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Equipment ID")
    ),
    request_body = SetMaintenance,
    responses(
        (status = 200, description = "Maintenance flag updated", body = EquipmentView),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn set_maintenance(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<SetMaintenance>,
) -> AppResult<Json<EquipmentView>> {
    claims.require_admin()?;

    let updated = state
        .services
        .equipment
        .set_maintenance(id, data.is_in_maintenance)
        .await?;
    Ok(Json(updated.into()))
}

/// Toggle manual availability (admin only)
#[utoipa::path(
    patch,
    path = "/equipment/{id}/availability",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Equipment ID")
    ),
    request_body = SetAvailability,
    responses(
        (status = 200, description = "Availability flag updated", body = EquipmentView),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn set_availability(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<SetAvailability>,
) -> AppResult<Json<EquipmentView>> {
    claims.require_admin()?;

    let updated = state
        .services
        .equipment
        .set_availability(id, data.is_available)
        .await?;
    Ok(Json(updated.into()))
}

/// Equipment free over a date range
#[utoipa::path(
    get,
    path = "/equipment/available",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(DateRangeQuery),
    responses(
        (status = 200, description = "Equipment with no overlapping booking", body = Vec<EquipmentView>),
        (status = 400, description = "Missing or invalid dates")
    )
)]
pub async fn list_available(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<DateRangeQuery>,
) -> AppResult<Json<Vec<EquipmentView>>> {
    let range = DateRange::from_parts(query.start_date, query.end_date)?;

    let equipment = state
        .services
        .bookings
        .list_available_equipment(range)
        .await?;
    Ok(Json(equipment.into_iter().map(EquipmentView::from).collect()))
}

/// Check whether one piece of equipment can be booked over a date range
#[utoipa::path(
    get,
    path = "/equipment/{id}/availability",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Equipment ID"),
        DateRangeQuery
    ),
    responses(
        (status = 200, description = "Availability and conflicting bookings", body = AvailabilityReport),
        (status = 400, description = "Invalid dates or equipment in maintenance"),
        (status = 404, description = "Equipment not found")
    )
)]
pub async fn check_availability(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Query(query): Query<DateRangeQuery>,
) -> AppResult<Json<AvailabilityReport>> {
    let range = DateRange::from_parts(query.start_date, query.end_date)?;

    let report = state.services.bookings.check_availability(id, range).await?;
    Ok(Json(report))
}
