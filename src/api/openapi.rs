//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{bookings, equipment, health, stats, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "AgroEquip API",
        version = "1.0.0",
        description = "Farm equipment rental marketplace REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Equipment
        equipment::list_equipment,
        equipment::get_equipment,
        equipment::create_equipment,
        equipment::update_equipment,
        equipment::delete_equipment,
        equipment::set_maintenance,
        equipment::set_availability,
        equipment::list_available,
        equipment::check_availability,
        // Bookings
        bookings::create_booking,
        bookings::list_bookings,
        bookings::list_user_bookings,
        bookings::list_active_bookings,
        bookings::get_booking,
        bookings::update_booking,
        bookings::cancel_booking,
        bookings::accept_booking,
        bookings::deny_booking,
        bookings::process_payment,
        stats::get_statistics,
        // Users
        users::list_users,
        users::get_user,
        users::update_user,
        users::delete_user,
        users::update_my_profile,
        users::promote_user,
        users::demote_user,
    ),
    components(
        schemas(
            crate::models::equipment::Equipment,
            crate::models::equipment::EquipmentView,
            crate::models::equipment::CreateEquipment,
            crate::models::equipment::UpdateEquipment,
            crate::models::equipment::SetMaintenance,
            crate::models::equipment::SetAvailability,
            crate::models::booking::Booking,
            crate::models::booking::BookingDetails,
            crate::models::booking::BookingStatus,
            crate::models::booking::PaymentStatus,
            crate::models::booking::CreateBooking,
            crate::models::booking::UpdateBooking,
            crate::models::booking::ProcessPayment,
            crate::models::booking::AvailabilityReport,
            crate::models::user::User,
            crate::models::user::UserShort,
            crate::models::user::UserRole,
            crate::models::user::UpdateUser,
            crate::models::user::UpdateProfile,
            stats::BookingStatistics,
            stats::StatusCount,
            stats::MonthCount,
            stats::PopularEquipment,
            health::HealthResponse,
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "equipment", description = "Equipment registry and availability"),
        (name = "bookings", description = "Booking lifecycle, payments and statistics"),
        (name = "users", description = "User management")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}

pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
