//! AgroEquip Server - Farm Equipment Rental Marketplace
//!
//! REST API server for equipment rentals.

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agroequip_server::{
    api,
    config::AppConfig,
    repository::Repository,
    services::{sweeper, Services},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("agroequip_server={},tower_http=debug", config.logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    }

    tracing::info!("Starting AgroEquip Server v{}", env!("CARGO_PKG_VERSION"));

    // Create database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::info!("Database migrations completed");

    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    let repository = Repository::new(pool.clone());
    let services = Services::new(repository, &config)?;

    if config.bookings.sweep_interval_secs > 0 {
        sweeper::spawn(
            services.bookings.clone(),
            Duration::from_secs(config.bookings.sweep_interval_secs),
        );
        tracing::info!(
            interval_secs = config.bookings.sweep_interval_secs,
            "Background booking sweep enabled"
        );
    }

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
        pool,
    };

    let app = create_router(state);

    let addr = SocketAddr::new(server_host.parse()?, server_port);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Equipment
        .route(
            "/equipment",
            get(api::equipment::list_equipment).post(api::equipment::create_equipment),
        )
        .route("/equipment/available", get(api::equipment::list_available))
        .route(
            "/equipment/:id",
            get(api::equipment::get_equipment)
                .put(api::equipment::update_equipment)
                .delete(api::equipment::delete_equipment),
        )
        .route(
            "/equipment/:id/maintenance",
            patch(api::equipment::set_maintenance),
        )
        .route(
            "/equipment/:id/availability",
            get(api::equipment::check_availability).patch(api::equipment::set_availability),
        )
        // Bookings
        .route(
            "/bookings",
            get(api::bookings::list_bookings).post(api::bookings::create_booking),
        )
        .route("/bookings/user", get(api::bookings::list_user_bookings))
        .route("/bookings/active", get(api::bookings::list_active_bookings))
        .route("/bookings/statistics", get(api::stats::get_statistics))
        .route(
            "/bookings/payments/process",
            post(api::bookings::process_payment),
        )
        .route("/payments/process", post(api::bookings::process_payment))
        .route(
            "/bookings/:id",
            get(api::bookings::get_booking).put(api::bookings::update_booking),
        )
        .route("/bookings/:id/cancel", patch(api::bookings::cancel_booking))
        .route("/bookings/:id/accept", patch(api::bookings::accept_booking))
        .route("/bookings/:id/deny", patch(api::bookings::deny_booking))
        // Users
        .route("/users", get(api::users::list_users))
        .route("/users/profile", put(api::users::update_my_profile))
        .route(
            "/users/:id",
            get(api::users::get_user)
                .put(api::users::update_user)
                .delete(api::users::delete_user),
        )
        .route("/users/:id/promote", patch(api::users::promote_user))
        .route("/users/:id/demote", patch(api::users::demote_user))
        .with_state(state);

    // OpenAPI documentation
    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
}
