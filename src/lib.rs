//! AgroEquip Rental Server
//!
//! REST JSON API for a farm equipment rental marketplace: equipment
//! registry, date-range bookings with their lifecycle, payments and
//! booking statistics.

use std::sync::Arc;

use sqlx::{Pool, Postgres};

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    /// Pinged by the readiness check
    pub pool: Pool<Postgres>,
}
