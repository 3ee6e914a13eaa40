//! Error types for AgroEquip server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::models::booking::BookingStatus;

/// Application error codes returned in every error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    Forbidden = 4,
    NoSuchData = 5,
    NoSuchEquipment = 6,
    NoSuchBooking = 7,
    BadValue = 8,
    EquipmentUnderMaintenance = 9,
    BookingConflict = 10,
    AlreadyPaid = 11,
    InvalidStateTransition = 12,
    PaymentFailed = 13,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Equipment {0} not found")]
    EquipmentNotFound(i32),

    #[error("Booking {0} not found")]
    BookingNotFound(i32),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Equipment {0} is currently under maintenance")]
    EquipmentUnderMaintenance(i32),

    #[error("Booking conflict: {0}")]
    BookingConflict(String),

    #[error("Booking {0} is already paid")]
    AlreadyPaid(i32),

    #[error("Cannot {action} a booking whose status is '{from}'")]
    InvalidStateTransition {
        from: BookingStatus,
        action: &'static str,
    },

    #[error("Payment failed: {0}")]
    Payment(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, ErrorCode) {
        match self {
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized),
            AppError::Authorization(_) => (StatusCode::FORBIDDEN, ErrorCode::Forbidden),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchData),
            AppError::EquipmentNotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchEquipment),
            AppError::BookingNotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchBooking),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue),
            AppError::EquipmentUnderMaintenance(_) => {
                (StatusCode::BAD_REQUEST, ErrorCode::EquipmentUnderMaintenance)
            }
            AppError::BookingConflict(_) => (StatusCode::BAD_REQUEST, ErrorCode::BookingConflict),
            AppError::AlreadyPaid(_) => (StatusCode::BAD_REQUEST, ErrorCode::AlreadyPaid),
            AppError::InvalidStateTransition { .. } => {
                (StatusCode::BAD_REQUEST, ErrorCode::InvalidStateTransition)
            }
            AppError::Payment(_) => (StatusCode::BAD_GATEWAY, ErrorCode::PaymentFailed),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::DbFailure),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Payment(msg) => {
                tracing::error!("Payment gateway error: {}", msg);
                self.to_string()
            }
            AppError::Authentication(msg)
            | AppError::Authorization(msg)
            | AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::BookingConflict(msg) => msg.clone(),
            _ => self.to_string(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
