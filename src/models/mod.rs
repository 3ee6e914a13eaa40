//! Data models for AgroEquip

pub mod booking;
pub mod equipment;
pub mod user;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{AppError, AppResult};

// Re-export commonly used types
pub use booking::{Booking, BookingDetails, BookingStatus, DateRange, PaymentStatus};
pub use equipment::{Equipment, EquipmentView};
pub use user::{User, UserClaims, UserRole, UserShort};

/// Largest value a `NUMERIC(12, 2)` money column can hold
fn max_money() -> Decimal {
    Decimal::new(999_999_999_999, 2)
}

/// Check a money amount fits its column: not negative and within `NUMERIC(12, 2)`.
///
/// `field` names the amount in the error message.
pub fn validate_money(amount: Option<Decimal>, field: &str) -> AppResult<()> {
    let Some(amount) = amount else {
        return Ok(());
    };
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(AppError::Validation(format!("{} must not be negative", field)));
    }
    // Postgres rounds half away from zero when storing
    if amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero) > max_money() {
        return Err(AppError::Validation(format!(
            "{} must not exceed {}",
            field,
            max_money()
        )));
    }
    Ok(())
}
