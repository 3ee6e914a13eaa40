//! Booking model, status machine and date-range rules

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::equipment::Equipment;
use super::user::UserShort;
use crate::error::{AppError, AppResult};

// ---------------------------------------------------------------------------
// BookingStatus
// ---------------------------------------------------------------------------

/// Booking lifecycle status.
///
/// Wire and storage spellings are identical, `"In Progress"` included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum BookingStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "confirmed")]
    Confirmed,
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "cancelled")]
    Cancelled,
}

/// Something that happens to a booking and may move it to another status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingEvent {
    /// Admin accepts a pending request
    Accept,
    /// Admin refuses a pending request
    Deny,
    /// Farmer or admin withdraws the booking
    Cancel,
    /// Payment was captured by the gateway
    CapturePayment,
    /// The rental window has started
    StartRental,
    /// The rental window is over
    EndRental,
    /// Admin sets the status directly
    Override(BookingStatus),
}

impl BookingEvent {
    /// Verb used in error messages
    pub fn action(&self) -> &'static str {
        match self {
            BookingEvent::Accept => "accept",
            BookingEvent::Deny => "deny",
            BookingEvent::Cancel => "cancel",
            BookingEvent::CapturePayment => "pay for",
            BookingEvent::StartRental => "start",
            BookingEvent::EndRental => "complete",
            BookingEvent::Override(_) => "update",
        }
    }
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::Pending,
        BookingStatus::InProgress,
        BookingStatus::Confirmed,
        BookingStatus::Active,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::InProgress => "In Progress",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Active => "active",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Transition table. Anything not listed is rejected.
    pub fn apply(self, event: BookingEvent) -> AppResult<BookingStatus> {
        use BookingEvent as E;
        use BookingStatus as S;

        let next = match (self, event) {
            (S::Pending, E::Accept) => S::InProgress,
            (S::Pending, E::Deny) => S::Cancelled,
            (S::Pending | S::InProgress | S::Confirmed | S::Active, E::Cancel) => S::Cancelled,
            (S::Pending | S::InProgress | S::Confirmed, E::CapturePayment) => S::Confirmed,
            // an admin may have started the rental before it was paid
            (S::Active, E::CapturePayment) => S::Active,
            (S::Confirmed, E::StartRental) => S::Active,
            (S::Pending | S::InProgress | S::Confirmed | S::Active, E::EndRental) => S::Completed,
            (_, E::Override(target)) => target,
            (from, event) => {
                return Err(AppError::InvalidStateTransition {
                    from,
                    action: event.action(),
                })
            }
        };
        Ok(next)
    }

    /// Statuses from which `event` is accepted by the transition table
    pub fn accepting(event: BookingEvent) -> Vec<BookingStatus> {
        BookingStatus::ALL
            .into_iter()
            .filter(|status| status.apply(event).is_ok())
            .collect()
    }

    /// Statuses whose amount is counted as revenue
    pub fn counts_as_revenue(&self) -> bool {
        matches!(
            self,
            BookingStatus::Confirmed | BookingStatus::Active | BookingStatus::Completed
        )
    }

    /// A farmer may still edit their own booking in these statuses
    pub fn is_farmer_editable(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::InProgress)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Invalid booking status: {}", s))
    }
}

impl sqlx::Type<Postgres> for BookingStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for BookingStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: &str = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for BookingStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

// ---------------------------------------------------------------------------
// PaymentStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "refunded" => Ok(PaymentStatus::Refunded),
            _ => Err(format!("Invalid payment status: {}", s)),
        }
    }
}

impl sqlx::Type<Postgres> for PaymentStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for PaymentStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: &str = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for PaymentStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

// ---------------------------------------------------------------------------
// DateRange
// ---------------------------------------------------------------------------

/// Calendar date range with inclusive bounds and `end > start`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> AppResult<Self> {
        if end <= start {
            return Err(AppError::Validation(format!(
                "End date ({}) must be after start date ({})",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    /// Build a range from optional inputs, as received from query strings
    pub fn from_parts(start: Option<NaiveDate>, end: Option<NaiveDate>) -> AppResult<Self> {
        match (start, end) {
            (Some(start), Some(end)) => Self::new(start, end),
            _ => Err(AppError::Validation(
                "Start date and end date are required".to_string(),
            )),
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of billed days. Dates carry no time of day, so there is never a
    /// partial day to round up.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    /// Inclusive on both ends: sharing a single boundary day is an overlap.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    /// `days * daily_rate`
    pub fn rental_cost(&self, daily_rate: Decimal) -> Decimal {
        Decimal::from(self.days()) * daily_rate
    }
}

// ---------------------------------------------------------------------------
// Booking
// ---------------------------------------------------------------------------

/// Booking row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Booking {
    pub id: i32,
    pub farmer_id: i32,
    /// Null once the equipment has been deleted
    pub equipment_id: Option<i32>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[schema(value_type = String)]
    pub total_amount: Decimal,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_id: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    /// Opaque path to the uploaded proof document
    pub proof_image: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Stored rows always satisfy `end_date > start_date` (table constraint)
    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            end: self.end_date,
        }
    }

    pub fn is_owned_by(&self, user_id: i32) -> bool {
        self.farmer_id == user_id
    }
}

/// Booking with its equipment and farmer resolved
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookingDetails {
    #[serde(flatten)]
    pub booking: Booking,
    pub equipment: Option<Equipment>,
    pub farmer: Option<UserShort>,
}

/// Create booking request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBooking {
    pub equipment_id: i32,
    /// Start date (YYYY-MM-DD)
    pub start_date: NaiveDate,
    /// End date (YYYY-MM-DD), strictly after the start date
    pub end_date: NaiveDate,
    /// Computed from the equipment daily rate when omitted
    #[schema(value_type = Option<String>)]
    pub total_amount: Option<Decimal>,
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
    pub proof_image: Option<String>,
}

/// Update booking request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBooking {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[schema(value_type = Option<String>)]
    pub total_amount: Option<Decimal>,
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
    pub proof_image: Option<String>,
    /// Admin only
    pub status: Option<BookingStatus>,
}

/// Payment capture request
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProcessPayment {
    pub booking_id: i32,
    /// Gateway payment method reference, ignored by the simulated gateway
    pub payment_method_id: Option<String>,
}

/// Date range query parameters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct DateRangeQuery {
    /// Start date (YYYY-MM-DD)
    #[serde(alias = "startDate")]
    pub start_date: Option<NaiveDate>,
    /// End date (YYYY-MM-DD)
    #[serde(alias = "endDate")]
    pub end_date: Option<NaiveDate>,
}

/// Validated booking ready to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub farmer_id: i32,
    pub equipment_id: i32,
    pub range: DateRange,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub proof_image: Option<String>,
}

/// Full set of editable values written by an update
#[derive(Debug, Clone, PartialEq)]
pub struct BookingChanges {
    pub range: DateRange,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub proof_image: Option<String>,
    pub status: BookingStatus,
}

/// Result of an availability check
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AvailabilityReport {
    pub available: bool,
    pub conflicting_bookings: Vec<Booking>,
}

/// Rows touched by one promotion sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SweepOutcome {
    pub activated: u64,
    pub completed: u64,
}

/// Minimal projection used by the statistics aggregator
#[derive(Debug, Clone, FromRow)]
pub struct BookingStatRow {
    pub equipment_id: Option<i32>,
    pub status: BookingStatus,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}
