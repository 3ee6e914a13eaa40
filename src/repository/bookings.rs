//! Bookings repository for database operations

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{postgres::PgRow, FromRow, Pool, Postgres, Row};

use crate::{
    error::{AppError, AppResult},
    models::{
        booking::{
            Booking, BookingChanges, BookingDetails, BookingEvent, BookingStatRow, BookingStatus,
            DateRange, NewBooking, SweepOutcome,
        },
        equipment::Equipment,
        user::UserShort,
    },
};

/// Which bookings a listing returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingFilter {
    All,
    /// Every booking of one farmer
    Farmer(i32),
    /// Bookings of one farmer whose equipment still exists
    FarmerWithEquipment(i32),
    /// Active bookings whose window contains the given day
    ActiveOn(NaiveDate),
}

/// Booking storage.
///
/// Writes that depend on the current status take the status the caller
/// validated against and return `None` when the row no longer has it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<Booking>;

    async fn get_details(&self, id: i32) -> AppResult<BookingDetails>;

    async fn list_details(&self, filter: BookingFilter) -> AppResult<Vec<BookingDetails>>;

    /// Non-cancelled bookings on `equipment_id` overlapping `range`
    async fn find_overlapping(
        &self,
        equipment_id: i32,
        range: DateRange,
        exclude_id: Option<i32>,
    ) -> AppResult<Vec<Booking>>;

    /// Equipment ids with at least one non-cancelled booking overlapping `range`
    async fn booked_equipment_ids(&self, range: DateRange) -> AppResult<Vec<i32>>;

    /// Insert a pending booking, re-checking overlap in the same transaction
    async fn create(&self, booking: &NewBooking) -> AppResult<Booking>;

    async fn transition(
        &self,
        id: i32,
        from: BookingStatus,
        to: BookingStatus,
    ) -> AppResult<Option<Booking>>;

    async fn update(
        &self,
        id: i32,
        from: BookingStatus,
        changes: &BookingChanges,
    ) -> AppResult<Option<Booking>>;

    async fn record_payment(
        &self,
        id: i32,
        from: BookingStatus,
        to: BookingStatus,
        payment_id: &str,
    ) -> AppResult<Option<Booking>>;

    /// Time-driven promotion sweep
    async fn promote_by_date(&self, today: NaiveDate) -> AppResult<SweepOutcome>;

    /// Rows feeding the statistics, bookings without equipment excluded
    async fn stat_rows(&self) -> AppResult<Vec<BookingStatRow>>;
}

const DETAILS_SELECT: &str = r#"
    SELECT b.*,
           e.id AS e_id, e.name AS e_name, e.description AS e_description,
           e.category AS e_category, e.daily_rate AS e_daily_rate,
           e.images AS e_images, e.features AS e_features,
           e.specifications AS e_specifications, e.is_available AS e_is_available,
           e.is_in_maintenance AS e_is_in_maintenance,
           e.created_at AS e_created_at, e.updated_at AS e_updated_at,
           u.name AS u_name, u.email AS u_email, u.phone AS u_phone
    FROM bookings b
    LEFT JOIN equipment e ON e.id = b.equipment_id
    LEFT JOIN users u ON u.id = b.farmer_id
"#;

/// Stored spellings of the statuses the transition table lets `event` move
fn sweep_sources(event: BookingEvent) -> Vec<&'static str> {
    BookingStatus::accepting(event)
        .into_iter()
        .map(|status| status.as_str())
        .collect()
}

/// Turn constraint and serialization failures on booking writes into conflicts
fn map_write_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            // exclusion_violation on bookings_no_overlap
            Some("23P01") => {
                return AppError::BookingConflict(
                    "Equipment is already booked for these dates".to_string(),
                )
            }
            // serialization_failure
            Some("40001") => {
                return AppError::BookingConflict(
                    "Another booking for this equipment was made concurrently".to_string(),
                )
            }
            // foreign_key_violation
            Some("23503") => {
                return AppError::Validation("Referenced equipment or user does not exist".to_string())
            }
            // numeric_value_out_of_range
            Some("22003") => return AppError::Validation("Amount is out of range".to_string()),
            _ => {}
        }
    }
    AppError::Database(err)
}

fn details_from_row(row: &PgRow) -> Result<BookingDetails, sqlx::Error> {
    let booking = Booking::from_row(row)?;

    let equipment = match row.try_get::<Option<i32>, _>("e_id")? {
        Some(id) => Some(Equipment {
            id,
            name: row.try_get("e_name")?,
            description: row.try_get("e_description")?,
            category: row.try_get("e_category")?,
            daily_rate: row.try_get("e_daily_rate")?,
            images: row.try_get("e_images")?,
            features: row.try_get("e_features")?,
            specifications: row.try_get("e_specifications")?,
            is_available: row.try_get("e_is_available")?,
            is_in_maintenance: row.try_get("e_is_in_maintenance")?,
            created_at: row.try_get("e_created_at")?,
            updated_at: row.try_get("e_updated_at")?,
        }),
        None => None,
    };

    let farmer = match row.try_get::<Option<String>, _>("u_name")? {
        Some(name) => Some(UserShort {
            id: booking.farmer_id,
            name,
            email: row.try_get("u_email")?,
            phone: row.try_get("u_phone")?,
        }),
        None => None,
    };

    Ok(BookingDetails {
        booking,
        equipment,
        farmer,
    })
}

#[derive(Clone)]
pub struct BookingsRepository {
    pool: Pool<Postgres>,
}

impl BookingsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for BookingsRepository {
    async fn get_by_id(&self, id: i32) -> AppResult<Booking> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::BookingNotFound(id))
    }

    async fn get_details(&self, id: i32) -> AppResult<BookingDetails> {
        let query = format!("{} WHERE b.id = $1", DETAILS_SELECT);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::BookingNotFound(id))?;

        Ok(details_from_row(&row)?)
    }

    async fn list_details(&self, filter: BookingFilter) -> AppResult<Vec<BookingDetails>> {
        let (condition, param) = match filter {
            BookingFilter::All => ("TRUE", None),
            BookingFilter::Farmer(farmer_id) => ("b.farmer_id = $1", Some(farmer_id)),
            BookingFilter::FarmerWithEquipment(farmer_id) => (
                "b.farmer_id = $1 AND b.equipment_id IS NOT NULL",
                Some(farmer_id),
            ),
            BookingFilter::ActiveOn(_) => (
                "b.status = 'active' AND b.start_date <= $1 AND b.end_date >= $1 \
                 AND b.equipment_id IS NOT NULL",
                None,
            ),
        };

        let query = format!(
            "{} WHERE {} ORDER BY b.created_at DESC, b.id DESC",
            DETAILS_SELECT, condition
        );

        let mut builder = sqlx::query(&query);
        if let Some(farmer_id) = param {
            builder = builder.bind(farmer_id);
        }
        if let BookingFilter::ActiveOn(day) = filter {
            builder = builder.bind(day);
        }

        let rows = builder.fetch_all(&self.pool).await?;
        let details = rows
            .iter()
            .map(details_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(details)
    }

    async fn find_overlapping(
        &self,
        equipment_id: i32,
        range: DateRange,
        exclude_id: Option<i32>,
    ) -> AppResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE equipment_id = $1
              AND status <> 'cancelled'
              AND start_date <= $3
              AND end_date >= $2
              AND ($4::int IS NULL OR id <> $4)
            ORDER BY start_date
            "#,
        )
        .bind(equipment_id)
        .bind(range.start())
        .bind(range.end())
        .bind(exclude_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn booked_equipment_ids(&self, range: DateRange) -> AppResult<Vec<i32>> {
        let ids = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT DISTINCT equipment_id FROM bookings
            WHERE equipment_id IS NOT NULL
              AND status <> 'cancelled'
              AND start_date <= $2
              AND end_date >= $1
            "#,
        )
        .bind(range.start())
        .bind(range.end())
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn create(&self, booking: &NewBooking) -> AppResult<Booking> {
        // Dropping the transaction before commit rolls it back
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        let conflicts: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM bookings
            WHERE equipment_id = $1
              AND status <> 'cancelled'
              AND start_date <= $3
              AND end_date >= $2
            "#,
        )
        .bind(booking.equipment_id)
        .bind(booking.range.start())
        .bind(booking.range.end())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

        if conflicts > 0 {
            return Err(AppError::BookingConflict(
                "Equipment is already booked for these dates".to_string(),
            ));
        }

        let created = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (
                farmer_id, equipment_id, start_date, end_date,
                total_amount, status, payment_status, notes, proof_image
            )
            VALUES ($1, $2, $3, $4, $5, 'pending', 'pending', $6, $7)
            RETURNING *
            "#,
        )
        .bind(booking.farmer_id)
        .bind(booking.equipment_id)
        .bind(booking.range.start())
        .bind(booking.range.end())
        .bind(booking.total_amount)
        .bind(&booking.notes)
        .bind(&booking.proof_image)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

        tx.commit().await.map_err(map_write_error)?;
        Ok(created)
    }

    async fn transition(
        &self,
        id: i32,
        from: BookingStatus,
        to: BookingStatus,
    ) -> AppResult<Option<Booking>> {
        sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)
    }

    async fn update(
        &self,
        id: i32,
        from: BookingStatus,
        changes: &BookingChanges,
    ) -> AppResult<Option<Booking>> {
        sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings SET
                start_date = $3,
                end_date = $4,
                total_amount = $5,
                notes = $6,
                proof_image = $7,
                status = $8,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(changes.range.start())
        .bind(changes.range.end())
        .bind(changes.total_amount)
        .bind(&changes.notes)
        .bind(&changes.proof_image)
        .bind(changes.status)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)
    }

    async fn record_payment(
        &self,
        id: i32,
        from: BookingStatus,
        to: BookingStatus,
        payment_id: &str,
    ) -> AppResult<Option<Booking>> {
        sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings SET
                status = $3,
                payment_status = 'paid',
                payment_id = $4,
                payment_date = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = $2 AND payment_status <> 'paid'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)
    }

    async fn promote_by_date(&self, today: NaiveDate) -> AppResult<SweepOutcome> {
        let mut tx = self.pool.begin().await?;

        let activated = sqlx::query(
            r#"
            UPDATE bookings SET status = $2, updated_at = NOW()
            WHERE status = ANY($3) AND start_date <= $1 AND end_date >= $1
            "#,
        )
        .bind(today)
        .bind(BookingStatus::Active)
        .bind(sweep_sources(BookingEvent::StartRental))
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let completed = sqlx::query(
            r#"
            UPDATE bookings SET status = $2, updated_at = NOW()
            WHERE status = ANY($3) AND end_date < $1
            "#,
        )
        .bind(today)
        .bind(BookingStatus::Completed)
        .bind(sweep_sources(BookingEvent::EndRental))
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        Ok(SweepOutcome {
            activated,
            completed,
        })
    }

    async fn stat_rows(&self) -> AppResult<Vec<BookingStatRow>> {
        let rows = sqlx::query_as::<_, BookingStatRow>(
            r#"
            SELECT equipment_id, status, total_amount, created_at
            FROM bookings
            WHERE equipment_id IS NOT NULL
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
