//! Repository integration tests
//!
//! Run against a migrated database with:
//! DATABASE_URL=postgres://... cargo test --test repository_tests -- --ignored

use agroequip_server::models::BookingStatus;
use agroequip_server::repository::{bookings::BookingsRepository, BookingStore};
use chrono::NaiveDate;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

async fn pool() -> Pool<Postgres> {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

async fn seed_booking(
    pool: &Pool<Postgres>,
    farmer_id: i32,
    equipment_id: i32,
    start: NaiveDate,
    end: NaiveDate,
    status: BookingStatus,
) -> i32 {
    sqlx::query_scalar(
        r#"
        INSERT INTO bookings (farmer_id, equipment_id, start_date, end_date, total_amount, status)
        VALUES ($1, $2, $3, $4, 100, $5)
        RETURNING id
        "#,
    )
    .bind(farmer_id)
    .bind(equipment_id)
    .bind(start)
    .bind(end)
    .bind(status)
    .fetch_one(pool)
    .await
    .expect("Failed to seed booking")
}

async fn status_of(pool: &Pool<Postgres>, id: i32) -> String {
    sqlx::query_scalar("SELECT status FROM bookings WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("Failed to read booking")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_sweep_moves_rows_once() {
    let pool = pool().await;
    let stamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();

    let farmer_id: i32 = sqlx::query_scalar(
        "INSERT INTO users (name, email) VALUES ('Sweep farmer', $1) RETURNING id",
    )
    .bind(format!("sweep-{}@example.test", stamp))
    .fetch_one(&pool)
    .await
    .expect("Failed to seed user");
    let equipment_id: i32 = sqlx::query_scalar(
        r#"
        INSERT INTO equipment (name, description, category, daily_rate)
        VALUES ('Sweep baler', 'Seeded by repository tests', 'balers', 20)
        RETURNING id
        "#,
    )
    .fetch_one(&pool)
    .await
    .expect("Failed to seed equipment");

    // A day no other data reaches back to
    let today = d(1990, 6, 5);
    let starting = seed_booking(
        &pool,
        farmer_id,
        equipment_id,
        d(1990, 6, 1),
        d(1990, 6, 10),
        BookingStatus::Confirmed,
    )
    .await;
    let finished = seed_booking(
        &pool,
        farmer_id,
        equipment_id,
        d(1990, 5, 1),
        d(1990, 5, 5),
        BookingStatus::Active,
    )
    .await;
    let unpaid_past = seed_booking(
        &pool,
        farmer_id,
        equipment_id,
        d(1990, 4, 1),
        d(1990, 4, 3),
        BookingStatus::InProgress,
    )
    .await;
    let upcoming = seed_booking(
        &pool,
        farmer_id,
        equipment_id,
        d(1990, 6, 20),
        d(1990, 6, 25),
        BookingStatus::Confirmed,
    )
    .await;
    let withdrawn = seed_booking(
        &pool,
        farmer_id,
        equipment_id,
        d(1990, 3, 1),
        d(1990, 3, 2),
        BookingStatus::Cancelled,
    )
    .await;

    let repository = BookingsRepository::new(pool.clone());

    let first = repository
        .promote_by_date(today)
        .await
        .expect("First sweep failed");
    assert_eq!(first.activated, 1);
    assert_eq!(first.completed, 2);

    assert_eq!(status_of(&pool, starting).await, "active");
    assert_eq!(status_of(&pool, finished).await, "completed");
    assert_eq!(status_of(&pool, unpaid_past).await, "completed");
    assert_eq!(status_of(&pool, upcoming).await, "confirmed");
    assert_eq!(status_of(&pool, withdrawn).await, "cancelled");

    let second = repository
        .promote_by_date(today)
        .await
        .expect("Second sweep failed");
    assert_eq!(second.activated, 0);
    assert_eq!(second.completed, 0);

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(farmer_id)
        .execute(&pool)
        .await
        .expect("Failed to clean up");
    sqlx::query("DELETE FROM equipment WHERE id = $1")
        .bind(equipment_id)
        .execute(&pool)
        .await
        .expect("Failed to clean up");
}
