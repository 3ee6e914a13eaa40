//! API integration tests
//!
//! Run against a live server with a seeded database (an admin and a farmer
//! user) with: cargo test -- --ignored

use agroequip_server::models::{UserClaims, UserRole};
use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:3000/api/v1";

fn secret() -> String {
    std::env::var("JWT_SECRET").unwrap_or_else(|_| "change-this-secret-in-production".to_string())
}

fn user_id(var: &str, default: i32) -> i32 {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Tokens are issued by the auth service; mint them with the shared secret
fn token(user_id: i32, role: UserRole) -> String {
    UserClaims::new(user_id, role, 1)
        .create_token(&secret())
        .expect("Failed to create token")
}

fn admin_token() -> String {
    token(user_id("TEST_ADMIN_ID", 1), UserRole::Admin)
}

fn farmer_token() -> String {
    token(user_id("TEST_FARMER_ID", 2), UserRole::Farmer)
}

async fn create_equipment(client: &Client, rate: &str) -> i64 {
    let response = client
        .post(format!("{}/equipment", BASE_URL))
        .bearer_auth(admin_token())
        .json(&json!({
            "name": "Integration tractor",
            "description": "Created by integration tests",
            "category": "tractors",
            "daily_rate": rate
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.expect("Failed to parse response");
    body["id"].as_i64().expect("No equipment id")
}

async fn book(client: &Client, equipment_id: i64, start: &str, end: &str) -> reqwest::Response {
    client
        .post(format!("{}/bookings", BASE_URL))
        .bearer_auth(farmer_token())
        .json(&json!({
            "equipment_id": equipment_id,
            "start_date": start,
            "end_date": end
        }))
        .send()
        .await
        .expect("Failed to send request")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_ready_pings_database() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
}

#[tokio::test]
#[ignore]
async fn test_responses_are_gzip_compressed() {
    let client = Client::new();

    let response = client
        .get("http://localhost:3000/api-docs/openapi.json")
        .header("Accept-Encoding", "gzip")
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get("content-encoding")
            .and_then(|v| v.to_str().ok()),
        Some("gzip")
    );
}

#[tokio::test]
#[ignore]
async fn test_missing_token_is_rejected() {
    let client = Client::new();

    let response = client
        .get(format!("{}/bookings", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_booking_total_and_boundary_conflict() {
    let client = Client::new();
    let equipment_id = create_equipment(&client, "100.00").await;

    let response = book(&client, equipment_id, "2030-01-01", "2030-01-04").await;
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["total_amount"], "300.00");

    // Shares the 2030-01-04 boundary day
    let response = book(&client, equipment_id, "2030-01-04", "2030-01-06").await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "BookingConflict");

    let response = client
        .get(format!(
            "{}/equipment/{}/availability?start_date=2030-01-05&end_date=2030-01-07",
            BASE_URL, equipment_id
        ))
        .bearer_auth(farmer_token())
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["available"], true);
}

#[tokio::test]
#[ignore]
async fn test_maintenance_blocks_booking() {
    let client = Client::new();
    let equipment_id = create_equipment(&client, "50").await;

    let response = client
        .patch(format!("{}/equipment/{}/maintenance", BASE_URL, equipment_id))
        .bearer_auth(admin_token())
        .json(&json!({ "is_in_maintenance": true }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let response = book(&client, equipment_id, "2030-03-01", "2030-03-02").await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "EquipmentUnderMaintenance");
}

#[tokio::test]
#[ignore]
async fn test_accept_pay_and_deny_flow() {
    let client = Client::new();
    let equipment_id = create_equipment(&client, "80").await;

    let response = book(&client, equipment_id, "2030-05-01", "2030-05-03").await;
    let booking: Value = response.json().await.expect("Failed to parse response");
    let booking_id = booking["id"].as_i64().expect("No booking id");

    // Farmers cannot accept
    let response = client
        .patch(format!("{}/bookings/{}/accept", BASE_URL, booking_id))
        .bearer_auth(farmer_token())
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 403);

    let response = client
        .patch(format!("{}/bookings/{}/accept", BASE_URL, booking_id))
        .bearer_auth(admin_token())
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "In Progress");

    let response = client
        .post(format!("{}/payments/process", BASE_URL))
        .bearer_auth(farmer_token())
        .json(&json!({ "booking_id": booking_id }))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "confirmed");
    assert_eq!(body["payment_status"], "paid");

    let response = client
        .post(format!("{}/bookings/payments/process", BASE_URL))
        .bearer_auth(farmer_token())
        .json(&json!({ "booking_id": booking_id }))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "AlreadyPaid");

    // Only pending bookings can be denied
    let response = client
        .patch(format!("{}/bookings/{}/deny", BASE_URL, booking_id))
        .bearer_auth(admin_token())
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "InvalidStateTransition");
}

#[tokio::test]
#[ignore]
async fn test_statistics_are_admin_only() {
    let client = Client::new();

    let response = client
        .get(format!("{}/bookings/statistics", BASE_URL))
        .bearer_auth(farmer_token())
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 403);

    let response = client
        .get(format!("{}/bookings/statistics", BASE_URL))
        .bearer_auth(admin_token())
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["total_bookings"].is_number());
    assert!(body["popular_equipment"].is_array());
}
