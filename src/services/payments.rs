//! Payment capture gateways

use async_trait::async_trait;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::Deserialize;

use crate::{
    config::PaymentsConfig,
    error::{AppError, AppResult},
};

/// What the lifecycle engine asks a gateway to capture
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    pub booking_id: i32,
    pub amount: Decimal,
    pub currency: String,
    pub payment_method_id: Option<String>,
}

/// Proof of a successful capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub payment_id: String,
}

/// Opaque payment capture capability.
///
/// An `Ok` receipt means the money was captured; anything else must leave
/// the booking untouched.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn capture(&self, request: &CaptureRequest) -> AppResult<PaymentReceipt>;
}

/// Gateway that accepts every capture, used in development and demos
#[derive(Debug, Clone, Default)]
pub struct SimulatedGateway;

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn capture(&self, request: &CaptureRequest) -> AppResult<PaymentReceipt> {
        let payment_id = format!("sim_pay_{}", chrono::Utc::now().timestamp_millis());
        tracing::debug!(
            booking_id = request.booking_id,
            amount = %request.amount,
            payment_id = %payment_id,
            "Simulated payment captured"
        );
        Ok(PaymentReceipt { payment_id })
    }
}

/// Stripe payment intents, created and confirmed in one call
#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    api_url: String,
    secret_key: String,
}

#[derive(Deserialize)]
struct PaymentIntent {
    id: String,
    status: String,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeError,
}

#[derive(Deserialize)]
struct StripeError {
    message: Option<String>,
}

/// Amount in the currency's minor unit
fn minor_units(amount: Decimal) -> AppResult<i64> {
    (amount * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| AppError::Payment(format!("Amount {} cannot be charged", amount)))
}

impl StripeGateway {
    pub fn new(config: &PaymentsConfig) -> AppResult<Self> {
        let secret_key = config
            .stripe_secret_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                AppError::Internal("payments.stripe_secret_key is required for Stripe".to_string())
            })?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_url: config.stripe_api_url.trim_end_matches('/').to_string(),
            secret_key,
        })
    }
}

/// Same booking, amount and method give the same key, so a retried capture
/// is not charged twice
fn idempotency_key(request: &CaptureRequest, amount: i64) -> String {
    let name = format!(
        "booking:{}:{}:{}:{}",
        request.booking_id,
        amount,
        request.currency.to_lowercase(),
        request.payment_method_id.as_deref().unwrap_or("")
    );
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn capture(&self, request: &CaptureRequest) -> AppResult<PaymentReceipt> {
        let amount = minor_units(request.amount)?;
        let booking_id = request.booking_id.to_string();

        let mut params = vec![
            ("amount", amount.to_string()),
            ("currency", request.currency.to_lowercase()),
            ("confirm", "true".to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
            ("automatic_payment_methods[allow_redirects]", "never".to_string()),
            ("metadata[booking_id]", booking_id),
        ];
        if let Some(ref method) = request.payment_method_id {
            params.push(("payment_method", method.clone()));
        }

        let response = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_url))
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", idempotency_key(request, amount))
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Payment(format!("Payment gateway unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| format!("gateway returned {}", status));
            return Err(AppError::Payment(message));
        }

        let intent: PaymentIntent = response
            .json()
            .await
            .map_err(|e| AppError::Payment(format!("Invalid gateway response: {}", e)))?;

        if intent.status != "succeeded" {
            return Err(AppError::Payment(format!(
                "Payment {} not completed (status: {})",
                intent.id, intent.status
            )));
        }

        Ok(PaymentReceipt {
            payment_id: intent.id,
        })
    }
}
