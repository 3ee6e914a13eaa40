//! Business logic services

pub mod bookings;
pub mod equipment;
pub mod payments;
pub mod stats;
pub mod sweeper;
pub mod users;

use std::sync::Arc;

use crate::{
    config::{AppConfig, PaymentProvider},
    error::AppResult,
    repository::Repository,
};

use payments::{PaymentGateway, SimulatedGateway, StripeGateway};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub equipment: equipment::EquipmentService,
    pub bookings: bookings::BookingsService,
    pub stats: stats::StatsService,
    pub users: users::UsersService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> AppResult<Self> {
        let gateway: Arc<dyn PaymentGateway> = match config.payments.provider {
            PaymentProvider::Simulated => Arc::new(SimulatedGateway),
            PaymentProvider::Stripe => Arc::new(StripeGateway::new(&config.payments)?),
        };
        tracing::info!(provider = ?config.payments.provider, "Payment gateway configured");

        Ok(Self {
            equipment: equipment::EquipmentService::new(repository.equipment.clone()),
            bookings: bookings::BookingsService::new(
                repository.equipment.clone(),
                repository.bookings.clone(),
                gateway,
                config.payments.currency.clone(),
            ),
            stats: stats::StatsService::new(
                repository.equipment.clone(),
                repository.bookings.clone(),
                &config.bookings,
            ),
            users: users::UsersService::new(repository.users),
        })
    }
}
