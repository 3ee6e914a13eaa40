//! Repository layer for database operations

pub mod bookings;
pub mod equipment;
pub mod users;

use std::sync::Arc;

use sqlx::{Pool, Postgres};

pub use bookings::{BookingFilter, BookingStore};
pub use equipment::EquipmentStore;
pub use users::UserStore;

/// Storage handles shared by the services
#[derive(Clone)]
pub struct Repository {
    pub equipment: Arc<dyn EquipmentStore>,
    pub bookings: Arc<dyn BookingStore>,
    pub users: Arc<dyn UserStore>,
}

impl Repository {
    /// Create a repository backed by the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            equipment: Arc::new(equipment::EquipmentRepository::new(pool.clone())),
            bookings: Arc::new(bookings::BookingsRepository::new(pool.clone())),
            users: Arc::new(users::UsersRepository::new(pool)),
        }
    }
}
