//! Equipment model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Rentable equipment record (a single unit)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Equipment {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub category: String,
    /// Price per rented day
    #[schema(value_type = String)]
    pub daily_rate: Decimal,
    /// Image paths, stored by the upload service
    pub images: Vec<String>,
    pub features: Vec<String>,
    /// Free-form key/value specifications
    #[schema(value_type = Object)]
    pub specifications: serde_json::Value,
    pub is_available: bool,
    pub is_in_maintenance: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Equipment {
    /// Available and not in maintenance
    pub fn is_bookable(&self) -> bool {
        self.is_available && !self.is_in_maintenance
    }
}

/// Equipment as returned by the API, with its derived bookability flag
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EquipmentView {
    #[serde(flatten)]
    pub equipment: Equipment,
    pub can_be_booked: bool,
}

impl From<Equipment> for EquipmentView {
    fn from(equipment: Equipment) -> Self {
        let can_be_booked = equipment.is_bookable();
        Self {
            equipment,
            can_be_booked,
        }
    }
}

/// Create equipment request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateEquipment {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    #[schema(value_type = String)]
    pub daily_rate: Decimal,
    pub images: Option<Vec<String>>,
    pub features: Option<Vec<String>>,
    #[schema(value_type = Option<Object>)]
    pub specifications: Option<serde_json::Value>,
    pub is_available: Option<bool>,
}

/// Update equipment request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateEquipment {
    #[validate(length(min = 1, message = "Name must not be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    #[schema(value_type = Option<String>)]
    pub daily_rate: Option<Decimal>,
    pub images: Option<Vec<String>>,
    pub features: Option<Vec<String>>,
    #[schema(value_type = Option<Object>)]
    pub specifications: Option<serde_json::Value>,
    pub is_available: Option<bool>,
    pub is_in_maintenance: Option<bool>,
}

/// Toggle maintenance request
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetMaintenance {
    pub is_in_maintenance: bool,
}

/// Toggle availability request
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetAvailability {
    pub is_available: bool,
}
