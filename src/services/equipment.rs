//! Equipment registry service

use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{
        equipment::{CreateEquipment, Equipment, UpdateEquipment},
        validate_money,
    },
    repository::EquipmentStore,
};

#[derive(Clone)]
pub struct EquipmentService {
    store: Arc<dyn EquipmentStore>,
}

impl EquipmentService {
    pub fn new(store: Arc<dyn EquipmentStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> AppResult<Vec<Equipment>> {
        self.store.list().await
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Equipment> {
        self.store.get_by_id(id).await
    }

    pub async fn create(&self, data: &CreateEquipment) -> AppResult<Equipment> {
        validate_money(Some(data.daily_rate), "Daily rate")?;
        let equipment = self.store.create(data).await?;
        tracing::info!(equipment_id = equipment.id, name = %equipment.name, "Equipment created");
        Ok(equipment)
    }

    pub async fn update(&self, id: i32, data: &UpdateEquipment) -> AppResult<Equipment> {
        validate_money(data.daily_rate, "Daily rate")?;
        self.store.update(id, data).await
    }

    /// Bookings of deleted equipment are kept with no equipment reference
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.store.delete(id).await?;
        tracing::info!(equipment_id = id, "Equipment deleted");
        Ok(())
    }

    pub async fn set_maintenance(&self, id: i32, in_maintenance: bool) -> AppResult<Equipment> {
        let equipment = self.store.set_maintenance(id, in_maintenance).await?;
        tracing::info!(equipment_id = id, in_maintenance, "Equipment maintenance flag changed");
        Ok(equipment)
    }

    pub async fn set_availability(&self, id: i32, available: bool) -> AppResult<Equipment> {
        self.store.set_availability(id, available).await
    }
}
