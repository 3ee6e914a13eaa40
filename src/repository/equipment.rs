//! Equipment repository for database operations

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::equipment::{CreateEquipment, Equipment, UpdateEquipment},
};

/// Equipment registry storage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EquipmentStore: Send + Sync {
    async fn list(&self) -> AppResult<Vec<Equipment>>;

    /// Equipment not flagged as in maintenance
    async fn list_not_in_maintenance(&self) -> AppResult<Vec<Equipment>>;

    async fn get_by_id(&self, id: i32) -> AppResult<Equipment>;

    /// Resolve several ids at once; unknown ids are skipped
    async fn get_many(&self, ids: Vec<i32>) -> AppResult<Vec<Equipment>>;

    async fn create(&self, data: &CreateEquipment) -> AppResult<Equipment>;

    async fn update(&self, id: i32, data: &UpdateEquipment) -> AppResult<Equipment>;

    async fn set_maintenance(&self, id: i32, in_maintenance: bool) -> AppResult<Equipment>;

    async fn set_availability(&self, id: i32, available: bool) -> AppResult<Equipment>;

    async fn delete(&self, id: i32) -> AppResult<()>;
}

#[derive(Clone)]
pub struct EquipmentRepository {
    pool: Pool<Postgres>,
}

impl EquipmentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EquipmentStore for EquipmentRepository {
    async fn list(&self) -> AppResult<Vec<Equipment>> {
        let rows = sqlx::query_as::<_, Equipment>("SELECT * FROM equipment ORDER BY name, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn list_not_in_maintenance(&self) -> AppResult<Vec<Equipment>> {
        let rows = sqlx::query_as::<_, Equipment>(
            "SELECT * FROM equipment WHERE is_in_maintenance = FALSE ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Equipment> {
        sqlx::query_as::<_, Equipment>("SELECT * FROM equipment WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::EquipmentNotFound(id))
    }

    async fn get_many(&self, ids: Vec<i32>) -> AppResult<Vec<Equipment>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, Equipment>("SELECT * FROM equipment WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn create(&self, data: &CreateEquipment) -> AppResult<Equipment> {
        let row = sqlx::query_as::<_, Equipment>(
            r#"
            INSERT INTO equipment (
                name, description, category, daily_rate,
                images, features, specifications, is_available
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&data.name)
        .bind(&data.description)
        .bind(&data.category)
        .bind(data.daily_rate)
        .bind(data.images.clone().unwrap_or_default())
        .bind(data.features.clone().unwrap_or_default())
        .bind(
            data.specifications
                .clone()
                .unwrap_or_else(|| serde_json::json!({})),
        )
        .bind(data.is_available.unwrap_or(true))
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update(&self, id: i32, data: &UpdateEquipment) -> AppResult<Equipment> {
        let mut sets = vec!["updated_at = NOW()".to_string()];
        let mut idx = 2;

        macro_rules! add_field {
            ($field:expr, $name:expr) => {
                if $field.is_some() {
                    sets.push(format!("{} = ${}", $name, idx));
                    idx += 1;
                }
            };
        }

        add_field!(data.name, "name");
        add_field!(data.description, "description");
        add_field!(data.category, "category");
        add_field!(data.daily_rate, "daily_rate");
        add_field!(data.images, "images");
        add_field!(data.features, "features");
        add_field!(data.specifications, "specifications");
        add_field!(data.is_available, "is_available");
        add_field!(data.is_in_maintenance, "is_in_maintenance");

        let query = format!(
            "UPDATE equipment SET {} WHERE id = $1 RETURNING *",
            sets.join(", ")
        );

        let mut builder = sqlx::query_as::<_, Equipment>(&query).bind(id);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(data.name);
        bind_field!(data.description);
        bind_field!(data.category);
        bind_field!(data.daily_rate);
        bind_field!(data.images);
        bind_field!(data.features);
        bind_field!(data.specifications);
        bind_field!(data.is_available);
        bind_field!(data.is_in_maintenance);

        builder
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::EquipmentNotFound(id))
    }

    async fn set_maintenance(&self, id: i32, in_maintenance: bool) -> AppResult<Equipment> {
        sqlx::query_as::<_, Equipment>(
            "UPDATE equipment SET is_in_maintenance = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(in_maintenance)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::EquipmentNotFound(id))
    }

    async fn set_availability(&self, id: i32, available: bool) -> AppResult<Equipment> {
        sqlx::query_as::<_, Equipment>(
            "UPDATE equipment SET is_available = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(available)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::EquipmentNotFound(id))
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM equipment WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::EquipmentNotFound(id));
        }
        Ok(())
    }
}
