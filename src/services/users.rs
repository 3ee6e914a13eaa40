//! User management service

use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    models::user::{UpdateProfile, UpdateUser, User, UserClaims, UserRole},
    repository::UserStore,
};

#[derive(Clone)]
pub struct UsersService {
    store: Arc<dyn UserStore>,
}

impl UsersService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, claims: &UserClaims) -> AppResult<Vec<User>> {
        claims.require_admin()?;
        self.store.list().await
    }

    pub async fn get(&self, claims: &UserClaims, id: i32) -> AppResult<User> {
        claims.require_self_or_admin(id, "view this user")?;
        self.store.get_by_id(id).await
    }

    pub async fn update(&self, claims: &UserClaims, id: i32, data: &UpdateUser) -> AppResult<User> {
        claims.require_admin()?;
        let user = self.store.update(id, data).await?;
        tracing::info!(user_id = id, role = %user.role, "User updated");
        Ok(user)
    }

    pub async fn update_profile(&self, claims: &UserClaims, data: &UpdateProfile) -> AppResult<User> {
        self.store.update_profile(claims.user_id, data).await
    }

    pub async fn delete(&self, claims: &UserClaims, id: i32) -> AppResult<()> {
        claims.require_admin()?;
        if claims.user_id == id {
            return Err(AppError::Validation("Cannot delete your own account".to_string()));
        }
        self.store.delete(id).await?;
        tracing::info!(user_id = id, "User deleted");
        Ok(())
    }

    pub async fn set_role(&self, claims: &UserClaims, id: i32, role: UserRole) -> AppResult<User> {
        claims.require_admin()?;
        if claims.user_id == id && role != UserRole::Admin {
            return Err(AppError::Validation("Cannot demote your own account".to_string()));
        }
        let user = self.store.set_role(id, role).await?;
        tracing::info!(user_id = id, %role, "User role changed");
        Ok(user)
    }
}
