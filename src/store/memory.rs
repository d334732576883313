use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::models::email_key;
use super::{
    CalculationId, CalculationStore, NewCalculation, OwnerId, SavedCalculation, StoreError, User,
    UserStore,
};

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<String, User>,
    // Insertion order; listing relies on it to break timestamp ties.
    calculations: Vec<SavedCalculation>,
}

/// Process-local store. Contents do not survive a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}


#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, email: &str, password_hash: String) -> Result<User, StoreError> {
        let key = email_key(email);
        let mut inner = self.inner.write().await;
        if inner.users.contains_key(&key) {
            return Err(StoreError::Conflict(
                "this email is already registered".to_string(),
            ));
        }

        let user = User {
            id: OwnerId::new(),
            email: key.clone(),
            password_hash,
            created_at: Utc::now(),
        };
        inner.users.insert(key, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(&email_key(email)).cloned())
    }
}

#[async_trait]
impl CalculationStore for MemoryStore {
    async fn create(
        &self,
        owner: OwnerId,
        fields: &NewCalculation,
    ) -> Result<SavedCalculation, StoreError> {
        let valid = fields.validate()?;
        let saved = SavedCalculation::new(owner, valid, Utc::now());
        self.inner.write().await.calculations.push(saved.clone());
        Ok(saved)
    }

    async fn list_by_owner(&self, owner: OwnerId) -> Result<Vec<SavedCalculation>, StoreError> {
        let inner = self.inner.read().await;
        let mut owned: Vec<SavedCalculation> = inner
            .calculations
            .iter()
            .rev()
            .filter(|calc| calc.owner_id == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn delete_by_id(&self, id: CalculationId, owner: OwnerId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let idx = inner
            .calculations
            .iter()
            .position(|calc| calc.id == id)
            .ok_or(StoreError::NotFound(id))?;
        if inner.calculations[idx].owner_id != owner {
            return Err(StoreError::Permission(id));
        }
        inner.calculations.remove(idx);
        Ok(())
    }
}
