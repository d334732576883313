mod memory;
mod models;
mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use models::{
    CalculationId, NewCalculation, OwnerId, SavedCalculation, UNNAMED_CALCULATION, User,
    ValidCalculation,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),
    #[error("calculation {0} not found")]
    NotFound(CalculationId),
    #[error("not allowed to delete calculation {0}")]
    Permission(CalculationId),
    #[error("{0}")]
    Conflict(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] when the email is already registered.
    async fn create_user(&self, email: &str, password_hash: String) -> Result<User, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait CalculationStore: Send + Sync {
    async fn create(
        &self,
        owner: OwnerId,
        fields: &NewCalculation,
    ) -> Result<SavedCalculation, StoreError>;

    /// Newest first.
    async fn list_by_owner(&self, owner: OwnerId) -> Result<Vec<SavedCalculation>, StoreError>;

    async fn delete_by_id(&self, id: CalculationId, owner: OwnerId) -> Result<(), StoreError>;
}
