use super::model::{GoatRecord, GoatUpdate, NewGoat};
use crate::error::BackendError;
use async_trait::async_trait;

/// Registry that stores finished goat records
#[async_trait]
pub trait GoatRepository: Send + Sync {
    async fn create(&self, goat: &NewGoat) -> Result<GoatRecord, BackendError>;

    async fn update(&self, id: &str, update: &GoatUpdate) -> Result<GoatRecord, BackendError>;

    async fn get(&self, id: &str) -> Result<GoatRecord, BackendError>;

    async fn delete(&self, id: &str) -> Result<(), BackendError>;

    async fn list_for_owner(&self, owner: &str) -> Result<Vec<GoatRecord>, BackendError>;
}
