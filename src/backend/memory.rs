use super::model::{GoatRecord, GoatUpdate, NewGoat};
use super::repository::GoatRepository;
use crate::error::BackendError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Registry kept in process memory, for simulated sessions and tests
#[derive(Default)]
pub struct InMemoryGoatRepository {
    records: Mutex<BTreeMap<String, GoatRecord>>,
    create_requests: Mutex<Vec<Vec<u8>>>,
    failing_creates: AtomicU32,
    latency: Duration,
}

impl InMemoryGoatRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make the next `count` create calls fail
    pub fn fail_next_creates(&self, count: u32) {
        self.failing_creates.store(count, Ordering::SeqCst);
    }

    /// Serialized body of every create call, in order
    pub fn create_requests(&self) -> Vec<Vec<u8>> {
        self.create_requests.lock().clone()
    }

    pub fn records(&self) -> Vec<GoatRecord> {
        self.records.lock().values().cloned().collect()
    }

    fn not_found(id: &str) -> BackendError {
        BackendError::Status {
            status: 404,
            message: format!("Goat {} not found", id),
        }
    }
}

#[async_trait]
impl GoatRepository for InMemoryGoatRepository {
    async fn create(&self, goat: &NewGoat) -> Result<GoatRecord, BackendError> {
        let body = serde_json::to_vec(goat).map_err(|e| BackendError::Decode {
            details: e.to_string(),
        })?;
        self.create_requests.lock().push(body);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let failing = self
            .failing_creates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(BackendError::Unavailable {
                details: "simulated outage".to_string(),
            });
        }

        let record = GoatRecord::from_new(Uuid::new_v4().to_string(), goat);
        debug!("Stored goat {} in memory", record.id);
        self.records
            .lock()
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update(&self, id: &str, update: &GoatUpdate) -> Result<GoatRecord, BackendError> {
        let mut records = self.records.lock();
        let record = records.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        record.apply(update);
        Ok(record.clone())
    }

    async fn get(&self, id: &str) -> Result<GoatRecord, BackendError> {
        self.records
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| Self::not_found(id))
    }

    async fn delete(&self, id: &str) -> Result<(), BackendError> {
        self.records
            .lock()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(id))
    }

    async fn list_for_owner(&self, owner: &str) -> Result<Vec<GoatRecord>, BackendError> {
        Ok(self
            .records
            .lock()
            .values()
            .filter(|record| record.owner.as_deref() == Some(owner))
            .cloned()
            .collect())
    }
}
