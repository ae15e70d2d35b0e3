//! Persistence seam for call and analytics records.
//!
//! The call controller writes through [`RecordStore`] and treats every
//! failure as non-fatal. [`MemoryStore`] backs the service by default.

use crate::error::StoreError;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub const CALLS: &str = "calls";
pub const ANALYTICS: &str = "analytics";

#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a record and return its id
    async fn create(&self, collection: &str, payload: Value) -> Result<String, StoreError>;

    /// Merge `payload`'s fields into an existing record
    async fn update(&self, collection: &str, id: &str, payload: Value) -> Result<(), StoreError>;
}

type Collections = HashMap<String, Vec<(String, Map<String, Value>)>>;

/// In-process store; records are kept in insertion order per collection
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, collection: &str, id: &str) -> Option<Value> {
        let collections = self.collections.read().await;
        collections
            .get(collection)?
            .iter()
            .find(|(record_id, _)| record_id == id)
            .map(|(_, fields)| Value::Object(fields.clone()))
    }

    pub async fn all(&self, collection: &str) -> Vec<Value> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .map(|(_, fields)| Value::Object(fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, collection: &str, payload: Value) -> Result<String, StoreError> {
        let Value::Object(mut fields) = payload else {
            return Err(StoreError::InvalidPayload);
        };
        let id = uuid::Uuid::new_v4().to_string();
        fields.insert("id".to_string(), Value::String(id.clone()));

        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push((id.clone(), fields));
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, payload: Value) -> Result<(), StoreError> {
        let Value::Object(changes) = payload else {
            return Err(StoreError::InvalidPayload);
        };
        let mut collections = self.collections.write().await;
        let record = collections
            .get_mut(collection)
            .and_then(|records| records.iter_mut().find(|(record_id, _)| record_id == id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        record.1.extend(changes);
        Ok(())
    }
}
