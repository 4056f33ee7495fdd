//! Plan persistence on top of a [`KeyValueStore`].

use std::sync::Arc;

use planvault_store::{KeyValueStore, MATCH_ALL};

use crate::error::PlanError;
use crate::model::Plan;

/// Maps plans to and from their JSON string form in the store.
///
/// Holds the injected store handle; cloning shares it.
#[derive(Clone)]
pub struct PlanRepository {
    store: Arc<dyn KeyValueStore>,
}

impl PlanRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Backend name of the underlying store.
    pub fn backend(&self) -> &str {
        self.store.name()
    }

    pub async fn get(&self, key: &str) -> Result<Plan, PlanError> {
        let raw = self
            .store
            .get(key)
            .await
            .map_err(|e| PlanError::from_store(key, e))?;

        serde_json::from_str(&raw).map_err(|source| PlanError::Corrupt {
            key: key.to_owned(),
            source,
        })
    }

    pub async fn put(&self, plan: &Plan) -> Result<(), PlanError> {
        let raw = serde_json::to_string(plan).map_err(PlanError::Serialization)?;
        self.store
            .set(plan.key(), &raw)
            .await
            .map_err(|e| PlanError::from_store(plan.key(), e))
    }

    pub async fn remove(&self, key: &str) -> Result<(), PlanError> {
        self.store
            .delete(key)
            .await
            .map_err(|e| PlanError::from_store(key, e))
    }

    /// Every key in the store.
    pub async fn keys(&self) -> Result<Vec<String>, PlanError> {
        self.store
            .keys(MATCH_ALL)
            .await
            .map_err(PlanError::Store)
    }
}

impl std::fmt::Debug for PlanRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanRepository")
            .field("store", &self.store.name())
            .finish()
    }
}
