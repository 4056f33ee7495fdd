//! Plan service layer.
//!
//! Enforces the existence invariants on top of [`PlanRepository`]: no
//! duplicate create, no delete of a missing plan. Each check and the write
//! that follows are separate store round trips with no lock, so two
//! concurrent creates of the same id can both succeed (last write wins).

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use crate::error::PlanError;
use crate::model::Plan;
use crate::repository::PlanRepository;

/// Upper bound on concurrent store reads in [`PlanService::get_all`].
///
/// Kept below the Postgres pool size so a bulk read never starves other
/// requests of connections.
pub const GET_ALL_CONCURRENCY: usize = 8;

const _: () = assert!(GET_ALL_CONCURRENCY < planvault_store::pool::MAX_CONNECTIONS as usize);

#[derive(Debug, Clone)]
pub struct PlanService {
    repo: PlanRepository,
}

impl PlanService {
    pub fn new(repo: PlanRepository) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &PlanRepository {
        &self.repo
    }

    /// Fetch a plan by id.
    pub async fn get(&self, id: &str) -> Result<Plan, PlanError> {
        debug!(plan_id = id, "fetching plan");
        self.repo.get(id).await
    }

    /// Persist a new plan.
    ///
    /// Fails with [`PlanError::AlreadyExists`] if a plan with the same id is
    /// currently stored. A corrupt entry under the id is overwritten.
    pub async fn create(&self, plan: &Plan) -> Result<(), PlanError> {
        if plan.object_id.trim().is_empty() {
            return Err(PlanError::Validation("objectId must not be empty".into()));
        }

        match self.repo.get(plan.key()).await {
            Ok(_) => return Err(PlanError::AlreadyExists(plan.object_id.clone())),
            Err(PlanError::NotFound(_)) => {}
            Err(PlanError::Corrupt { key, source }) => {
                warn!(plan_id = %key, error = %source, "overwriting corrupt plan entry");
            }
            Err(e) => return Err(e),
        }

        self.repo.put(plan).await?;
        info!(plan_id = %plan.object_id, "plan created");
        Ok(())
    }

    /// Delete a plan. Fails with [`PlanError::NotFound`] if it does not exist.
    pub async fn delete(&self, id: &str) -> Result<(), PlanError> {
        match self.repo.get(id).await {
            Ok(_) | Err(PlanError::Corrupt { .. }) => {}
            Err(e) => return Err(e),
        }

        self.repo.remove(id).await?;
        info!(plan_id = id, "plan deleted");
        Ok(())
    }

    /// Fetch every stored plan. Any single failure fails the whole call.
    ///
    /// Order is unspecified.
    pub async fn get_all(&self) -> Result<Vec<Plan>, PlanError> {
        let keys = self.repo.keys().await?;
        debug!(count = keys.len(), "fetching all plans");
        let repo = &self.repo;
        stream::iter(keys)
            .map(|key| async move { repo.get(&key).await })
            .buffer_unordered(GET_ALL_CONCURRENCY)
            .try_collect()
            .await
    }
}
