//! Key-value storage for planvault.
//!
//! The [`KeyValueStore`] trait is the only surface the rest of the workspace
//! sees. Two backends implement it: [`MemoryStore`] for tests and ephemeral
//! deployments, and [`PgStore`] backed by a PostgreSQL table.

pub mod config;
pub mod error;
pub mod memory;
pub mod pattern;
pub mod pool;
pub mod postgres;

use async_trait::async_trait;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use pattern::{KeyPattern, MATCH_ALL};
pub use postgres::PgStore;

/// Async string-to-string key-value store.
///
/// Implementations must be safe for concurrent use from many request tasks
/// without any locking by the caller. A missing key is always reported as
/// [`StoreError::NotFound`], never as a generic backend error.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Short backend name for logs (e.g. "memory", "postgres").
    fn name(&self) -> &str;

    /// Fetch the value stored under `key`.
    async fn get(&self, key: &str) -> StoreResult<String>;

    /// Store `value` under `key`, overwriting any previous value.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove `key`. Returns [`StoreError::NotFound`] if nothing was removed.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// List every key matching a glob `pattern` (see [`KeyPattern`]).
    ///
    /// Order is unspecified.
    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>>;
}

// Compile-time assertion: KeyValueStore must be usable as `dyn KeyValueStore`.
const _: () = {
    fn _assert_object_safe(_: &dyn KeyValueStore) {}
};
