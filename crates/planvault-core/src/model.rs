//! The plan document.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A plan document.
///
/// Only `objectId` is interpreted; every other field is kept verbatim in
/// [`Plan::payload`] and round-trips unchanged through the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Unique identity of the plan; doubles as the store key.
    #[serde(rename = "objectId")]
    pub object_id: String,

    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Plan {
    /// The store key for this plan.
    pub fn key(&self) -> &str {
        &self.object_id
    }
}
