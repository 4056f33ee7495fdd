//! Plan documents with conditional-request (ETag) support.
//!
//! - [`model`]: the [`Plan`] document.
//! - [`conditional`]: ETag computation and `If-None-Match` / `If-Match`
//!   evaluation.
//! - [`repository`]: plan (de)serialization over a key-value store.
//! - [`service`]: existence invariants for create/delete.

pub mod conditional;
pub mod error;
pub mod model;
pub mod repository;
pub mod service;

pub use conditional::{ReadOutcome, Validators, compute_etag, evaluate_read, stamp_on_create};
pub use error::PlanError;
pub use model::Plan;
pub use repository::PlanRepository;
pub use service::PlanService;
