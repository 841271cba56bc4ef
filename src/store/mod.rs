//! Typed client for the secret store's administrative HTTP API.
//!
//! The store is an opaque external dependency; everything the coordinator
//! knows about it flows through [`StoreClient`]. The client carries no retry
//! policy and no business logic — it classifies transport and status-code
//! outcomes into the coordinator's error taxonomy and nothing more.

pub mod client;
pub mod types;

pub use client::{StoreClient, StoreClientConfig};
pub use types::{HealthStatus, InitResponse, SealStatus};
