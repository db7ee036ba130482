//! caregate-registry — service health registry for the caregate gateway.
//!
//! Tracks a set of downstream services, probes their `/health` endpoints
//! on an interval with retries and exponential backoff, and answers
//! routing questions ("is billing up?") without ever raising an error.
//!
//! # Architecture
//!
//! ```text
//! ServiceRegistry
//!   ├── RegistryStore        name → ServiceRecord, staleness correction
//!   ├── HealthChecker        probe → retry/backoff → record outcome
//!   │   └── Probe            HttpProbe (hyper) or a test double
//!   └── scheduler loop       interval tick → concurrent checks → summary
//! ```
//!
//! # Status model
//!
//! A record is `unknown` until its first check completes. A check ends in
//! `healthy` (HTTP 200) or `unhealthy` (retries exhausted). A record whose
//! last check is older than twice the interval reads as `unknown` again.

pub mod checker;
pub mod config;
pub mod error;
pub mod registry;
pub mod store;
pub mod types;

pub use checker::{backoff, BoxFuture, HealthChecker, HttpProbe, Probe, ProbeResult};
pub use config::{RegistryConfig, ServiceEntry};
pub use error::{RegistryError, RegistryResult};
pub use registry::ServiceRegistry;
pub use store::{CheckOutcome, RegistryStore};
pub use types::*;
