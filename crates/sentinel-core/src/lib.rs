//! # Sentinel core
//!
//! The event-to-action pipeline facade. [`Sentinel`] wires together
//! every component crate in the workspace - normalization (`sentinel_detect`),
//! persistence (`sentinel_store`), anomaly scoring (`sentinel_scoring`),
//! decision and actuation (`sentinel_response`), live fan-out
//! (`sentinel_broadcast`) and explanation (`sentinel_explain`) - into
//! the single `ingest()` call the HTTP front-end drives per webhook
//! request.
//!
//! ```text
//! webhook -> normalize -> store -> broadcast -> score -> decide -> actuate -> store
//! ```
//!
//! Nothing in here terminates HTTP; that's `sentinel-server`. This
//! crate owns configuration, the composed error type, and the
//! pipeline itself.

mod config;
mod error;
mod sentinel;

pub use config::SentinelConfig;
pub use error::SentinelError;
pub use sentinel::{IngestOutcome, Sentinel, SentinelHealth, ServiceStatus};

pub type Result<T> = std::result::Result<T, SentinelError>;
