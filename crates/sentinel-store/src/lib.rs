//! Threat/Action persistence.
//!
//! [`Store`] gives every other crate a single read/write surface over
//! two interchangeable backings: an in-memory ordered sequence
//! ([`memory::MemoryStore`]), and a durable relational backing
//! ([`durable::DurableStore`]) selected by `DATABASE_URL`. A failure in
//! the durable backing - at construction or on any call - degrades
//! transparently to the in-memory mirror the durable backing carries
//! alongside its pool; callers never see a storage error.

mod durable;
mod memory;

pub use durable::DurableStore;
pub use memory::MemoryStore;

use sentinel_model::{Action, Id, Threat};
use chrono::{DateTime, Utc};

/// Snapshot of how degraded the durable backing currently is, exposed
/// to `/health`.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StoreHealth {
    pub backing: &'static str,
    pub degraded_reads: u64,
    pub degraded_writes: u64,
}

/// Unified persistence handle. Every other component crate holds one
/// of these; only this crate touches the durable backing directly.
pub enum Store {
    Memory(MemoryStore),
    Durable(DurableStore),
}

impl Store {
    /// Builds a `Store` from `DATABASE_URL`. Absent => memory-only.
    /// Present but unreachable (bad URL, migration failure) => logs a
    /// warning and falls back to memory rather than propagating, per
    /// the "failure at initialization... degrades to in-memory" clause.
    pub async fn from_env() -> Self {
        match std::env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => match DurableStore::connect(&url).await {
                Ok(durable) => {
                    tracing::info!("store: durable backing connected");
                    Store::Durable(durable)
                }
                Err(err) => {
                    tracing::warn!(error = %err, "store: durable backing unavailable at startup, falling back to memory");
                    Store::Memory(MemoryStore::new())
                }
            },
            _ => {
                tracing::info!("store: DATABASE_URL not set, running memory-only");
                Store::Memory(MemoryStore::new())
            }
        }
    }

    pub fn memory() -> Self {
        Store::Memory(MemoryStore::new())
    }

    pub async fn add_threat(&self, threat: Threat) {
        match self {
            Store::Memory(m) => m.add_threat(threat),
            Store::Durable(d) => d.add_threat(threat).await,
        }
    }

    pub async fn add_action(&self, action: Action) {
        match self {
            Store::Memory(m) => m.add_action(action),
            Store::Durable(d) => d.add_action(action).await,
        }
    }

    pub async fn list_threats(&self) -> Vec<Threat> {
        match self {
            Store::Memory(m) => m.list_threats(),
            Store::Durable(d) => d.list_threats().await,
        }
    }

    pub async fn list_actions(&self) -> Vec<Action> {
        match self {
            Store::Memory(m) => m.list_actions(),
            Store::Durable(d) => d.list_actions().await,
        }
    }

    pub async fn find_threat(&self, id: Id) -> Option<Threat> {
        match self {
            Store::Memory(m) => m.find_threat(id),
            Store::Durable(d) => d.find_threat(id).await,
        }
    }

    pub async fn find_action(&self, id: Id) -> Option<Action> {
        match self {
            Store::Memory(m) => m.find_action(id),
            Store::Durable(d) => d.find_action(id).await,
        }
    }

    pub async fn mark_resolved(&self, id: Id, at: DateTime<Utc>) {
        match self {
            Store::Memory(m) => m.mark_resolved(id, at),
            Store::Durable(d) => d.mark_resolved(id, at).await,
        }
    }

    pub fn health(&self) -> StoreHealth {
        match self {
            Store::Memory(_) => StoreHealth {
                backing: "memory",
                degraded_reads: 0,
                degraded_writes: 0,
            },
            Store::Durable(d) => d.health(),
        }
    }
}

/// Applies the filter query parameters the Read API accepts, shared by
/// both threat and action listings so the clamp rule (`limit` default
/// 100, clamped to `[1, 1000]`) lives in one place.
pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(100).clamp(1, 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_limit_defaults_and_clamps() {
        assert_eq!(clamp_limit(None), 100);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(5000)), 1000);
        assert_eq!(clamp_limit(Some(42)), 42);
    }
}
