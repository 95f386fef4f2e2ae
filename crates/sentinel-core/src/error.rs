//! Error type for the response pipeline.
//!
//! Almost nothing in the ingestion path is allowed to surface an error
//! - every stage boundary catches (§7) - so this type is deliberately
//! small: it exists for start-up configuration failures (the one
//! genuinely fatal error class) and as the opaque 500 the webhook
//! returns on the kind of bug that shouldn't happen but must not crash
//! the process.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SentinelError {
    /// Malformed start-up configuration. The only fatal error class.
    #[error("configuration error: {0}")]
    Config(String),

    /// Catch-all for anything unexpected in the webhook path; surfaced
    /// to callers as an opaque HTTP 500, never a panic.
    #[error("internal error: {0}")]
    Internal(String),
}
