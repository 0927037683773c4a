//! services/portal/src/error.rs
//!
//! Defines the primary error type for the entire portal library.
//!
//! Pipeline-level errors (`Upload`, `Deletion`, `Auth`, `Reauthentication`)
//! are caught at the pipeline boundary and re-surfaced to the invoking UI
//! action. `Extraction` and `Assistant` failures have safe fallbacks and are
//! converted into degraded-but-functional outcomes instead of propagating.

use crate::config::ConfigError;
use studyhall_core::ports::PortError;

/// The primary error type for the `portal` library.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Bad input caught before any network call; user-correctable.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Content extraction failed; non-fatal, degrades content richness.
    #[error("Content extraction failed: {0}")]
    Extraction(String),

    /// An upload pipeline step failed after validation passed.
    #[error("Upload failed: {0}")]
    Upload(PortError),

    /// A deletion pipeline step failed.
    #[error("Deletion failed: {0}")]
    Deletion(PortError),

    /// The identity provider rejected an operation; its message is passed
    /// through verbatim.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Re-authentication with the current password was rejected.
    #[error("Re-authentication failed: {0}")]
    Reauthentication(String),

    /// Both the primary and fallback generation models failed.
    #[error("Assistant unavailable: {0}")]
    Assistant(String),

    /// Represents an error that propagated up from one of the core service
    /// ports outside a specific pipeline.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),
}
