//! Configuration-error taxonomy.
//!
//! Per-step failures never reach this type: they are localized (skip that
//! cell / that patch) rather than aborting the step. `SCMError` is only
//! ever returned from the `Initialize*` constructors.

use std::fmt;

/// Fatal configuration error raised during [`crate::Scm`] initialization.
#[derive(Debug, Clone, PartialEq)]
pub enum SCMError {
    /// No collision service was wired up before the first step.
    MissingCollisionService,
    /// The embedder's heightmap loader returned no data or malformed
    /// dimensions (image decoding itself is out of scope for this crate).
    UnreadableHeightmap(String),
    /// The embedder-supplied triangle mesh was empty or degenerate.
    UnreadableMesh(String),
    /// Target grid spacing was zero or non-finite.
    DegenerateSpacing(f64),
    /// Building a dedicated rayon pool failed.
    ThreadPoolBuildFailed(String),
}

impl fmt::Display for SCMError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SCMError::MissingCollisionService => {
                write!(f, "no collision service registered before first step")
            }
            SCMError::UnreadableHeightmap(msg) => write!(f, "unreadable heightmap: {msg}"),
            SCMError::UnreadableMesh(msg) => write!(f, "unreadable triangle mesh: {msg}"),
            SCMError::DegenerateSpacing(delta) => {
                write!(f, "grid spacing must be positive and finite, got {delta}")
            }
            SCMError::ThreadPoolBuildFailed(msg) => write!(f, "failed to build thread pool: {msg}"),
        }
    }
}

impl std::error::Error for SCMError {}
