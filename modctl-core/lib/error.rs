//! Error taxonomy for the artifact engine.
//!
//! Variants group by kind, not by failing component, matching the taxonomy
//! operations are expected to reason about: parse/validation, not-found,
//! integrity, transport, storage, codec, and cancellation.

use thiserror::Error;

use crate::Digest;

/// The result of a modctl-core operation.
pub type ModctlResult<T> = Result<T, ModctlError>;

/// An error produced by the artifact engine.
#[derive(pretty_error_debug::Debug, Error)]
pub enum ModctlError {
    /// A reference, pattern, or other user input failed to parse or is missing
    /// a required part (e.g. a `build`/`tag` target with no tag).
    #[error("parse error: {0}")]
    Parse(String),

    /// A referenced manifest, blob, tag, or repository does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A fetch pattern set matched zero layers.
    #[error("no layers matched")]
    NoLayersMatched,

    /// The bytes read back from storage or the network do not hash to the
    /// digest the descriptor declared.
    #[error("digest mismatch: expected {expected}, computed {computed}")]
    DigestMismatch {
        /// The descriptor's declared digest.
        expected: Digest,
        /// The digest actually computed while streaming the content.
        computed: Digest,
    },

    /// A stream ended before the descriptor's declared size was reached.
    #[error("truncated stream: expected {expected} bytes, got {actual}")]
    TruncatedStream {
        /// Expected byte count.
        expected: u64,
        /// Bytes actually read.
        actual: u64,
    },

    /// A network, TLS, or authentication failure while talking to a registry
    /// or P2P daemon. Retryable by the caller's retry policy.
    #[error("transport error: {0}")]
    Transport(String),

    /// A filesystem I/O error in the content store.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// A tar entry attempted to traverse outside the extraction root, an
    /// unsupported media type was requested, or a source file was unreadable.
    #[error("codec error: {0}")]
    Codec(String),

    /// The operation's context was canceled, either by the caller or by a
    /// sibling failure in a bounded work group.
    #[error("canceled")]
    Canceled,

    /// A manifest or config document failed to (de)serialize.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Custom error, for cases not covered by the taxonomy above.
    #[error("{0}")]
    Custom(#[from] anyhow::Error),
}

impl ModctlError {
    /// Builds a [`ModctlError::NotFound`] for a manifest reference.
    pub fn manifest_not_found(repo: &str, reference: &str) -> Self {
        ModctlError::NotFound(format!("manifest {repo}:{reference}"))
    }

    /// Builds a [`ModctlError::NotFound`] for a blob digest.
    pub fn blob_not_found(repo: &str, digest: &Digest) -> Self {
        ModctlError::NotFound(format!("blob {repo}@{digest}"))
    }

    /// Wraps this error with an operation-identifying prefix, preserving the
    /// original error as the source (via `anyhow`'s context chain) rather
    /// than swallowing it.
    pub fn context(self, operation: &'static str) -> anyhow::Error {
        anyhow::Error::new(self).context(operation)
    }
}
