//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

use thiserror::Error;

/// The result of a modctl-cli related operation.
pub type ModctlCliResult<T> = Result<T, ModctlCliError>;

/// An error surfaced at the CLI boundary. Every other error kind is
/// folded into this one so `main` has a single place to print a one-line
/// message to stderr and pick an exit code.
#[derive(pretty_error_debug::Debug, Error)]
pub enum ModctlCliError {
    /// An I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Error returned from the modctl-core crate.
    #[error(transparent)]
    Core(#[from] modctl_core::ModctlError),

    /// A `login`/`logout` credentials-file operation failed.
    #[error("credentials error: {0}")]
    Credentials(#[from] modctl_utils::docker_config::DockerConfigError),

    /// Failed to render a report as JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
