//! `modctl_utils::error` is a module containing error utilities for the modctl project.

use std::{
    error::Error,
    fmt::{self, Display},
};

use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The result of a modctl-utils-related operation.
pub type ModctlUtilsResult<T> = Result<T, ModctlUtilsError>;

/// An error that occurred during a utility operation.
#[derive(pretty_error_debug::Debug, Error)]
pub enum ModctlUtilsError {
    /// An error that occurred when validating paths.
    #[error("path validation error: {0}")]
    PathValidation(String),

    /// An error that occurred when resolving a file.
    #[error("file not found at: {0}\nSource: {1}")]
    FileNotFound(String, String),

    /// An error that occurred when performing an IO operation.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// An error that occurred during a Serde JSON operation.
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// An error that occurred decoding base64.
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// An invalid credentials-file entry.
    #[error("invalid auth entry: {0}")]
    InvalidAuth(String),

    /// Custom error.
    #[error("custom error: {0}")]
    Custom(#[from] AnyError),
}

/// An error that can represent any error.
#[derive(Debug)]
pub struct AnyError {
    error: anyhow::Error,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ModctlUtilsError {
    /// Creates a new `Err` result.
    pub fn custom(error: impl Into<anyhow::Error>) -> ModctlUtilsError {
        ModctlUtilsError::Custom(AnyError {
            error: error.into(),
        })
    }
}

impl AnyError {
    /// Downcasts the error to a `T`.
    pub fn downcast<T>(&self) -> Option<&T>
    where
        T: Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error.downcast_ref::<T>()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Creates an `Ok` `ModctlUtilsResult`.
#[allow(non_snake_case)]
pub fn Ok<T>(value: T) -> ModctlUtilsResult<T> {
    Result::Ok(value)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl PartialEq for AnyError {
    fn eq(&self, other: &Self) -> bool {
        self.error.to_string() == other.error.to_string()
    }
}

impl Display for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Error for AnyError {}
