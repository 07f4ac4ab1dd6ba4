//! Utility functions for working with environment variables.

use std::path::PathBuf;

use crate::{DEFAULT_STORAGE_DIR, DEFAULT_OCI_REGISTRY};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Environment variable for the storage directory (CLI fallback).
pub const MODCTL_STORAGE_DIR_ENV_VAR: &str = "MODCTL_STORAGE_DIR";

/// Environment variable for registry host (CLI fallback).
pub const MODCTL_REGISTRY_HOST_ENV_VAR: &str = "MODCTL_REGISTRY_HOST";

/// Environment variable for registry username.
pub const MODCTL_REGISTRY_USERNAME_ENV_VAR: &str = "MODCTL_REGISTRY_USERNAME";

/// Environment variable for registry password.
pub const MODCTL_REGISTRY_PASSWORD_ENV_VAR: &str = "MODCTL_REGISTRY_PASSWORD";

/// Environment variable for a registry bearer token.
pub const MODCTL_REGISTRY_TOKEN_ENV_VAR: &str = "MODCTL_REGISTRY_TOKEN";

/// Docker-style credentials file location override (directory or file).
pub const DOCKER_CONFIG_ENV_VAR: &str = "DOCKER_CONFIG";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns the path to the default storage directory.
/// If `MODCTL_STORAGE_DIR` is set, returns that path. Otherwise, the default.
pub fn get_storage_dir_path() -> PathBuf {
    if let Ok(storage_dir) = std::env::var(MODCTL_STORAGE_DIR_ENV_VAR) {
        PathBuf::from(storage_dir)
    } else {
        DEFAULT_STORAGE_DIR.to_owned()
    }
}

/// Returns the domain for the default OCI registry.
/// If `MODCTL_REGISTRY_HOST` is set, returns that value. Otherwise, the default.
pub fn get_oci_registry() -> String {
    std::env::var(MODCTL_REGISTRY_HOST_ENV_VAR).unwrap_or_else(|_| DEFAULT_OCI_REGISTRY.to_string())
}

/// Returns the registry username from the environment, if set.
pub fn get_registry_username() -> Option<String> {
    std::env::var(MODCTL_REGISTRY_USERNAME_ENV_VAR).ok()
}

/// Returns the registry password from the environment, if set.
pub fn get_registry_password() -> Option<String> {
    std::env::var(MODCTL_REGISTRY_PASSWORD_ENV_VAR).ok()
}

/// Returns the registry bearer token from the environment, if set.
pub fn get_registry_token() -> Option<String> {
    std::env::var(MODCTL_REGISTRY_TOKEN_ENV_VAR).ok()
}
