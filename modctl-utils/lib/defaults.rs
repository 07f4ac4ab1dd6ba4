//! Default values and constants used throughout modctl.

use std::{path::PathBuf, sync::LazyLock};

use crate::MODCTL_HOME_DIR;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The default storage directory, used when `--storage-dir` is not given.
pub static DEFAULT_STORAGE_DIR: LazyLock<PathBuf> =
    LazyLock::new(|| dirs::home_dir().unwrap().join(MODCTL_HOME_DIR).join("storage"));

/// The default log directory.
pub static DEFAULT_LOG_DIR: LazyLock<PathBuf> =
    LazyLock::new(|| dirs::home_dir().unwrap().join(MODCTL_HOME_DIR).join("log"));

/// The default OCI registry domain, used when a reference has no domain component.
pub const DEFAULT_OCI_REGISTRY: &str = "docker.io";

/// The default reference tag, used when neither tag nor digest is given where
/// one is optional.
pub const DEFAULT_REFERENCE_TAG: &str = "latest";

/// The default concurrency bound for processors and orchestrators.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Retry attempts for transient transport errors.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Initial backoff delay before the first retry.
pub const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 1_000;

/// Maximum backoff delay between retries.
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 5_000;

/// The media-type suffix that selects the tar codec; anything else falls
/// back to the raw codec.
pub const TAR_MEDIA_TYPE_SUFFIX: &str = ".tar";

/// Annotation key carrying a layer's workspace-relative path.
pub const ANNOTATION_FILEPATH: &str = "filepath";

/// Annotation key carrying the manifest's creation timestamp.
pub const ANNOTATION_CREATED: &str = "created";

/// Annotation key carrying the verbatim build recipe (Modelfile) bytes.
pub const ANNOTATION_MODELFILE: &str = "org.cnai.modctl.modelfile";

/// Annotation key prefix for model-identity fields set on built artifacts.
pub const ANNOTATION_MODEL_PREFIX: &str = "org.cnai.model.";

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_concurrency_is_positive() {
        assert!(DEFAULT_CONCURRENCY > 0);
    }

    #[test]
    fn default_storage_dir_points_under_home() {
        let home = dirs::home_dir().unwrap().join(MODCTL_HOME_DIR).join("storage");
        assert_eq!(*DEFAULT_STORAGE_DIR, home);
    }

    #[test]
    fn default_registry_and_tag() {
        assert_eq!(DEFAULT_OCI_REGISTRY, "docker.io");
        assert_eq!(DEFAULT_REFERENCE_TAG, "latest");
    }
}
