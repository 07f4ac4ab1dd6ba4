//! `modctl_utils::path` is a module containing path utilities for the modctl project.

use std::path::{Path, PathBuf};

use typed_path::{Utf8UnixComponent, Utf8UnixPathBuf};

use crate::{ModctlUtilsError, ModctlUtilsResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The directory name for modctl's global data (storage dir default).
pub const MODCTL_HOME_DIR: &str = ".modctl";

/// The subdirectory under a storage dir where content-addressed blobs live.
///
/// Example: `<storage-dir>/<BLOBS_SUBDIR>/sha256/<hex>`
pub const BLOBS_SUBDIR: &str = "blobs";

/// The subdirectory under a storage dir where per-repository index/tag files live.
///
/// Example: `<storage-dir>/<REPOS_SUBDIR>/<repo-path>/index.json`
pub const REPOS_SUBDIR: &str = "repos";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The type of a supported path.
pub enum SupportedPathType {
    /// Any path type.
    Any,

    /// An absolute path.
    Absolute,

    /// A relative path.
    Relative,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Normalizes a path string.
///
/// Rules:
/// - Resolves . and .. components where possible
/// - Prevents path traversal that would escape the root
/// - Removes redundant separators and trailing slashes
/// - Case-sensitive comparison (Unix standard)
/// - Can enforce path type requirements (absolute, relative, or any)
pub fn normalize_path(path: &str, path_type: SupportedPathType) -> ModctlUtilsResult<String> {
    if path.is_empty() {
        return Err(ModctlUtilsError::PathValidation(
            "path cannot be empty".to_string(),
        ));
    }

    let path = Utf8UnixPathBuf::from(path);
    let mut normalized = Vec::new();
    let mut is_absolute = false;
    let mut depth = 0;

    for component in path.components() {
        match component {
            Utf8UnixComponent::RootDir => {
                if normalized.is_empty() {
                    is_absolute = true;
                    normalized.push("/".to_string());
                } else {
                    return Err(ModctlUtilsError::PathValidation(
                        "invalid path: root component '/' found in middle of path".to_string(),
                    ));
                }
            }
            Utf8UnixComponent::ParentDir => {
                if depth > 0 {
                    normalized.pop();
                    depth -= 1;
                } else {
                    return Err(ModctlUtilsError::PathValidation(
                        "invalid path: cannot traverse above root directory".to_string(),
                    ));
                }
            }
            Utf8UnixComponent::CurDir => continue,
            Utf8UnixComponent::Normal(c) => {
                if !c.is_empty() {
                    normalized.push(c.to_string());
                    depth += 1;
                }
            }
        }
    }

    match path_type {
        SupportedPathType::Absolute if !is_absolute => {
            return Err(ModctlUtilsError::PathValidation(
                "path must be absolute (start with '/')".to_string(),
            ));
        }
        SupportedPathType::Relative if is_absolute => {
            return Err(ModctlUtilsError::PathValidation(
                "path must be relative (must not start with '/')".to_string(),
            ));
        }
        _ => {}
    }

    if is_absolute {
        if normalized.len() == 1 {
            Ok("/".to_string())
        } else {
            Ok(format!("/{}", normalized[1..].join("/")))
        }
    } else {
        Ok(normalized.join("/"))
    }
}

/// Sanitizes a layer entry path recorded in a `filepath` annotation or a tar
/// entry header against traversal outside of an extraction directory.
///
/// Refuses any path that, once cleaned, is absolute, escapes the root via
/// `..`, or carries a Windows drive prefix (`C:\...`) — the three traversal
/// shapes called out by the tar codec's decode step.
pub fn sanitize_entry_path(raw: &str) -> ModctlUtilsResult<PathBuf> {
    if raw.is_empty() {
        return Err(ModctlUtilsError::PathValidation(
            "entry path cannot be empty".to_string(),
        ));
    }

    if raw.len() >= 2 && raw.as_bytes()[1] == b':' {
        return Err(ModctlUtilsError::PathValidation(format!(
            "entry path carries a drive prefix: {raw}"
        )));
    }

    let cleaned = normalize_path(raw, SupportedPathType::Any)?;
    if cleaned.starts_with('/') {
        return Err(ModctlUtilsError::PathValidation(format!(
            "entry path is absolute: {raw}"
        )));
    }

    Ok(PathBuf::from(cleaned))
}

/// Resolves the path to a file, checking both environment variable and default locations.
pub fn resolve_env_path(
    env_var: &str,
    default_path: impl AsRef<Path>,
) -> ModctlUtilsResult<PathBuf> {
    let (path, source) = std::env::var(env_var)
        .map(|p| (PathBuf::from(p), "environment variable"))
        .unwrap_or_else(|_| (default_path.as_ref().to_path_buf(), "default path"));

    if !path.exists() {
        return Err(ModctlUtilsError::FileNotFound(
            path.to_string_lossy().to_string(),
            source.to_string(),
        ));
    }

    Ok(path)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("/data/app/", SupportedPathType::Absolute).unwrap(),
            "/data/app"
        );
        assert_eq!(
            normalize_path("/data//app", SupportedPathType::Absolute).unwrap(),
            "/data/app"
        );
        assert_eq!(
            normalize_path("data/app/", SupportedPathType::Relative).unwrap(),
            "data/app"
        );
        assert_eq!(
            normalize_path("/data/temp/../app", SupportedPathType::Absolute).unwrap(),
            "/data/app"
        );

        assert!(matches!(
            normalize_path("data/app", SupportedPathType::Absolute),
            Err(ModctlUtilsError::PathValidation(e)) if e.contains("must be absolute")
        ));
        assert!(matches!(
            normalize_path("/data/../..", SupportedPathType::Any),
            Err(ModctlUtilsError::PathValidation(e)) if e.contains("cannot traverse above root")
        ));
    }

    #[test]
    fn sanitize_rejects_parent_dir_escape() {
        assert!(sanitize_entry_path("../../etc/passwd").is_err());
    }

    #[test]
    fn sanitize_rejects_absolute_path() {
        assert!(sanitize_entry_path("/etc/passwd").is_err());
    }

    #[test]
    fn sanitize_rejects_drive_prefix() {
        assert!(sanitize_entry_path("C:\\Windows\\system.ini").is_err());
    }

    #[test]
    fn sanitize_accepts_nested_relative_path() {
        let p = sanitize_entry_path("weights/model.bin").unwrap();
        assert_eq!(p, PathBuf::from("weights/model.bin"));
    }
}
