//! Docker-style `auths` credentials file: reading an ambient `~/.docker/config.json`
//! (or `$DOCKER_CONFIG`) and reading/writing modctl's own authfile written by `login`.
//!
//! # Examples
//! ```no_run
//! use modctl_utils::{load_docker_registry_credentials, ModctlUtilsError};
//!
//! let creds = load_docker_registry_credentials("ghcr.io")
//!     .map_err(ModctlUtilsError::custom)?;
//! if let Some(creds) = creds {
//!     println!("loaded docker credentials: {:?}", creds);
//! }
//! # Ok::<(), ModctlUtilsError>(())
//! ```

use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::env::DOCKER_CONFIG_ENV_VAR;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const DOCKER_CONFIG_FILENAME: &str = "config.json";
const DOCKER_IO_LEGACY_KEY: &str = "https://index.docker.io/v1/";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Credentials resolved for a registry host, regardless of the on-disk shape
/// they were read from (plain `username`/`password`, base64 `auth`, or
/// `identitytoken`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerAuthCredentials {
    /// Basic auth using username + password.
    Basic {
        /// Registry username.
        username: String,
        /// Registry password.
        password: String,
    },
    /// Token-based auth (identity token).
    Token {
        /// Registry token.
        token: String,
    },
}

/// Errors that can occur while reading or writing a Docker-style credentials file.
#[derive(Debug, thiserror::Error)]
pub enum DockerConfigError {
    /// IO error while reading or writing the config file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON parse/serialize error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Base64 decode error.
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
    /// Invalid auth entry.
    #[error("invalid auth entry: {0}")]
    InvalidAuth(String),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DockerConfig {
    #[serde(default)]
    auths: HashMap<String, DockerAuthEntry>,
    #[serde(rename = "credsStore", skip_serializing_if = "Option::is_none")]
    creds_store: Option<String>,
    #[serde(rename = "credHelpers", skip_serializing_if = "Option::is_none")]
    cred_helpers: Option<HashMap<String, String>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DockerAuthEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    auth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    identitytoken: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Functions: reading
//--------------------------------------------------------------------------------------------------

/// Loads credentials for a registry host from an explicit authfile path, or
/// the ambient Docker config location if `authfile` is `None`.
///
/// TODO: support credsStore/credHelpers on the write side (login only writes
/// plain `auth` entries today).
pub fn load_registry_credentials(
    host: &str,
    authfile: Option<&Path>,
) -> Result<Option<DockerAuthCredentials>, DockerConfigError> {
    let config_path = match authfile {
        Some(path) => path.to_path_buf(),
        None => match docker_config_path() {
            Some(path) => path,
            None => return Ok(None),
        },
    };
    if !config_path.exists() {
        return Ok(None);
    }

    let config = read_config(&config_path)?;
    if let Some(creds) = load_from_helpers(host, &config)? {
        return Ok(Some(creds));
    }

    for key in candidate_registry_keys(host) {
        if let Some(entry) = config.auths.get(key) {
            return parse_auth_entry(entry).map(Some);
        }
    }

    Ok(None)
}

/// Convenience wrapper for the common case: load from the ambient Docker config.
pub fn load_docker_registry_credentials(
    host: &str,
) -> Result<Option<DockerAuthCredentials>, DockerConfigError> {
    load_registry_credentials(host, None)
}

fn docker_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(DOCKER_CONFIG_ENV_VAR) {
        let path = PathBuf::from(path);
        return Some(if path.is_dir() {
            path.join(DOCKER_CONFIG_FILENAME)
        } else {
            path
        });
    }

    let home = dirs::home_dir()?;
    Some(home.join(".docker").join(DOCKER_CONFIG_FILENAME))
}

fn read_config(path: &Path) -> Result<DockerConfig, DockerConfigError> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str::<DockerConfig>(&contents)?)
}

fn candidate_registry_keys(host: &str) -> Vec<&str> {
    if host == "docker.io" {
        vec![host, DOCKER_IO_LEGACY_KEY]
    } else {
        vec![host]
    }
}

fn parse_auth_entry(entry: &DockerAuthEntry) -> Result<DockerAuthCredentials, DockerConfigError> {
    if let Some(token) = entry.identitytoken.as_ref() {
        if token.is_empty() {
            return Err(DockerConfigError::InvalidAuth(
                "identitytoken is empty".to_string(),
            ));
        }
        return Ok(DockerAuthCredentials::Token {
            token: token.to_string(),
        });
    }

    if let (Some(username), Some(password)) = (entry.username.as_ref(), entry.password.as_ref()) {
        if username.is_empty() || password.is_empty() {
            return Err(DockerConfigError::InvalidAuth(
                "username/password is empty".to_string(),
            ));
        }
        return Ok(DockerAuthCredentials::Basic {
            username: username.to_string(),
            password: password.to_string(),
        });
    }

    if let Some(encoded) = entry.auth.as_ref() {
        if encoded.is_empty() {
            return Err(DockerConfigError::InvalidAuth("auth is empty".to_string()));
        }
        let decoded = BASE64_STANDARD.decode(encoded)?;
        let decoded = String::from_utf8_lossy(&decoded);
        let (username, password) = decoded
            .split_once(':')
            .ok_or_else(|| DockerConfigError::InvalidAuth("auth missing ':'".to_string()))?;
        if username.is_empty() || password.is_empty() {
            return Err(DockerConfigError::InvalidAuth(
                "auth username/password is empty".to_string(),
            ));
        }
        return Ok(DockerAuthCredentials::Basic {
            username: username.to_string(),
            password: password.to_string(),
        });
    }

    Err(DockerConfigError::InvalidAuth(
        "no supported auth fields".to_string(),
    ))
}

fn load_from_helpers(
    host: &str,
    config: &DockerConfig,
) -> Result<Option<DockerAuthCredentials>, DockerConfigError> {
    let helper = match select_credential_helper(host, config) {
        Some(helper) => helper,
        None => return Ok(None),
    };

    for key in candidate_registry_keys(host) {
        if let Some(creds) = run_credential_helper(&helper, key)? {
            return Ok(Some(creds));
        }
    }

    Ok(None)
}

fn select_credential_helper(host: &str, config: &DockerConfig) -> Option<String> {
    if let Some(helpers) = config.cred_helpers.as_ref() {
        if let Some(helper) = helpers.get(host) {
            return Some(helper.to_string());
        }
    }

    config.creds_store.clone()
}

fn run_credential_helper(
    helper: &str,
    server_url: &str,
) -> Result<Option<DockerAuthCredentials>, DockerConfigError> {
    let helper_bin = format!("docker-credential-{helper}");
    let mut child = match Command::new(&helper_bin)
        .arg("get")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(DockerConfigError::Io(err)),
    };

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(server_url.as_bytes())?;
        stdin.write_all(b"\n")?;
    }

    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Ok(None);
    }

    parse_credential_helper_output(&output.stdout).map(Some)
}

fn parse_credential_helper_output(
    raw: &[u8],
) -> Result<DockerAuthCredentials, DockerConfigError> {
    #[derive(Deserialize)]
    struct HelperOutput {
        #[serde(rename = "Username")]
        username: String,
        #[serde(rename = "Secret")]
        secret: String,
    }

    let output: HelperOutput = serde_json::from_slice(raw)?;
    if output.secret.is_empty() {
        return Err(DockerConfigError::InvalidAuth(
            "credential helper secret is empty".to_string(),
        ));
    }

    if output.username.is_empty() {
        return Ok(DockerAuthCredentials::Token {
            token: output.secret,
        });
    }

    Ok(DockerAuthCredentials::Basic {
        username: output.username,
        password: output.secret,
    })
}

//--------------------------------------------------------------------------------------------------
// Functions: writing (login / logout)
//--------------------------------------------------------------------------------------------------

/// Writes (or replaces) the `auths.<host>` entry in the authfile at `path`,
/// creating the file and parent directories if necessary.
///
/// Always stores basic credentials as base64 `auth` to match the shape a
/// plain Docker config would use, so the same file can be read back by
/// either `load_registry_credentials` or a real `docker login`.
pub fn store_registry_credentials(
    path: &Path,
    host: &str,
    credentials: &DockerAuthCredentials,
) -> Result<(), DockerConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut config = if path.exists() {
        read_config(path)?
    } else {
        DockerConfig::default()
    };

    let entry = match credentials {
        DockerAuthCredentials::Basic { username, password } => DockerAuthEntry {
            auth: Some(BASE64_STANDARD.encode(format!("{username}:{password}"))),
            identitytoken: None,
            username: None,
            password: None,
        },
        DockerAuthCredentials::Token { token } => DockerAuthEntry {
            auth: None,
            identitytoken: Some(token.clone()),
            username: None,
            password: None,
        },
    };

    config.auths.insert(host.to_string(), entry);
    write_config(path, &config)
}

/// Removes the `auths.<host>` entry from the authfile at `path`, if present.
/// Returns whether an entry was removed.
pub fn remove_registry_credentials(path: &Path, host: &str) -> Result<bool, DockerConfigError> {
    if !path.exists() {
        return Ok(false);
    }

    let mut config = read_config(path)?;
    let removed = config.auths.remove(host).is_some();
    write_config(path, &config)?;
    Ok(removed)
}

fn write_config(path: &Path, config: &DockerConfig) -> Result<(), DockerConfigError> {
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)?;
    set_permissions_restrictive(path)?;
    Ok(())
}

fn set_permissions_restrictive(path: &Path) -> Result<(), DockerConfigError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = fs::metadata(path)?;
        let mut perms = metadata.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(path, perms)?;
    }
    Ok(())
}

/// The conventional authfile path modctl's `login`/`logout` write to when no
/// `--authfile` override is given: the same location a Docker config would
/// occupy, so credentials interoperate with `docker login`.
pub fn default_authfile_path() -> Option<PathBuf> {
    docker_config_path()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_raw_config(temp_dir: &TempDir, contents: &str) -> PathBuf {
        let path = temp_dir.path().join("config.json");
        fs::write(&path, contents).expect("write config");
        path
    }

    #[test]
    fn load_auth_from_basic_auth_field() {
        let dir = TempDir::new().expect("temp dir");
        let encoded = BASE64_STANDARD.encode("user:pass");
        let config = format!(
            r#"{{"auths": {{"registry.example.com": {{ "auth": "{encoded}" }} }} }}"#
        );
        let path = write_raw_config(&dir, &config);

        let creds = load_registry_credentials("registry.example.com", Some(&path))
            .expect("load creds")
            .expect("creds");

        assert_eq!(
            creds,
            DockerAuthCredentials::Basic {
                username: "user".to_string(),
                password: "pass".to_string()
            }
        );
    }

    #[test]
    fn load_auth_from_identity_token() {
        let dir = TempDir::new().expect("temp dir");
        let config = r#"{"auths": {"registry.example.com": { "identitytoken": "token-123" } } }"#;
        let path = write_raw_config(&dir, config);

        let creds = load_registry_credentials("registry.example.com", Some(&path))
            .expect("load creds")
            .expect("creds");

        assert_eq!(
            creds,
            DockerAuthCredentials::Token {
                token: "token-123".to_string()
            }
        );
    }

    #[test]
    fn store_then_load_roundtrips_basic_credentials() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("authfile.json");

        let creds = DockerAuthCredentials::Basic {
            username: "alice".to_string(),
            password: "hunter2".to_string(),
        };
        store_registry_credentials(&path, "ghcr.io", &creds).expect("store");

        let loaded = load_registry_credentials("ghcr.io", Some(&path))
            .expect("load")
            .expect("present");
        assert_eq!(loaded, creds);
    }

    #[test]
    fn remove_clears_entry() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("authfile.json");

        let creds = DockerAuthCredentials::Token {
            token: "tok".to_string(),
        };
        store_registry_credentials(&path, "ghcr.io", &creds).expect("store");
        assert!(remove_registry_credentials(&path, "ghcr.io").expect("remove"));
        assert!(load_registry_credentials("ghcr.io", Some(&path))
            .expect("load")
            .is_none());
    }

    #[test]
    fn docker_io_resolves_legacy_key() {
        let dir = TempDir::new().expect("temp dir");
        let encoded = BASE64_STANDARD.encode("user:pass");
        let config = format!(
            r#"{{"auths": {{"{DOCKER_IO_LEGACY_KEY}": {{ "auth": "{encoded}" }} }} }}"#
        );
        let path = write_raw_config(&dir, &config);

        let creds = load_registry_credentials("docker.io", Some(&path))
            .expect("load")
            .expect("present");
        assert_eq!(
            creds,
            DockerAuthCredentials::Basic {
                username: "user".to_string(),
                password: "pass".to_string()
            }
        );
    }

    #[test]
    fn parse_helper_output_basic() {
        let raw = br#"{"ServerURL":"ghcr.io","Username":"user","Secret":"pat"}"#;
        let creds = parse_credential_helper_output(raw).expect("parse helper output");
        assert_eq!(
            creds,
            DockerAuthCredentials::Basic {
                username: "user".to_string(),
                password: "pat".to_string()
            }
        );
    }
}
