//! Registry credential resolution and bearer-token caching.
//!
//! Host normalization and an env-over-stored-over-anonymous priority order,
//! reading stored credentials from `modctl_utils::docker_config`.

use std::{collections::HashMap, sync::Arc};

use oci_client::secrets::RegistryAuth;
use tokio::sync::Mutex;

use modctl_utils::{docker_config::DockerAuthCredentials, env};

use crate::{ModctlError, ModctlResult, reference::Reference};

/// Normalizes a registry host for consistent cache/credential-file lookups:
/// strips a scheme, trailing slash, and maps the legacy
/// `index.docker.io` alias to `docker.io`.
pub fn normalize_registry_host(host: &str) -> String {
    let mut normalized = host.trim().to_lowercase();
    if let Some(stripped) = normalized.strip_prefix("https://") {
        normalized = stripped.to_string();
    } else if let Some(stripped) = normalized.strip_prefix("http://") {
        normalized = stripped.to_string();
    }
    normalized = normalized.trim_end_matches('/').to_string();

    if normalized == "index.docker.io" {
        "docker.io".to_string()
    } else {
        normalized
    }
}

/// Resolves registry auth for `reference`.
///
/// Priority: environment variables, then an explicit `authfile` if one was
/// given, then the ambient Docker config, then anonymous. A token and a
/// basic-auth pair supplied together via environment is a usage error.
pub fn resolve_registry_auth(reference: &Reference, authfile: Option<&std::path::Path>) -> ModctlResult<RegistryAuth> {
    let registry = normalize_registry_host(reference.domain());

    let env_token = env::get_registry_token();
    let env_username = env::get_registry_username();
    let env_password = env::get_registry_password();

    if env_token.is_some() && (env_username.is_some() || env_password.is_some()) {
        return Err(ModctlError::Parse(
            "registry token cannot be combined with username/password".to_string(),
        ));
    }

    if let Some(token) = env_token {
        return Ok(RegistryAuth::Bearer(token));
    }

    match (env_username, env_password) {
        (Some(username), Some(password)) => return Ok(RegistryAuth::Basic(username, password)),
        (Some(_), None) | (None, Some(_)) => {
            tracing::warn!("registry credentials provided via env are incomplete; falling back to stored or anonymous");
        }
        (None, None) => {}
    }

    let stored = modctl_utils::docker_config::load_registry_credentials(&registry, authfile)
        .map_err(|e| ModctlError::Transport(format!("reading credentials for {registry}: {e}")))?;

    match stored {
        Some(DockerAuthCredentials::Basic { username, password }) => Ok(RegistryAuth::Basic(username, password)),
        Some(DockerAuthCredentials::Token { token }) => Ok(RegistryAuth::Bearer(token)),
        None => Ok(RegistryAuth::Anonymous),
    }
}

/// A process-wide bearer-token cache keyed by `{registry, scope}`, with
/// single-flight semantics per scope: concurrent callers requesting
/// the same scope share one in-flight fetch rather than issuing duplicate
/// token requests.
#[derive(Clone, Default)]
pub struct TokenCache {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl TokenCache {
    /// Builds an empty cache.
    pub fn new() -> Self {
        TokenCache::default()
    }

    /// Returns a cached token for `scope_key`, or populates it by awaiting
    /// `fetch` — held under the cache's single lock, so a second caller for
    /// the same (or a different) scope that arrives while `fetch` is running
    /// waits rather than racing a duplicate request.
    pub async fn get_or_fetch<F, Fut>(&self, scope_key: &str, fetch: F) -> ModctlResult<String>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = ModctlResult<String>>,
    {
        let mut entries = self.entries.lock().await;
        if let Some(token) = entries.get(scope_key) {
            return Ok(token.clone());
        }
        let token = fetch().await?;
        entries.insert(scope_key.to_string(), token.clone());
        Ok(token)
    }

    /// Invalidates a cached token, e.g. after a 401 on a request that
    /// presented it.
    pub async fn invalidate(&self, scope_key: &str) {
        self.entries.lock().await.remove(scope_key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    static ENV_LOCK: StdMutex<()> = StdMutex::new(());

    struct EnvGuard {
        key: &'static str,
        prev: Option<std::ffi::OsString>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let prev = std::env::var_os(key);
            unsafe { std::env::set_var(key, value) };
            EnvGuard { key, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match self.prev.take() {
                Some(value) => unsafe { std::env::set_var(self.key, value) },
                None => unsafe { std::env::remove_var(self.key) },
            }
        }
    }

    #[test]
    fn normalizes_scheme_and_legacy_docker_alias() {
        assert_eq!(normalize_registry_host("HTTPS://GHCR.IO/"), "ghcr.io");
        assert_eq!(normalize_registry_host("index.docker.io"), "docker.io");
    }

    #[test]
    fn env_token_wins_over_stored_and_errors_if_combined_with_basic() {
        let _guard = ENV_LOCK.lock().unwrap();
        let _t = EnvGuard::set("MODCTL_REGISTRY_TOKEN", "abc123");
        let _u = EnvGuard::set("MODCTL_REGISTRY_USERNAME", "alice");

        let reference = Reference::parse("ghcr.io/org/model:v1").unwrap();
        let result = resolve_registry_auth(&reference, None);
        assert!(result.is_err());
    }

    #[test]
    fn anonymous_when_nothing_configured() {
        let _guard = ENV_LOCK.lock().unwrap();
        unsafe {
            std::env::remove_var("MODCTL_REGISTRY_TOKEN");
            std::env::remove_var("MODCTL_REGISTRY_USERNAME");
            std::env::remove_var("MODCTL_REGISTRY_PASSWORD");
        }
        let reference = Reference::parse("unknown-registry.example/org/model:v1").unwrap();
        let auth = resolve_registry_auth(&reference, Some(std::path::Path::new("/nonexistent"))).unwrap();
        assert!(matches!(auth, RegistryAuth::Anonymous));
    }

    #[tokio::test]
    async fn token_cache_fetches_once_per_scope() {
        let cache = TokenCache::new();
        let calls = Arc::new(tokio::sync::Mutex::new(0usize));

        for _ in 0..3 {
            let calls = calls.clone();
            cache
                .get_or_fetch("repository:demo:pull", || async move {
                    *calls.lock().await += 1;
                    Ok("token-value".to_string())
                })
                .await
                .unwrap();
        }

        assert_eq!(*calls.lock().await, 1);
    }
}
