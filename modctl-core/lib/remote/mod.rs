//! Remote client: an authenticated façade over the OCI Distribution API,
//! providing the same verbs as the content store plus existence probes and
//! cross-manifest tag writes.
//!
//! Wraps `oci_client::Client` for manifest and blob transfer, plus a
//! hand-rolled bearer-token fetch for the distribution API's
//! `WWW-Authenticate: Bearer realm=...,service=...,scope=...` challenge.

pub mod auth;

use std::{collections::BTreeMap, time::Duration};

use oci_client::{
    Client as OciClient,
    client::{
        BlobResponse, ClientConfig as OciClientConfig, ClientProtocol, Config as OciConfig,
        ImageLayer as OciImageLayer, LayerDescriptor,
    },
    manifest::{OciDescriptor, OciImageManifest, OciManifest},
    secrets::RegistryAuth,
};
use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::Deserialize;

use crate::{
    Descriptor, Digest, Manifest, ModctlError, ModctlResult,
    codec::ByteStream,
    reference::Reference,
    remote::auth::TokenCache,
};

/// Transport options that shape how the underlying HTTP client reaches a
/// registry.
#[derive(Debug, Clone, Default)]
pub struct RemoteOptions {
    /// Use HTTP instead of HTTPS.
    pub plain_http: bool,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    /// An explicit proxy URL, applied to both HTTP and HTTPS traffic.
    pub proxy: Option<String>,
    /// Explicit authfile path (JSON `auths.<host>` map), overriding the
    /// ambient Docker config location.
    pub authfile: Option<std::path::PathBuf>,
}

/// A single item ready to be pushed: pre-encoded blob bytes plus the
/// descriptor metadata the builder already computed for it.
pub struct PushItem {
    /// The blob's bytes.
    pub data: Vec<u8>,
    /// The blob's media type.
    pub media_type: String,
    /// Annotations to attach to this layer's manifest entry.
    pub annotations: BTreeMap<String, String>,
}

/// The result of a successful push: the pullable URLs `oci_client` reports
/// for the config and manifest it wrote.
pub struct PushOutcome {
    /// URL of the pushed config blob.
    pub config_url: String,
    /// URL of the pushed manifest.
    pub manifest_url: String,
}

/// Authenticated façade over one registry's OCI Distribution v2 API.
pub struct RemoteClient {
    client: OciClient,
    auth: RegistryAuth,
    http: ClientWithMiddleware,
    tokens: TokenCache,
    scheme: &'static str,
}

impl RemoteClient {
    /// Builds a client authenticated for `reference`'s registry.
    pub fn new(reference: &Reference, options: &RemoteOptions) -> ModctlResult<Self> {
        let auth = auth::resolve_registry_auth(reference, options.authfile.as_deref())?;

        let mut config = OciClientConfig {
            protocol: if options.plain_http {
                ClientProtocol::Http
            } else {
                ClientProtocol::Https
            },
            accept_invalid_certificates: options.insecure,
            ..Default::default()
        };
        if let Some(proxy) = &options.proxy {
            config.https_proxy = Some(proxy.clone());
            config.http_proxy = Some(proxy.clone());
        }

        let mut http_builder = reqwest::Client::builder().danger_accept_invalid_certs(options.insecure);
        if let Some(proxy) = &options.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str()).map_err(|e| ModctlError::Transport(format!("invalid proxy {proxy}: {e}")))?;
            http_builder = http_builder.proxy(proxy);
        }
        let raw_http = http_builder
            .build()
            .map_err(|e| ModctlError::Transport(format!("building http client: {e}")))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(modctl_utils::defaults::DEFAULT_RETRY_ATTEMPTS);
        let http = reqwest_middleware::ClientBuilder::new(raw_http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(RemoteClient {
            client: OciClient::new(config),
            auth,
            http,
            tokens: TokenCache::new(),
            scheme: if options.plain_http { "http" } else { "https" },
        })
    }

    /// Fetches `reference`'s manifest, returning its canonical bytes and
    /// content digest.
    pub async fn pull_manifest(&self, reference: &Reference) -> ModctlResult<(Vec<u8>, Digest)> {
        let oci_reference = reference.as_oci_reference_for_remote()?;
        let (manifest, digest) = self
            .client
            .pull_manifest(oci_reference.as_ref(), &self.auth)
            .await
            .map_err(|e| ModctlError::Transport(format!("pulling manifest {reference}: {e}")))?;

        let bytes = serde_json::to_vec(&manifest)?;
        Ok((bytes, digest.parse()?))
    }

    /// Fetches `reference`'s manifest and config document together.
    pub async fn pull_manifest_and_config(&self, reference: &Reference) -> ModctlResult<(OciImageManifest, Vec<u8>)> {
        let oci_reference = reference.as_oci_reference_for_remote()?;
        let (manifest, _digest, config) = self
            .client
            .pull_manifest_and_config(oci_reference.as_ref(), &self.auth)
            .await
            .map_err(|e| ModctlError::Transport(format!("pulling manifest+config {reference}: {e}")))?;

        Ok((manifest, config.into_bytes()))
    }

    /// Opens a stream over one layer's bytes, starting at `offset` (nonzero
    /// to resume a partial local download).
    pub async fn pull_blob(&self, reference: &Reference, descriptor: &Descriptor, offset: u64) -> ModctlResult<ByteStream> {
        use futures::TryStreamExt;

        let layer = LayerDescriptor {
            digest: &descriptor.digest.to_string(),
            urls: &None,
        };

        let oci_reference = reference.as_oci_reference_for_remote()?;
        let response = self
            .client
            .pull_blob_stream_partial(oci_reference.as_ref(), &layer, offset, None)
            .await
            .map_err(|e| ModctlError::Transport(format!("pulling blob {}: {e}", descriptor.digest)))?;

        let stream = match response {
            BlobResponse::Full(s) => s.stream,
            BlobResponse::Partial(s) => s.stream,
        };

        let reader = stream.map_err(std::io::Error::other).into_async_read();
        Ok(Box::new(tokio_util::compat::FuturesAsyncReadCompatExt::compat(reader)))
    }

    /// Checks whether `reference`'s manifest already exists on the remote.
    pub async fn stat_manifest(&self, reference: &Reference) -> ModctlResult<bool> {
        let oci_reference = reference.as_oci_reference_for_remote()?;
        match self.client.pull_manifest(oci_reference.as_ref(), &self.auth).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(ModctlError::Transport(format!("probing manifest {reference}: {e}"))),
        }
    }

    /// Checks whether blob `digest` already exists in `reference`'s
    /// repository, via a distribution-spec `HEAD /v2/<repo>/blobs/<digest>`.
    pub async fn stat_blob(&self, reference: &Reference, digest: &Digest) -> ModctlResult<bool> {
        let token = self.get_auth_token(reference).await?;
        let url = format!(
            "{}://{}/v2/{}/blobs/{}",
            self.scheme(),
            reference.domain(),
            reference.repository_path(),
            digest
        );

        let mut request = self.http.head(&url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ModctlError::Transport(format!("probing blob {digest}: {e}")))?;

        Ok(response.status().is_success())
    }

    /// Pushes every layer, then the config, then a manifest built from them
    /// carrying `manifest_annotations`, in that order. `oci_client::Client::push`
    /// already skips any blob the registry reports as present.
    pub async fn push(
        &self,
        reference: &Reference,
        layers: Vec<PushItem>,
        config: PushItem,
        manifest_annotations: BTreeMap<String, String>,
    ) -> ModctlResult<PushOutcome> {
        let native_layers: Vec<OciImageLayer> = layers
            .into_iter()
            .map(|item| OciImageLayer::new(item.data, item.media_type, Some(item.annotations)))
            .collect();

        let native_config = OciConfig::new(config.data, config.media_type, Some(config.annotations));
        let annotations = if manifest_annotations.is_empty() { None } else { Some(manifest_annotations) };
        let manifest = OciImageManifest::build(&native_layers, &native_config, annotations);

        let response = self
            .client
            .push(reference.as_oci_reference(), &native_layers, native_config, &self.auth, Some(manifest))
            .await
            .map_err(|e| ModctlError::Transport(format!("pushing {reference}: {e}")))?;

        Ok(PushOutcome {
            config_url: response.config_url,
            manifest_url: response.manifest_url,
        })
    }

    /// Writes `manifest` under a new tag without re-uploading any blob —
    /// used by `tag`'s cross-manifest, cross-repo copy: all of the
    /// manifest's referenced layers and config are expected to already exist
    /// on the remote (verified by the caller via `stat_blob`/`mount_blob`
    /// before calling this).
    pub async fn push_manifest_only(&self, reference: &Reference, manifest: &OciImageManifest) -> ModctlResult<String> {
        let oci_reference = reference.as_oci_reference_for_remote()?;
        self.client
            .push_manifest(oci_reference.as_ref(), &OciManifest::Image(manifest.clone()))
            .await
            .map_err(|e| ModctlError::Transport(format!("pushing manifest {reference}: {e}")))
    }

    /// Returns a cached bearer token scoped to `repository:<repo>:pull`,
    /// fetching and caching one via the distribution spec's token endpoint
    /// if none is cached yet. Used directly by `pull`/`fetch` for P2P daemon
    /// authorization headers.
    pub async fn get_auth_token(&self, reference: &Reference) -> ModctlResult<Option<String>> {
        if matches!(self.auth, RegistryAuth::Anonymous) {
            return Ok(None);
        }

        let scope_key = format!("{}|repository:{}:pull", reference.domain(), reference.repository_path());
        let auth = self.auth.clone();
        let http = self.http.clone();
        let scheme = self.scheme();
        let domain = reference.domain().to_string();
        let repo = reference.repository_path().to_string();

        let token = self
            .tokens
            .get_or_fetch(&scope_key, || async move { fetch_bearer_token(&http, &scheme, &domain, &repo, &auth).await })
            .await?;

        Ok(Some(token))
    }

    fn scheme(&self) -> &'static str {
        self.scheme
    }

    /// This blob's distribution-spec pull URL within `reference`'s
    /// repository, handed to the P2P daemon as its fetch target:
    /// the daemon fetches the URL itself rather than going through
    /// `oci_client`, so it needs the raw `/v2/<repo>/blobs/<digest>` form.
    pub fn blob_url(&self, reference: &Reference, digest: &Digest) -> String {
        format!("{}://{}/v2/{}/blobs/{}", self.scheme(), reference.domain(), reference.repository_path(), digest)
    }
}

/// Performs the distribution spec's two-step bearer-token dance: a
/// `GET /v2/` probe to read the `WWW-Authenticate` challenge, then a
/// `GET <realm>?service=<service>&scope=repository:<repo>:pull` carrying
/// `auth`'s credentials, if any.
async fn fetch_bearer_token(
    http: &ClientWithMiddleware,
    scheme: &str,
    domain: &str,
    repo: &str,
    auth: &RegistryAuth,
) -> ModctlResult<String> {
    let probe_url = format!("{scheme}://{domain}/v2/");
    let probe = http
        .get(&probe_url)
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .map_err(|e| ModctlError::Transport(format!("probing {domain}: {e}")))?;

    let Some(challenge) = probe.headers().get("www-authenticate").and_then(|v| v.to_str().ok()) else {
        return Err(ModctlError::Transport(format!("{domain} did not present a bearer auth challenge")));
    };

    let fields = parse_www_authenticate(challenge);
    let realm = fields
        .get("realm")
        .ok_or_else(|| ModctlError::Transport(format!("{domain}'s auth challenge has no realm")))?;
    let service = fields.get("service").cloned().unwrap_or_default();
    let scope = format!("repository:{repo}:pull");

    let mut request = http.get(realm).query(&[("service", service.as_str()), ("scope", scope.as_str())]);
    if let RegistryAuth::Basic(username, password) = auth {
        request = request.basic_auth(username, Some(password));
    }

    let response = request
        .send()
        .await
        .map_err(|e| ModctlError::Transport(format!("fetching token from {realm}: {e}")))?;

    let body: TokenResponse = response
        .json()
        .await
        .map_err(|e| ModctlError::Transport(format!("parsing token response: {e}")))?;

    body.token
        .or(body.access_token)
        .ok_or_else(|| ModctlError::Transport(format!("token response from {realm} carried no token")))
}

#[derive(Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

fn parse_www_authenticate(header: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    let Some(rest) = header.strip_prefix("Bearer ") else {
        return fields;
    };

    for part in rest.split(',') {
        if let Some((key, value)) = part.trim().split_once('=') {
            fields.insert(key.trim().to_string(), value.trim().trim_matches('"').to_string());
        }
    }
    fields
}

fn is_not_found(error: &oci_client::errors::OciDistributionError) -> bool {
    error.to_string().to_lowercase().contains("not found") || error.to_string().contains("404")
}

/// Converts `oci_client`'s own manifest type (distinct from `oci_spec::image::ImageManifest`,
/// which this crate's [`Manifest`] otherwise converts to/from) into the
/// crate-local [`Manifest`], used after [`RemoteClient::pull_manifest_and_config`].
pub(crate) fn manifest_from_oci(manifest: &OciImageManifest) -> ModctlResult<Manifest> {
    let config = descriptor_from_oci(&manifest.config)?;
    let layers = manifest.layers.iter().map(descriptor_from_oci).collect::<ModctlResult<Vec<_>>>()?;

    let mut result = Manifest::new(config, layers);
    result.schema_version = manifest.schema_version as u32;
    if let Some(media_type) = &manifest.media_type {
        result.media_type = media_type.clone();
    }
    if let Some(annotations) = &manifest.annotations {
        result.annotations = annotations.clone();
    }
    Ok(result)
}

fn descriptor_from_oci(descriptor: &OciDescriptor) -> ModctlResult<Descriptor> {
    Ok(Descriptor {
        media_type: descriptor.media_type.clone(),
        digest: descriptor.digest.parse()?,
        size: descriptor.size as u64,
        annotations: descriptor.annotations.clone().unwrap_or_default(),
        data: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_www_authenticate_challenge() {
        let header = r#"Bearer realm="https://auth.example/token",service="registry.example",scope="repository:demo:pull""#;
        let fields = parse_www_authenticate(header);
        assert_eq!(fields.get("realm").unwrap(), "https://auth.example/token");
        assert_eq!(fields.get("service").unwrap(), "registry.example");
        assert_eq!(fields.get("scope").unwrap(), "repository:demo:pull");
    }

    #[test]
    fn remote_client_builds_with_plain_http_and_insecure() {
        let reference = Reference::parse("localhost:5000/demo:v1").unwrap();
        let options = RemoteOptions {
            plain_http: true,
            insecure: true,
            proxy: None,
            authfile: None,
        };
        assert!(RemoteClient::new(&reference, &options).is_ok());
    }
}
