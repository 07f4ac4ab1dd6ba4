//! Pull orchestrator: the mirror of `push`, local-from-remote.

use std::{path::PathBuf, sync::Arc};

use crate::{
    Descriptor, Digest, ModctlError, ModctlResult,
    concurrency::bounded_for_each,
    ops::{OpContext, extract::extract_layers, store_reference},
    p2p::{P2pClient, P2pRequest},
    reference::Reference,
    remote::{RemoteClient, RemoteOptions},
    retry::with_retry,
};

/// Inputs to [`pull`].
pub struct PullOptions {
    /// The artifact to pull.
    pub target: Reference,
    /// Transport options for the source registry.
    pub remote: RemoteOptions,
    /// When set, re-runs extraction over the pulled manifest into this
    /// directory (`--extract-dir`).
    pub extract_dir: Option<PathBuf>,
    /// When set, streams layers straight to `extract_dir` without
    /// populating the local store; config and manifest are not fetched
    /// (`--extract-from-remote`).
    pub extract_from_remote: bool,
    /// When set, every layer blob is fetched through this local P2P daemon
    /// endpoint instead of the direct HTTPS path (`--dragonfly-endpoint`,
    /// ). The two transports must leave behind bit-identical local
    /// state; only the wire path differs.
    pub dragonfly_endpoint: Option<String>,
}

/// The result of a successful pull.
pub struct PullOutcome {
    /// Digest of the pulled manifest; `None` when `extract_from_remote` is
    /// set, since the manifest is never itself fetched in that mode.
    pub manifest_digest: Option<Digest>,
    /// Number of layer blobs actually transferred over the network (blobs
    /// already present locally are skipped and not counted).
    pub layers_pulled: usize,
}

/// Runs the pull orchestrator.
pub async fn pull(ctx: &OpContext, options: PullOptions) -> ModctlResult<PullOutcome> {
    let client = Arc::new(RemoteClient::new(&options.target, &options.remote)?);

    if options.extract_from_remote {
        let extract_dir = options
            .extract_dir
            .as_ref()
            .expect("extract_from_remote requires extract_dir to be set");
        let (oci_manifest, _config_bytes) = client.pull_manifest_and_config(&options.target).await?;
        let manifest = crate::remote::manifest_from_oci(&oci_manifest)?;

        let layers_pulled = stream_layers_to_dir(ctx, client, &options.target, &manifest.layers, extract_dir, options.dragonfly_endpoint.as_deref()).await?;
        return Ok(PullOutcome {
            manifest_digest: None,
            layers_pulled,
        });
    }

    let repo = options.target.repository_path().to_string();

    let (oci_manifest, config_bytes) = client.pull_manifest_and_config(&options.target).await?;
    let manifest = crate::remote::manifest_from_oci(&oci_manifest)?;

    let layers_pulled = pull_layers_into_store(ctx, client.clone(), &options.target, &repo, &manifest.layers, options.dragonfly_endpoint.as_deref()).await?;

    if !ctx.store.stat_blob(&repo, &manifest.config.digest).await? {
        ctx.store.push_blob(&repo, Box::new(std::io::Cursor::new(config_bytes)), &manifest.config, &ctx.cancel).await?;
    }

    let manifest_bytes = serde_json::to_vec(&manifest)?;
    let tag = options.target.tag();
    let manifest_digest = ctx.store.push_manifest(&repo, tag, &manifest_bytes, &ctx.cancel).await?;

    if let Some(extract_dir) = &options.extract_dir {
        extract_layers(ctx, &repo, &manifest.layers, extract_dir).await?;
    }

    Ok(PullOutcome {
        manifest_digest: Some(manifest_digest),
        layers_pulled,
    })
}

/// Pulls every layer in `layers` into the local store, skipping any digest
/// already present. A digest mismatch on write aborts just that blob and
/// fails the whole pull.
async fn pull_layers_into_store(
    ctx: &OpContext,
    client: Arc<RemoteClient>,
    reference: &Reference,
    repo: &str,
    layers: &[Descriptor],
    dragonfly_endpoint: Option<&str>,
) -> ModctlResult<usize> {
    let store = ctx.store.clone();
    let repo = Arc::new(repo.to_string());
    let reference = Arc::new(reference.clone());
    let cancel = ctx.cancel.clone();
    let progress = ctx.progress.clone();
    let dragonfly_endpoint = dragonfly_endpoint.map(|e| e.to_string());

    let results = bounded_for_each(layers.to_vec(), ctx.concurrency, cancel.clone(), move |descriptor, task_cancel| {
        let store = store.clone();
        let repo = repo.clone();
        let reference = reference.clone();
        let client = client.clone();
        let progress = progress.clone();
        let dragonfly_endpoint = dragonfly_endpoint.clone();
        async move {
            if store.stat_blob(&repo, &descriptor.digest).await? {
                return Ok(false);
            }

            with_retry(&task_cancel, || {
                let store = store.clone();
                let repo = repo.clone();
                let reference = reference.clone();
                let client = client.clone();
                let progress = progress.clone();
                let dragonfly_endpoint = dragonfly_endpoint.clone();
                let descriptor = descriptor.clone();
                let task_cancel = task_cancel.clone();
                async move {
                    match &dragonfly_endpoint {
                        Some(endpoint) => {
                            let temp_path = p2p_temp_path(&descriptor.digest);
                            fetch_blob_via_p2p(endpoint, &client, &reference, &descriptor, &temp_path, progress.as_ref(), &task_cancel).await?;
                            let file = tokio::fs::File::open(&temp_path).await?;
                            let stream: crate::codec::ByteStream = Box::new(file);
                            let result = store.push_blob(&repo, stream, &descriptor, &task_cancel).await;
                            let _ = tokio::fs::remove_file(&temp_path).await;
                            result?;
                        }
                        None => {
                            let stream = client.pull_blob(&reference, &descriptor, 0).await?;
                            store.push_blob(&repo, stream, &descriptor, &task_cancel).await?;
                        }
                    }
                    Ok(())
                }
            })
            .await?;

            Ok(true)
        }
    })
    .await?;

    Ok(results.into_iter().filter(|transferred| *transferred).count())
}

/// `extract_from_remote` path: streams each layer straight to `output_dir`
/// without ever touching the local store. Shared with `fetch`'s selective
/// pull; `fetch` never passes a `dragonfly_endpoint` since the CLI only
/// exposes `--dragonfly-endpoint` on `pull`.
pub(crate) async fn stream_layers_to_dir(
    ctx: &OpContext,
    client: Arc<RemoteClient>,
    reference: &Reference,
    layers: &[Descriptor],
    output_dir: &std::path::Path,
    dragonfly_endpoint: Option<&str>,
) -> ModctlResult<usize> {
    tokio::fs::create_dir_all(output_dir).await?;

    let reference = Arc::new(reference.clone());
    let output_dir = Arc::new(output_dir.to_path_buf());
    let layer_count = layers.len();
    let progress = ctx.progress.clone();
    let dragonfly_endpoint = dragonfly_endpoint.map(|e| e.to_string());

    bounded_for_each(layers.to_vec(), ctx.concurrency, ctx.cancel.clone(), move |descriptor, cancel| {
        let client = client.clone();
        let reference = reference.clone();
        let output_dir = output_dir.clone();
        let progress = progress.clone();
        let dragonfly_endpoint = dragonfly_endpoint.clone();
        async move {
            let codec = crate::codec::for_media_type(&descriptor.media_type);
            match &dragonfly_endpoint {
                Some(endpoint) => {
                    let temp_path = p2p_temp_path(&descriptor.digest);
                    fetch_blob_via_p2p(endpoint, &client, &reference, &descriptor, &temp_path, progress.as_ref(), &cancel).await?;
                    let file = tokio::fs::File::open(&temp_path).await?;
                    let stream: crate::codec::ByteStream = Box::new(file);
                    let result = codec.decode(&output_dir, stream, &descriptor).await;
                    let _ = tokio::fs::remove_file(&temp_path).await;
                    result
                }
                None => {
                    let stream = client.pull_blob(&reference, &descriptor, 0).await?;
                    codec.decode(&output_dir, stream, &descriptor).await
                }
            }
        }
    })
    .await?;

    Ok(layer_count)
}

/// A unique scratch path for one blob's P2P download, sibling to the
/// system temp dir so the daemon (a separate process) can always write it
/// regardless of which directory the caller eventually wants the bytes in.
fn p2p_temp_path(digest: &Digest) -> PathBuf {
    std::env::temp_dir().join(format!("modctl-p2p-{}.tmp", digest.storage_path_segment().replace('/', "-")))
}

/// Runs one P2P fetch for `descriptor` to `output_path`, obtaining a bearer
/// token from the remote client's cache and forwarding it to the daemon as
/// an `Authorization` header. Fails if the daemon closes its stream without
/// ever writing `output_path`.
async fn fetch_blob_via_p2p(
    endpoint: &str,
    client: &RemoteClient,
    reference: &Reference,
    descriptor: &Descriptor,
    output_path: &std::path::Path,
    progress: &dyn crate::progress::ProgressSink,
    cancel: &tokio_util::sync::CancellationToken,
) -> ModctlResult<()> {
    let p2p_client = P2pClient::new(endpoint.to_string());
    let token = client.get_auth_token(reference).await?;

    let mut request = P2pRequest::new(client.blob_url(reference, &descriptor.digest), output_path);
    if let Some(token) = token {
        request = request.with_bearer_token(token);
    }

    let handle = progress.start(&descriptor.digest.to_string(), Some(descriptor.size));
    let result = p2p_client.fetch(&request, handle.as_ref(), cancel).await;

    match &result {
        Ok(()) if crate::p2p::verify_output_written(output_path).await => handle.finish(),
        _ => {
            handle.finish_with_error();
            if result.is_ok() {
                return Err(ModctlError::Transport(format!("p2p daemon reported success but wrote no bytes for {}", descriptor.digest)));
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_without_tag_resolves_to_store_reference_string() {
        let digest = "sha256:".to_string() + &"d".repeat(64);
        let reference = Reference::parse(&format!("localhost/demo@{digest}")).unwrap();
        assert_eq!(store_reference(&reference), digest);
    }
}
