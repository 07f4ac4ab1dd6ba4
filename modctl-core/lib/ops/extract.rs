//! Extract orchestrator: read a manifest from the local store and
//! decode every layer back onto disk, concurrently, bounded by
//! [`OpContext::concurrency`].

use std::{path::Path, path::PathBuf, sync::Arc};

use crate::{
    Descriptor, Manifest, ModctlResult,
    codec,
    concurrency::bounded_for_each,
    ops::{OpContext, store_reference},
    reference::Reference,
};

/// Inputs to [`extract`].
pub struct ExtractOptions {
    /// The artifact to extract.
    pub target: Reference,
    /// Destination directory; created if absent.
    pub output_dir: PathBuf,
}

/// The result of a successful extraction.
pub struct ExtractOutcome {
    /// Number of layers decoded.
    pub layer_count: usize,
}

/// Runs the extract orchestrator.
pub async fn extract(ctx: &OpContext, options: ExtractOptions) -> ModctlResult<ExtractOutcome> {
    let repo = options.target.repository_path().to_string();
    let reference_str = store_reference(&options.target);

    let (manifest_bytes, _digest) = ctx.store.pull_manifest(&repo, &reference_str, &ctx.cancel).await?;
    let manifest: Manifest = serde_json::from_slice(&manifest_bytes)?;

    extract_layers(ctx, &repo, &manifest.layers, &options.output_dir).await
}

/// Decodes `layers` (read from `repo` in the local store) to `output_dir`,
/// at up to [`OpContext::concurrency`] in flight — shared by [`extract`] and
/// `pull`'s post-pull extraction step.
pub(crate) async fn extract_layers(ctx: &OpContext, repo: &str, layers: &[Descriptor], output_dir: &Path) -> ModctlResult<ExtractOutcome> {
    tokio::fs::create_dir_all(output_dir).await?;

    let store = ctx.store.clone();
    let repo = Arc::new(repo.to_string());
    let output_dir = Arc::new(output_dir.to_path_buf());
    let layer_count = layers.len();

    bounded_for_each(layers.to_vec(), ctx.concurrency, ctx.cancel.clone(), move |descriptor, cancel| {
        let store = store.clone();
        let repo = repo.clone();
        let output_dir = output_dir.clone();
        async move {
            let stream = store.pull_blob(&repo, &descriptor.digest, &cancel).await?;
            let codec = codec::for_media_type(&descriptor.media_type);
            codec.decode(&output_dir, stream, &descriptor).await
        }
    })
    .await?;

    Ok(ExtractOutcome { layer_count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Digest, store::ContentStore};
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn extracts_raw_layer_to_output_dir() {
        let store_dir = TempDir::new().unwrap();
        let store = Arc::new(ContentStore::open(store_dir.path()).await.unwrap());

        let bytes = b"hi".to_vec();
        let digest = Digest::sha256(&bytes);
        let descriptor = Descriptor::new("application/vnd.cnai.model.layer.v1.raw", digest, bytes.len() as u64)
            .with_annotation(modctl_utils::defaults::ANNOTATION_FILEPATH, "README.md");
        store
            .push_blob("demo", Box::new(std::io::Cursor::new(bytes)), &descriptor, &CancellationToken::new())
            .await
            .unwrap();

        let config = Descriptor::new("application/vnd.cnai.model.config.v1+json", Digest::sha256(b"{}"), 2);
        store
            .push_blob("demo", Box::new(std::io::Cursor::new(b"{}".to_vec())), &config, &CancellationToken::new())
            .await
            .unwrap();

        let manifest = Manifest::new(config, vec![descriptor]);
        let bytes = serde_json::to_vec(&manifest).unwrap();
        store.push_manifest("demo", Some("v1"), &bytes, &CancellationToken::new()).await.unwrap();

        let ctx = OpContext::new(store);
        let out = TempDir::new().unwrap();
        let options = ExtractOptions {
            target: Reference::parse("localhost/demo:v1").unwrap(),
            output_dir: out.path().to_path_buf(),
        };

        let outcome = extract(&ctx, options).await.unwrap();
        assert_eq!(outcome.layer_count, 1);

        let content = tokio::fs::read_to_string(out.path().join("README.md")).await.unwrap();
        assert_eq!(content, "hi");
    }
}
