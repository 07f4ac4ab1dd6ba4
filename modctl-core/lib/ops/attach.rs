//! Attach orchestrator: append or replace one file in an existing
//! artifact, or replace its config blob outright, producing a new manifest.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    Descriptor, Digest, Manifest, ModctlError, ModctlResult,
    builder::{BuildSink, Builder},
    codec::LAYER_MEDIA_TYPE_RAW,
    model_config::ModelConfig,
    ops::{OpContext, store_reference},
    processor::patterns::FileClass,
    reference::Reference,
    remote::{RemoteClient, RemoteOptions},
};

/// Inputs to [`attach`].
pub struct AttachOptions {
    /// The source artifact (`-s`).
    pub source: Reference,
    /// The target the rebuilt artifact is written under (`-t`); must carry a
    /// tag.
    pub target: Reference,
    /// The file being attached.
    pub file_path: PathBuf,
    /// Replaces an existing layer at the same destination path instead of
    /// failing (`--force`).
    pub force: bool,
    /// Forces the new layer through the raw codec regardless of its class
    /// (`--raw`).
    pub raw: bool,
    /// Treats `file_path` as a model-config JSON document replacing the
    /// config blob directly, rather than a new layer (`--config`).
    pub config: bool,
    /// When set, both source and target are read/written through this
    /// remote registry instead of the local store (`--output-remote`).
    pub remote: Option<RemoteOptions>,
}

/// The result of a successful attach.
pub struct AttachOutcome {
    /// Digest of the resulting manifest — unchanged from the source's own
    /// digest when the attach was a no-op.
    pub manifest_digest: Digest,
    /// False when the attach detected an idempotent no-op and wrote nothing
    /// beyond what content-addressed dedup already guaranteed.
    pub changed: bool,
}

/// Runs the attach orchestrator.
pub async fn attach(ctx: &OpContext, options: AttachOptions) -> ModctlResult<AttachOutcome> {
    let source_repo = options.source.repository_path().to_string();
    let tag = options
        .target
        .tag()
        .ok_or_else(|| ModctlError::Parse("attach target must include a tag".to_string()))?
        .to_string();

    let remote_client = match &options.remote {
        Some(remote_options) => Some(Arc::new(RemoteClient::new(&options.source, remote_options)?)),
        None => None,
    };

    let (manifest, config_bytes) = read_source_manifest_and_config(ctx, remote_client.as_ref(), &options.source, &source_repo).await?;
    let model_config = ModelConfig::from_json_bytes(&config_bytes)?;

    let sink = match &remote_client {
        Some(client) => BuildSink::remote(client.clone(), options.target.clone()),
        None => BuildSink::local(ctx.store.clone(), options.target.repository_path().to_string()),
    };
    let builder = Builder::new(sink).with_progress(ctx.progress.clone());

    if options.config {
        let new_config_bytes = tokio::fs::read(&options.file_path)
            .await
            .map_err(|e| ModctlError::Parse(format!("reading config file {}: {e}", options.file_path.display())))?;
        let new_config = ModelConfig::from_json_bytes(&new_config_bytes).map_err(|e| ModctlError::Parse(format!("invalid model config JSON: {e}")))?;

        for layer in &manifest.layers {
            let bytes = read_blob(ctx, remote_client.as_ref(), &options.source, &source_repo, layer).await?;
            builder.carry_over_layer(layer, bytes, &ctx.cancel).await?;
        }

        let config_descriptor = builder.build_config(&new_config, &ctx.cancel).await?;
        let manifest_descriptor = builder
            .build_manifest(manifest.layers.clone(), config_descriptor, manifest.annotations.clone(), Some(&tag), &ctx.cancel)
            .await?;

        return Ok(AttachOutcome {
            manifest_digest: manifest_descriptor.digest,
            changed: true,
        });
    }

    let filepath = options
        .file_path
        .file_name()
        .ok_or_else(|| ModctlError::Parse(format!("attach file path {} has no file name", options.file_path.display())))?
        .to_string_lossy()
        .into_owned();

    let mut layers = manifest.layers.clone();
    if let Some(existing) = layers.iter().position(|l| l.filepath() == Some(filepath.as_str())) {
        if !options.force {
            return Err(ModctlError::Parse(format!("a layer already exists at {filepath}; pass --force to replace it")));
        }
        layers.remove(existing);
    }

    for layer in &layers {
        let bytes = read_blob(ctx, remote_client.as_ref(), &options.source, &source_repo, layer).await?;
        builder.carry_over_layer(layer, bytes, &ctx.cancel).await?;
    }

    let media_type = if options.raw {
        LAYER_MEDIA_TYPE_RAW
    } else {
        FileClass::classify(&filepath).map(FileClass::media_type).unwrap_or(LAYER_MEDIA_TYPE_RAW)
    };

    let workspace_root = options.file_path.parent().unwrap_or_else(|| Path::new("."));
    let relative_path = Path::new(&filepath);
    let new_descriptor = builder
        .build_layer(relative_path, workspace_root, media_type, Default::default(), &ctx.cancel)
        .await?;
    layers.push(new_descriptor);

    layers.sort_by(|a, b| layer_sort_key(a).cmp(&layer_sort_key(b)));

    let diff_ids: Vec<Digest> = layers.iter().map(|l| l.digest.clone()).collect();
    if model_config.diff_ids_match(&diff_ids) {
        return Ok(AttachOutcome {
            manifest_digest: manifest.canonical_digest()?,
            changed: false,
        });
    }

    let mut new_model_config = model_config;
    new_model_config.modelfs.diff_ids = diff_ids;
    let config_descriptor = builder.build_config(&new_model_config, &ctx.cancel).await?;
    let manifest_descriptor = builder
        .build_manifest(layers, config_descriptor, manifest.annotations.clone(), Some(&tag), &ctx.cancel)
        .await?;

    Ok(AttachOutcome {
        manifest_digest: manifest_descriptor.digest,
        changed: true,
    })
}

/// `(mediaTypePriority, filepath)` sort key, re-derived from each
/// descriptor's `filepath` annotation so the layer order stays deterministic
/// after attaching.
fn layer_sort_key(descriptor: &Descriptor) -> (u8, String) {
    let filepath = descriptor.filepath().unwrap_or_default().to_string();
    let priority = FileClass::classify(&filepath).map(FileClass::priority).unwrap_or(u8::MAX);
    (priority, filepath)
}

async fn read_source_manifest_and_config(
    ctx: &OpContext,
    remote_client: Option<&Arc<RemoteClient>>,
    source: &Reference,
    source_repo: &str,
) -> ModctlResult<(Manifest, Vec<u8>)> {
    match remote_client {
        Some(client) => {
            let (oci_manifest, config_bytes) = client.pull_manifest_and_config(source).await?;
            let manifest = crate::remote::manifest_from_oci(&oci_manifest)?;
            Ok((manifest, config_bytes))
        }
        None => {
            let reference_str = store_reference(source);
            let (manifest_bytes, _digest) = ctx.store.pull_manifest(source_repo, &reference_str, &ctx.cancel).await?;
            let manifest: Manifest = serde_json::from_slice(&manifest_bytes)?;
            let config_bytes = read_blob(ctx, None, source, source_repo, &manifest.config).await?;
            Ok((manifest, config_bytes))
        }
    }
}

async fn read_blob(
    ctx: &OpContext,
    remote_client: Option<&Arc<RemoteClient>>,
    source: &Reference,
    source_repo: &str,
    descriptor: &Descriptor,
) -> ModctlResult<Vec<u8>> {
    use tokio::io::AsyncReadExt;

    let mut stream = match remote_client {
        Some(client) => client.pull_blob(source, descriptor, 0).await?,
        None => ctx.store.pull_blob(source_repo, &descriptor.digest, &ctx.cancel).await?,
    };
    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes).await?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model_config::{ModelConfigBlock, ModelDescriptorBlock, ModelFs},
        store::ContentStore,
    };
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    async fn seeded_artifact(store: &Arc<ContentStore>, repo: &str, tag: &str) -> (Manifest, ModelConfig) {
        let cancel = CancellationToken::new();
        let layer_bytes = b"weights".to_vec();
        let layer_digest = Digest::sha256(&layer_bytes);
        let layer = Descriptor::new("application/vnd.cnai.model.layer.v1.raw", layer_digest.clone(), layer_bytes.len() as u64)
            .with_annotation(modctl_utils::defaults::ANNOTATION_FILEPATH, "model.bin");
        store.push_blob(repo, Box::new(std::io::Cursor::new(layer_bytes)), &layer, &cancel).await.unwrap();

        let model_config = ModelConfig {
            descriptor: ModelDescriptorBlock {
                family: Some("demo".to_string()),
                ..Default::default()
            },
            config: ModelConfigBlock::default(),
            modelfs: ModelFs { diff_ids: vec![layer_digest] },
        };
        let config_bytes = model_config.to_json_bytes().unwrap();
        let config_digest = Digest::sha256(&config_bytes);
        let config_descriptor = Descriptor::new("application/vnd.cnai.model.config.v1+json", config_digest, config_bytes.len() as u64);
        store
            .push_blob(repo, Box::new(std::io::Cursor::new(config_bytes)), &config_descriptor, &cancel)
            .await
            .unwrap();

        let manifest = Manifest::new(config_descriptor, vec![layer]);
        let manifest_bytes = serde_json::to_vec(&manifest).unwrap();
        store.push_manifest(repo, Some(tag), &manifest_bytes, &cancel).await.unwrap();

        (manifest, model_config)
    }

    #[tokio::test]
    async fn attaching_a_new_file_appends_a_sorted_layer() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ContentStore::open(dir.path()).await.unwrap());
        seeded_artifact(&store, "demo", "v1").await;

        let workspace = TempDir::new().unwrap();
        let new_file = workspace.path().join("README.md");
        tokio::fs::write(&new_file, "hi").await.unwrap();

        let ctx = OpContext::new(store.clone());
        let options = AttachOptions {
            source: Reference::parse("localhost/demo:v1").unwrap(),
            target: Reference::parse("localhost/demo:v2").unwrap(),
            file_path: new_file,
            force: false,
            raw: true,
            config: false,
            remote: None,
        };

        let outcome = attach(&ctx, options).await.unwrap();
        assert!(outcome.changed);

        let (bytes, _digest) = store.pull_manifest("demo", "v2", &CancellationToken::new()).await.unwrap();
        let manifest: Manifest = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(manifest.layers.len(), 2);
        let paths: Vec<&str> = manifest.layers.iter().map(|l| l.filepath().unwrap()).collect();
        assert_eq!(paths, vec!["model.bin", "README.md"]);
    }

    #[tokio::test]
    async fn reattaching_identical_content_at_same_path_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ContentStore::open(dir.path()).await.unwrap());
        let (source_manifest, _config) = seeded_artifact(&store, "demo", "v1").await;
        let source_digest = source_manifest.canonical_digest().unwrap();

        let workspace = TempDir::new().unwrap();
        let same_file = workspace.path().join("model.bin");
        tokio::fs::write(&same_file, "weights").await.unwrap();

        let ctx = OpContext::new(store.clone());
        let options = AttachOptions {
            source: Reference::parse("localhost/demo:v1").unwrap(),
            target: Reference::parse("localhost/demo:v1").unwrap(),
            file_path: same_file,
            force: true,
            raw: true,
            config: false,
            remote: None,
        };

        let outcome = attach(&ctx, options).await.unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.manifest_digest, source_digest);
    }

    #[tokio::test]
    async fn rejects_replacing_an_existing_path_without_force() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ContentStore::open(dir.path()).await.unwrap());
        seeded_artifact(&store, "demo", "v1").await;

        let workspace = TempDir::new().unwrap();
        let clashing_file = workspace.path().join("model.bin");
        tokio::fs::write(&clashing_file, "different weights").await.unwrap();

        let ctx = OpContext::new(store.clone());
        let options = AttachOptions {
            source: Reference::parse("localhost/demo:v1").unwrap(),
            target: Reference::parse("localhost/demo:v2").unwrap(),
            file_path: clashing_file,
            force: false,
            raw: true,
            config: false,
            remote: None,
        };

        assert!(attach(&ctx, options).await.is_err());
    }
}
