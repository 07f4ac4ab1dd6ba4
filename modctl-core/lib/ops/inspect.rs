//! Inspect orchestrator: reads a manifest and its config blob
//! (local or remote) and flattens both into one JSON-serializable report.

use serde::Serialize;

use crate::{
    Manifest, ModctlResult,
    model_config::ModelConfig,
    ops::{OpContext, store_reference},
    reference::Reference,
    remote::{RemoteClient, RemoteOptions},
};

/// One layer entry in an [`InspectReport`].
#[derive(Debug, Clone, Serialize)]
pub struct LayerInfo {
    /// The layer's media type.
    #[serde(rename = "mediaType")]
    pub media_type: String,
    /// The layer's content digest.
    pub digest: String,
    /// The layer's size in bytes.
    pub size: u64,
    /// The layer's `filepath` annotation, if present.
    pub filepath: Option<String>,
}

/// Flat JSON report produced by [`inspect`].
#[derive(Debug, Clone, Serialize)]
pub struct InspectReport {
    /// Short form of `digest` (its first 12 hex characters), Docker-style.
    pub id: String,
    /// The manifest's full content digest.
    pub digest: String,
    /// The model architecture, from the config's `config` block.
    pub architecture: Option<String>,
    /// RFC3339 creation timestamp, from the config's `descriptor` block.
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    /// The model family.
    pub family: Option<String>,
    /// The on-disk weight format.
    pub format: Option<String>,
    /// The model name.
    pub name: Option<String>,
    /// The parameter count/size.
    #[serde(rename = "paramSize")]
    pub param_size: Option<String>,
    /// The weight precision.
    pub precision: Option<String>,
    /// The weight quantization scheme, if quantized.
    pub quantization: Option<String>,
    /// Every layer in manifest order.
    pub layers: Vec<LayerInfo>,
}

/// Inputs to [`inspect`].
pub struct InspectOptions {
    /// The artifact to inspect.
    pub target: Reference,
    /// When set, reads from this remote registry instead of the local
    /// store (`--output-remote`).
    pub remote: Option<RemoteOptions>,
}

/// Runs the inspect orchestrator.
pub async fn inspect(ctx: &OpContext, options: InspectOptions) -> ModctlResult<InspectReport> {
    let repo = options.target.repository_path().to_string();

    let (manifest, config_bytes, manifest_digest) = match &options.remote {
        Some(remote_options) => {
            let client = RemoteClient::new(&options.target, remote_options)?;
            let (oci_manifest, config_bytes) = client.pull_manifest_and_config(&options.target).await?;
            let manifest = crate::remote::manifest_from_oci(&oci_manifest)?;
            let digest = manifest.canonical_digest()?;
            (manifest, config_bytes, digest)
        }
        None => {
            let reference_str = store_reference(&options.target);
            let (manifest_bytes, digest) = ctx.store.pull_manifest(&repo, &reference_str, &ctx.cancel).await?;
            let manifest: Manifest = serde_json::from_slice(&manifest_bytes)?;
            let config_bytes = read_config_blob(ctx, &repo, &manifest).await?;
            (manifest, config_bytes, digest)
        }
    };

    let model_config = ModelConfig::from_json_bytes(&config_bytes)?;
    let digest_string = manifest_digest.to_string();

    let layers = manifest
        .layers
        .iter()
        .map(|l| LayerInfo {
            media_type: l.media_type.clone(),
            digest: l.digest.to_string(),
            size: l.size,
            filepath: l.filepath().map(|s| s.to_string()),
        })
        .collect();

    Ok(InspectReport {
        id: short_id(&digest_string),
        digest: digest_string,
        architecture: model_config.config.architecture,
        created_at: model_config.descriptor.created_at,
        family: model_config.descriptor.family,
        format: model_config.config.format,
        name: model_config.descriptor.name,
        param_size: model_config.config.param_size,
        precision: model_config.config.precision,
        quantization: model_config.config.quantization,
        layers,
    })
}

async fn read_config_blob(ctx: &OpContext, repo: &str, manifest: &Manifest) -> ModctlResult<Vec<u8>> {
    use tokio::io::AsyncReadExt;
    let mut stream = ctx.store.pull_blob(repo, &manifest.config.digest, &ctx.cancel).await?;
    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes).await?;
    Ok(bytes)
}

fn short_id(digest: &str) -> String {
    digest.rsplit(':').next().unwrap_or(digest).chars().take(12).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Descriptor, Digest, model_config::{ModelConfigBlock, ModelDescriptorBlock, ModelFs}, store::ContentStore};
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn inspects_a_local_artifact() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(ContentStore::open(dir.path()).await.unwrap());
        let cancel = CancellationToken::new();

        let layer_bytes = b"weights".to_vec();
        let layer = Descriptor::new("application/vnd.cnai.model.layer.v1.raw", Digest::sha256(&layer_bytes), layer_bytes.len() as u64)
            .with_annotation(modctl_utils::defaults::ANNOTATION_FILEPATH, "model.bin");
        store.push_blob("demo", Box::new(std::io::Cursor::new(layer_bytes)), &layer, &cancel).await.unwrap();

        let model_config = ModelConfig {
            descriptor: ModelDescriptorBlock {
                family: Some("demo-family".to_string()),
                name: Some("demo-model".to_string()),
                created_at: Some("2024-01-01T00:00:00Z".to_string()),
                ..Default::default()
            },
            config: ModelConfigBlock {
                architecture: Some("transformer".to_string()),
                param_size: Some("7B".to_string()),
                ..Default::default()
            },
            modelfs: ModelFs { diff_ids: vec![layer.digest.clone()] },
        };
        let config_bytes = model_config.to_json_bytes().unwrap();
        let config = Descriptor::new("application/vnd.cnai.model.config.v1+json", Digest::sha256(&config_bytes), config_bytes.len() as u64);
        store.push_blob("demo", Box::new(std::io::Cursor::new(config_bytes)), &config, &cancel).await.unwrap();

        let manifest = Manifest::new(config, vec![layer]);
        let manifest_bytes = serde_json::to_vec(&manifest).unwrap();
        store.push_manifest("demo", Some("v1"), &manifest_bytes, &cancel).await.unwrap();

        let ctx = OpContext::new(store);
        let report = inspect(&ctx, InspectOptions {
            target: Reference::parse("localhost/demo:v1").unwrap(),
            remote: None,
        })
        .await
        .unwrap();

        assert_eq!(report.family.as_deref(), Some("demo-family"));
        assert_eq!(report.param_size.as_deref(), Some("7B"));
        assert_eq!(report.layers.len(), 1);
        assert_eq!(report.layers[0].filepath.as_deref(), Some("model.bin"));
        assert_eq!(report.id.len(), 12);
    }
}
