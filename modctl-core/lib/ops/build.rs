//! Build orchestrator: parse recipe, probe provenance, walk and
//! classify the workspace, then register the result locally or push it to a
//! remote registry.

use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use crate::{
    Digest, ModctlError, ModctlResult,
    builder::{BuildSink, Builder},
    model_config::{ModelCapabilities, ModelConfig, ModelConfigBlock, ModelDescriptorBlock, ModelFs},
    ops::{OpContext, modelfile, provenance},
    processor,
    reference::Reference,
    remote::{RemoteClient, RemoteOptions},
};

/// Inputs to [`build`], mirroring the `build` flag table.
pub struct BuildOptions {
    /// The workspace directory to walk.
    pub workspace: PathBuf,
    /// Path to the build recipe (`-f`).
    pub modelfile_path: PathBuf,
    /// Target reference (`-t`); must carry a tag.
    pub target: Reference,
    /// When set, the built artifact is pushed to this remote instead of
    /// registered in the local store (`--output-remote`).
    pub remote: Option<RemoteOptions>,
    /// Forces every layer through the raw codec (`--raw`).
    pub raw: bool,
    /// Sets `capabilities.reasoning` on the model config (`--reasoning`).
    pub reasoning: bool,
    /// Suppresses the `created` annotation and config timestamp
    /// (`--no-creation-time`).
    pub no_creation_time: bool,
    /// Overrides the probed provenance URL (`--source-url`).
    pub source_url: Option<String>,
    /// Overrides the probed provenance revision (`--source-revision`).
    pub source_revision: Option<String>,
}

/// The result of a successful build.
pub struct BuildOutcome {
    /// Digest of the produced manifest.
    pub manifest_digest: Digest,
    /// Number of layers produced from the workspace walk.
    pub layer_count: usize,
}

/// Runs the build orchestrator.
pub async fn build(ctx: &OpContext, options: BuildOptions) -> ModctlResult<BuildOutcome> {
    let tag = options
        .target
        .tag()
        .ok_or_else(|| ModctlError::Parse("build target must include a tag".to_string()))?
        .to_string();

    let modelfile = modelfile::load(&options.modelfile_path).await?;
    let provenance = provenance::probe(&options.workspace).await;

    let source_url = options.source_url.clone().or_else(|| provenance.as_ref().and_then(|p| p.url.clone()));
    let revision = options.source_revision.clone().or_else(|| provenance.as_ref().and_then(|p| p.revision()));

    let sink = match &options.remote {
        Some(remote_options) => {
            let client = Arc::new(RemoteClient::new(&options.target, remote_options)?);
            BuildSink::remote(client, options.target.clone())
        }
        None => BuildSink::local(ctx.store.clone(), options.target.repository_path().to_string()),
    };

    let builder = Arc::new(Builder::new(sink).with_progress(ctx.progress.clone()));

    let layers = processor::process_workspace(builder.clone(), options.workspace.clone(), ctx.concurrency, ctx.cancel.clone(), options.raw).await?;

    let layer_count = layers.len();
    let diff_ids: Vec<Digest> = layers.iter().map(|l| l.digest.clone()).collect();

    let model_config = ModelConfig {
        descriptor: ModelDescriptorBlock {
            family: modelfile.directives.family.clone(),
            name: modelfile.directives.name.clone(),
            created_at: (!options.no_creation_time).then(current_timestamp),
            source_url,
            revision,
        },
        config: ModelConfigBlock {
            architecture: modelfile.directives.architecture.clone(),
            format: modelfile.directives.format.clone(),
            precision: modelfile.directives.precision.clone(),
            quantization: modelfile.directives.quantization.clone(),
            param_size: modelfile.directives.param_size.clone(),
            capabilities: options.reasoning.then_some(ModelCapabilities { reasoning: true }),
        },
        modelfs: ModelFs { diff_ids },
    };

    let config_descriptor = builder.build_config(&model_config, &ctx.cancel).await?;

    let annotations = manifest_annotations(&model_config, &modelfile.raw, options.no_creation_time);

    let manifest_descriptor = builder.build_manifest(layers, config_descriptor, annotations, Some(&tag), &ctx.cancel).await?;

    Ok(BuildOutcome {
        manifest_digest: manifest_descriptor.digest,
        layer_count,
    })
}

/// Builds a manifest's top-level annotation map: `created` (unless
/// suppressed), every present `org.cnai.model.*` identity field, and the
/// verbatim `modelfile` bytes.
pub(crate) fn manifest_annotations(config: &ModelConfig, modelfile_raw: &str, no_creation_time: bool) -> BTreeMap<String, String> {
    let mut annotations = BTreeMap::new();

    if !no_creation_time {
        annotations.insert(modctl_utils::defaults::ANNOTATION_CREATED.to_string(), current_timestamp());
    }
    annotations.insert(modctl_utils::defaults::ANNOTATION_MODELFILE.to_string(), modelfile_raw.to_string());

    let prefix = modctl_utils::defaults::ANNOTATION_MODEL_PREFIX;
    let mut insert = |key: &str, value: &Option<String>| {
        if let Some(value) = value {
            annotations.insert(format!("{prefix}{key}"), value.clone());
        }
    };
    insert("family", &config.descriptor.family);
    insert("name", &config.descriptor.name);
    insert("architecture", &config.config.architecture);
    insert("format", &config.config.format);
    insert("precision", &config.config.precision);
    insert("quantization", &config.config.quantization);
    insert("paramSize", &config.config.param_size);

    annotations
}

pub(crate) fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ContentStore;
    use tempfile::TempDir;

    async fn context() -> (TempDir, OpContext) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ContentStore::open(dir.path()).await.unwrap());
        (dir, OpContext::new(store))
    }

    #[tokio::test]
    async fn builds_local_artifact_and_registers_tag() {
        let (_store_dir, ctx) = context().await;
        let workspace = TempDir::new().unwrap();
        tokio::fs::write(workspace.path().join("model.bin"), b"weights").await.unwrap();
        tokio::fs::write(workspace.path().join("config.json"), b"{}").await.unwrap();

        let modelfile_path = workspace.path().join("Modelfile");
        tokio::fs::write(&modelfile_path, "NAME demo\nFAMILY llama\n").await.unwrap();

        let options = BuildOptions {
            workspace: workspace.path().to_path_buf(),
            modelfile_path,
            target: Reference::parse("localhost/demo:v1").unwrap(),
            remote: None,
            raw: true,
            reasoning: false,
            no_creation_time: true,
            source_url: None,
            source_revision: None,
        };

        let outcome = build(&ctx, options).await.unwrap();
        assert_eq!(outcome.layer_count, 2);
        assert!(ctx.store.stat_manifest("demo", &outcome.manifest_digest).await.unwrap());
        assert_eq!(ctx.store.list_tags("demo").await.unwrap(), vec!["v1".to_string()]);
    }

    #[tokio::test]
    async fn rejects_target_without_a_tag() {
        let (_store_dir, ctx) = context().await;
        let workspace = TempDir::new().unwrap();
        let digest = "sha256:".to_string() + &"a".repeat(64);
        let options = BuildOptions {
            workspace: workspace.path().to_path_buf(),
            modelfile_path: workspace.path().join("Modelfile"),
            target: Reference::parse(&format!("localhost/demo@{digest}")).unwrap(),
            remote: None,
            raw: true,
            reasoning: false,
            no_creation_time: true,
            source_url: None,
            source_revision: None,
        };

        assert!(build(&ctx, options).await.is_err());
    }
}
