//! Fetch orchestrator: selective pull. Fetches the manifest from a
//! remote without writing it, filters layers by glob patterns matched
//! against each layer's `filepath` annotation, and streams exactly the
//! matched layers to disk.

use std::{path::PathBuf, sync::Arc};

use crate::{
    Descriptor, ModctlError, ModctlResult,
    ops::{OpContext, glob, pull::stream_layers_to_dir},
    reference::Reference,
    remote::{RemoteClient, RemoteOptions},
};

/// Inputs to [`fetch`].
pub struct FetchOptions {
    /// The source artifact.
    pub target: Reference,
    /// Glob patterns matched against each layer's `filepath` annotation
    /// (`--patterns`); a layer with no `filepath` annotation never matches.
    pub patterns: Vec<String>,
    /// Destination directory (`--output`).
    pub output_dir: PathBuf,
    /// Transport options for the source registry.
    pub remote: RemoteOptions,
}

/// The result of a successful fetch.
pub struct FetchOutcome {
    /// Number of layers matched and streamed to disk.
    pub layers_fetched: usize,
}

/// Runs the fetch orchestrator. Fails with
/// [`ModctlError::NoLayersMatched`] if `options.patterns` selects zero
/// layers.
pub async fn fetch(ctx: &OpContext, options: FetchOptions) -> ModctlResult<FetchOutcome> {
    let client = Arc::new(RemoteClient::new(&options.target, &options.remote)?);
    let (oci_manifest, _config_bytes) = client.pull_manifest_and_config(&options.target).await?;
    let manifest = crate::remote::manifest_from_oci(&oci_manifest)?;

    let matched = select_matching_layers(&manifest.layers, &options.patterns);
    if matched.is_empty() {
        return Err(ModctlError::NoLayersMatched);
    }

    let layers_fetched = stream_layers_to_dir(ctx, client, &options.target, &matched, &options.output_dir, None).await?;

    Ok(FetchOutcome { layers_fetched })
}

/// Selects every layer in `layers` whose `filepath` annotation matches at
/// least one of `patterns`.
fn select_matching_layers(layers: &[Descriptor], patterns: &[String]) -> Vec<Descriptor> {
    let compiled: Vec<regex::Regex> = patterns.iter().map(|p| glob::compile(p)).collect();
    layers
        .iter()
        .filter(|layer| layer.filepath().is_some_and(|path| glob::matches_any(&compiled, path)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Digest;

    fn layer(filepath: &str) -> Descriptor {
        Descriptor::new("application/vnd.cnai.model.layer.v1.raw", Digest::sha256(filepath.as_bytes()), filepath.len() as u64)
            .with_annotation(modctl_utils::defaults::ANNOTATION_FILEPATH, filepath)
    }

    #[test]
    fn selects_layers_matching_any_pattern() {
        let layers = vec![layer("file1.txt"), layer("file2.txt"), layer("foo/bar.bin")];
        let matched = select_matching_layers(&layers, &["file*.txt".to_string()]);
        let paths: Vec<&str> = matched.iter().map(|d| d.filepath().unwrap()).collect();
        assert_eq!(paths, vec!["file1.txt", "file2.txt"]);
    }

    #[test]
    fn empty_match_yields_empty_selection() {
        let layers = vec![layer("file1.txt")];
        let matched = select_matching_layers(&layers, &["nonexistent.txt".to_string()]);
        assert!(matched.is_empty());
    }
}
