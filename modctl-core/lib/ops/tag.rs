//! Tag orchestrator: copies an artifact to a new repository/tag by
//! mounting its blobs rather than re-hashing them, then writes the source
//! manifest's exact bytes under the new tag so its digest never changes
//!.

use crate::{ModctlError, ModctlResult, ops::OpContext, reference::Reference};

/// Inputs to [`tag`].
pub struct TagOptions {
    /// The artifact being retagged.
    pub source: Reference,
    /// The repository/tag to write it under.
    pub target: Reference,
}

/// Runs the tag orchestrator. Both `source` and `target` must
/// resolve within the local store — mounting a blob is a local,
/// zero-copy bookkeeping operation with no remote equivalent.
pub async fn tag(ctx: &OpContext, options: TagOptions) -> ModctlResult<()> {
    let source_repo = options.source.repository_path().to_string();
    let target_repo = options.target.repository_path().to_string();
    let target_tag = options
        .target
        .tag()
        .ok_or_else(|| ModctlError::Parse("tag target must include a tag".to_string()))?;

    let source_reference = crate::ops::store_reference(&options.source);
    let (manifest_bytes, _digest) = ctx.store.pull_manifest(&source_repo, &source_reference, &ctx.cancel).await?;
    let manifest: crate::Manifest = serde_json::from_slice(&manifest_bytes)?;

    ctx.store.mount_blob(&source_repo, &target_repo, &manifest.config).await?;
    for layer in &manifest.layers {
        ctx.store.mount_blob(&source_repo, &target_repo, layer).await?;
    }

    ctx.store.push_manifest(&target_repo, Some(target_tag), &manifest_bytes, &ctx.cancel).await?;

    Ok(())
}
