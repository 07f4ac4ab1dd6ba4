//! Remove orchestrator: untags a manifest, or deletes it outright
//! (and every tag pointing at it) when the reference carries a digest.
//! Blob content is never touched here — that is `prune`'s job.

use crate::{ModctlError, ModctlResult, ops::OpContext, reference::Reference};

/// Inputs to [`rm`].
pub struct RmOptions {
    /// The artifact to remove.
    pub target: Reference,
}

/// Runs the remove orchestrator.
pub async fn rm(ctx: &OpContext, options: RmOptions) -> ModctlResult<()> {
    let repo = options.target.repository_path().to_string();

    let reference_str = match options.target.digest() {
        Some(digest) => digest.to_string(),
        None => options
            .target
            .tag()
            .map(|tag| tag.to_string())
            .ok_or_else(|| ModctlError::Parse("rm target must include a tag or a digest".to_string()))?,
    };

    ctx.store.delete_manifest(&repo, &reference_str).await
}
