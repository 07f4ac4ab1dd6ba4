//! Prune orchestrator: deletes every blob in every repository's
//! ledger that no surviving manifest reaches, unless another repository
//! still reaches the same digest.

use crate::{ModctlResult, ops::OpContext};

/// The result of a successful prune.
pub struct PruneOutcome {
    /// `repo@digest` for every blob actually deleted from disk.
    pub pruned: Vec<String>,
}

/// Runs the prune orchestrator across every repository in the
/// store.
pub async fn prune(ctx: &OpContext) -> ModctlResult<PruneOutcome> {
    let mut pruned = Vec::new();

    for repo in ctx.store.list_repositories().await? {
        for digest in ctx.store.prune_repo(&repo).await? {
            pruned.push(format!("{repo}@{digest}"));
        }
    }

    Ok(PruneOutcome { pruned })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Descriptor, Digest, Manifest, store::ContentStore};
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn prunes_unreferenced_blobs_across_repositories() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(ContentStore::open(dir.path()).await.unwrap());
        let cancel = CancellationToken::new();

        let orphan_bytes = b"orphaned-layer".to_vec();
        let orphan = Descriptor::new("application/vnd.cnai.model.layer.v1.raw", Digest::sha256(&orphan_bytes), orphan_bytes.len() as u64);
        store.push_blob("demo", Box::new(std::io::Cursor::new(orphan_bytes)), &orphan, &cancel).await.unwrap();

        let kept_bytes = b"kept-layer".to_vec();
        let kept = Descriptor::new("application/vnd.cnai.model.layer.v1.raw", Digest::sha256(&kept_bytes), kept_bytes.len() as u64);
        store.push_blob("demo", Box::new(std::io::Cursor::new(kept_bytes)), &kept, &cancel).await.unwrap();

        let config_bytes = b"{}".to_vec();
        let config = Descriptor::new("application/vnd.cnai.model.config.v1+json", Digest::sha256(&config_bytes), config_bytes.len() as u64);
        store.push_blob("demo", Box::new(std::io::Cursor::new(config_bytes)), &config, &cancel).await.unwrap();

        let manifest = Manifest::new(config, vec![kept.clone()]);
        let manifest_bytes = serde_json::to_vec(&manifest).unwrap();
        store.push_manifest("demo", Some("v1"), &manifest_bytes, &cancel).await.unwrap();

        let ctx = OpContext::new(store.clone());
        let outcome = prune(&ctx).await.unwrap();

        assert_eq!(outcome.pruned, vec![format!("demo@{}", orphan.digest)]);
        assert!(!store.stat_blob("demo", &orphan.digest).await.unwrap());
        assert!(store.stat_blob("demo", &kept.digest).await.unwrap());
    }

    #[tokio::test]
    async fn prunes_nothing_when_nothing_is_garbage() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(ContentStore::open(dir.path()).await.unwrap());
        let ctx = OpContext::new(store);

        let outcome = prune(&ctx).await.unwrap();
        assert!(outcome.pruned.is_empty());
    }
}
