//! List orchestrator: enumerates every `{repo, tag}` pair in the
//! local store with its total size and creation time, newest first.

use crate::{Manifest, ModctlResult, ops::OpContext};

/// One `{repo, tag}` entry produced by [`list`].
pub struct ListItem {
    /// The repository path.
    pub repo: String,
    /// The tag bound to `digest`.
    pub tag: String,
    /// The manifest's content digest.
    pub digest: String,
    /// The manifest's `created` annotation, if one was stamped at build
    /// time; artifacts tagged/pulled without it sort last.
    pub created_at: Option<String>,
    /// Manifest bytes + config size + the sum of every layer's size.
    pub size: u64,
}

/// Runs the list orchestrator, sorted by `createdAt` descending.
pub async fn list(ctx: &OpContext) -> ModctlResult<Vec<ListItem>> {
    let mut items = Vec::new();

    for repo in ctx.store.list_repositories().await? {
        for tag in ctx.store.list_tags(&repo).await? {
            let (manifest_bytes, digest) = ctx.store.pull_manifest(&repo, &tag, &ctx.cancel).await?;
            let manifest: Manifest = serde_json::from_slice(&manifest_bytes)?;

            let size = manifest_bytes.len() as u64 + manifest.config.size + manifest.layers.iter().map(|l| l.size).sum::<u64>();
            let created_at = manifest.annotations.get(modctl_utils::defaults::ANNOTATION_CREATED).cloned();

            items.push(ListItem {
                repo: repo.clone(),
                tag,
                digest: digest.to_string(),
                created_at,
                size,
            });
        }
    }

    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Descriptor, Digest, store::ContentStore};
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    async fn push_tagged(store: &ContentStore, repo: &str, tag: &str, created_at: &str, layer_size: u64) {
        let cancel = CancellationToken::new();
        let layer_bytes = vec![0u8; layer_size as usize];
        let layer = Descriptor::new("application/vnd.cnai.model.layer.v1.raw", Digest::sha256(&layer_bytes), layer_bytes.len() as u64);
        store.push_blob(repo, Box::new(std::io::Cursor::new(layer_bytes)), &layer, &cancel).await.unwrap();

        let config_bytes = b"{}".to_vec();
        let config = Descriptor::new("application/vnd.cnai.model.config.v1+json", Digest::sha256(&config_bytes), config_bytes.len() as u64);
        store.push_blob(repo, Box::new(std::io::Cursor::new(config_bytes)), &config, &cancel).await.unwrap();

        let manifest = Manifest::new(config, vec![layer]).with_annotation(modctl_utils::defaults::ANNOTATION_CREATED, created_at);
        let manifest_bytes = serde_json::to_vec(&manifest).unwrap();
        store.push_manifest(repo, Some(tag), &manifest_bytes, &cancel).await.unwrap();
    }

    #[tokio::test]
    async fn lists_every_tag_sorted_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(ContentStore::open(dir.path()).await.unwrap());

        push_tagged(&store, "demo", "v1", "2024-01-01T00:00:00Z", 10).await;
        push_tagged(&store, "demo", "v2", "2024-06-01T00:00:00Z", 20).await;

        let ctx = OpContext::new(store);
        let items = list(&ctx).await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].tag, "v2");
        assert_eq!(items[1].tag, "v1");
        assert!(items[0].size > 20);
    }

    #[tokio::test]
    async fn empty_store_lists_nothing() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(ContentStore::open(dir.path()).await.unwrap());
        let ctx = OpContext::new(store);
        assert!(list(&ctx).await.unwrap().is_empty());
    }
}
