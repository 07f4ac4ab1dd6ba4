//! Local content-addressed blob/manifest store: digest-keyed blobs, a
//! repository index, a tag map, blob-stat, and cross-repo mount.
//!
//! The content store exclusively owns all bytes on disk.
//! Every write verifies the streamed content's hash against the caller's
//! declared digest before committing, via a
//! hash-while-writing temp file that is renamed into place only on a match
//! and removed otherwise — grounded on `other_examples`'s `ocidir-rs`
//! `BlobWriter` (hash-as-you-write, rename-on-complete), adapted to async
//! I/O and to `push_manifest`'s "digest is derived from content, never
//! mismatched" case.

pub mod layout;

use std::{path::Path, sync::Arc};

use rand::Rng;
use sha2::{Digest as _, Sha256};
use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncReadExt, AsyncWriteExt},
};
use tokio_util::sync::CancellationToken;

use crate::{
    Descriptor, Digest, Manifest, ModctlError, ModctlResult,
    codec::ByteStream,
    store::layout::{BlobLedger, RepoIndex, StoreLayout, TagMap},
};

/// The local content-addressed store, rooted at one storage directory.
pub struct ContentStore {
    layout: StoreLayout,
    /// Serializes read-modify-write cycles on index/tag/ledger JSON files, so
    /// concurrent writers (a build's bounded layer workers all touch the
    /// same repo's blob ledger) can't race and drop each other's updates.
    /// Blob content itself needs no such lock: writes are keyed by digest and
    /// first-writer-wins.
    bookkeeping_lock: tokio::sync::Mutex<()>,
}

impl ContentStore {
    /// Opens (creating if necessary) a content store rooted at `storage_dir`.
    pub async fn open(storage_dir: impl Into<std::path::PathBuf>) -> ModctlResult<Self> {
        let layout = StoreLayout::new(storage_dir);
        fs::create_dir_all(layout.blobs_dir()).await?;
        fs::create_dir_all(layout.repos_dir()).await?;
        Ok(ContentStore {
            layout,
            bookkeeping_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// The path layout this store is rooted at.
    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    //----------------------------------------------------------------------
    // Manifests
    //----------------------------------------------------------------------

    /// Reads the manifest bound to `reference` (a tag or a digest string),
    /// returning its canonical bytes and content digest.
    pub async fn pull_manifest(
        &self,
        repo: &str,
        reference: &str,
        cancel: &CancellationToken,
    ) -> ModctlResult<(Vec<u8>, Digest)> {
        check_cancel(cancel)?;

        let digest = self.resolve_manifest_digest(repo, reference).await?;
        let bytes = self.read_blob_bytes(&digest, cancel).await?;
        Ok((bytes, digest))
    }

    /// Resolves `reference` (tag or `sha256:...` digest string) to a
    /// manifest digest known to `repo`.
    pub async fn resolve_manifest_digest(&self, repo: &str, reference: &str) -> ModctlResult<Digest> {
        if let Ok(digest) = reference.parse::<Digest>() {
            let index = self.read_index(repo).await?;
            if index.contains(&digest) {
                return Ok(digest);
            }
            return Err(ModctlError::manifest_not_found(repo, reference));
        }

        let tags = self.read_tags(repo).await?;
        tags.get(reference)
            .cloned()
            .ok_or_else(|| ModctlError::manifest_not_found(repo, reference))
    }

    /// Stores `bytes` (expected to be a manifest's canonical JSON) under its
    /// own content digest, registers it in `repo`'s index, and — if `tag` is
    /// non-empty — replaces `repo`'s tag binding atomically.
    pub async fn push_manifest(
        &self,
        repo: &str,
        tag: Option<&str>,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> ModctlResult<Digest> {
        check_cancel(cancel)?;

        let digest = Digest::sha256(bytes);
        self.write_blob_verified(bytes, &digest, cancel).await?;

        fs::create_dir_all(self.layout.repo_dir(repo)).await?;

        let _guard = self.bookkeeping_lock.lock().await;
        let mut index = self.read_index(repo).await?;
        index.upsert(manifest_descriptor(&digest, bytes.len() as u64));
        self.write_index(repo, &index).await?;

        if let Some(tag) = tag {
            let mut tags = self.read_tags(repo).await?;
            tags.insert(tag.to_string(), digest.clone());
            self.write_tags(repo, &tags).await?;
        }
        drop(_guard);

        Ok(digest)
    }

    //----------------------------------------------------------------------
    // Blobs
    //----------------------------------------------------------------------

    /// Opens a read stream over blob `digest`. `repo` is accepted for API
    /// symmetry with the remote client; blobs live in one global,
    /// repo-agnostic tree (see [`Self::mount_blob`]).
    pub async fn pull_blob(&self, repo: &str, digest: &Digest, cancel: &CancellationToken) -> ModctlResult<ByteStream> {
        let _ = repo;
        check_cancel(cancel)?;

        let path = self.layout.blob_path(digest);
        let file = File::open(&path)
            .await
            .map_err(|_| ModctlError::blob_not_found(repo, digest))?;
        Ok(Box::new(file))
    }

    /// Writes `stream` through a hashing tee, verifying the computed digest
    /// against `descriptor.digest` before committing. Partial writes are
    /// removed on any failure, including a digest mismatch.
    pub async fn push_blob(
        &self,
        repo: &str,
        stream: ByteStream,
        descriptor: &Descriptor,
        cancel: &CancellationToken,
    ) -> ModctlResult<(Digest, u64)> {
        check_cancel(cancel)?;

        let (computed, size, temp_path) = self.stream_to_temp_file(stream, cancel).await?;

        if computed != descriptor.digest {
            let _ = fs::remove_file(&temp_path).await;
            return Err(ModctlError::DigestMismatch {
                expected: descriptor.digest.clone(),
                computed,
            });
        }

        self.commit_temp_file(&temp_path, &computed).await?;
        if !repo.is_empty() {
            self.record_blob_usage(repo, &computed).await?;
        }

        Ok((computed, size))
    }

    /// Writes `stream` through the same hashing tee as [`Self::push_blob`],
    /// but with no expected digest to verify against: for a caller whose
    /// content's digest is only known once the stream has been fully
    /// consumed, such as an encoder assembling a layer straight from its
    /// codec rather than from an already-hashed buffer. Returns the digest
    /// computed along the way, so the caller can build a descriptor from it.
    pub async fn push_blob_streamed(&self, repo: &str, stream: ByteStream, cancel: &CancellationToken) -> ModctlResult<(Digest, u64)> {
        check_cancel(cancel)?;

        let (computed, size, temp_path) = self.stream_to_temp_file(stream, cancel).await?;
        self.commit_temp_file(&temp_path, &computed).await?;
        if !repo.is_empty() {
            self.record_blob_usage(repo, &computed).await?;
        }

        Ok((computed, size))
    }

    /// Streams `stream` into a fresh temp file under the blob tree in 64 KB
    /// chunks while hashing it, returning the computed digest, byte count,
    /// and the temp file's path for the caller to verify and/or commit.
    async fn stream_to_temp_file(&self, mut stream: ByteStream, cancel: &CancellationToken) -> ModctlResult<(Digest, u64, std::path::PathBuf)> {
        let temp_path = self.layout.blob_temp_path(&temp_suffix());
        fs::create_dir_all(self.layout.blobs_dir()).await?;

        let mut temp_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)
            .await?;

        let mut hasher = Sha256::new();
        let mut size = 0u64;
        let mut buf = vec![0u8; 64 * 1024];

        loop {
            if cancel.is_cancelled() {
                let _ = fs::remove_file(&temp_path).await;
                return Err(ModctlError::Canceled);
            }

            let read = stream.read(&mut buf).await?;
            if read == 0 {
                break;
            }
            hasher.update(&buf[..read]);
            temp_file.write_all(&buf[..read]).await?;
            size += read as u64;
        }
        temp_file.flush().await?;
        drop(temp_file);

        Ok((Digest::sha256_from_hasher(hasher), size, temp_path))
    }

    /// Renames a temp file written by [`Self::stream_to_temp_file`] into its
    /// final content-addressed location. A file already there under the
    /// same digest wins (first writer wins) and the temp file is discarded.
    async fn commit_temp_file(&self, temp_path: &Path, digest: &Digest) -> ModctlResult<()> {
        let final_path = self.layout.blob_path(digest);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if fs::metadata(&final_path).await.is_ok() {
            let _ = fs::remove_file(temp_path).await;
        } else {
            fs::rename(temp_path, &final_path).await?;
        }

        Ok(())
    }

    /// Records `digest` in `repo`'s blob ledger.
    async fn record_blob_usage(&self, repo: &str, digest: &Digest) -> ModctlResult<()> {
        let _guard = self.bookkeeping_lock.lock().await;
        let mut ledger = self.read_blob_ledger(repo).await?;
        if ledger.digests.contains(digest) {
            return Ok(());
        }
        ledger.record(digest.clone());
        self.write_blob_ledger(repo, &ledger).await
    }

    async fn read_blob_ledger(&self, repo: &str) -> ModctlResult<BlobLedger> {
        let path = self.layout.blobs_ledger_path(repo);
        match fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BlobLedger::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_blob_ledger(&self, repo: &str, ledger: &BlobLedger) -> ModctlResult<()> {
        fs::create_dir_all(self.layout.repo_dir(repo)).await?;
        let bytes = serde_json::to_vec_pretty(ledger)?;
        atomic_write(&self.layout.blobs_ledger_path(repo), &bytes).await
    }

    /// Writes pre-materialized `bytes` (manifests, configs) directly,
    /// verifying against `expected`.
    async fn write_blob_verified(&self, bytes: &[u8], expected: &Digest, cancel: &CancellationToken) -> ModctlResult<()> {
        let descriptor = Descriptor::new("application/octet-stream", expected.clone(), bytes.len() as u64);
        let stream: ByteStream = Box::new(std::io::Cursor::new(bytes.to_vec()));
        self.push_blob("", stream, &descriptor, cancel).await?;
        Ok(())
    }

    async fn read_blob_bytes(&self, digest: &Digest, cancel: &CancellationToken) -> ModctlResult<Vec<u8>> {
        check_cancel(cancel)?;
        let path = self.layout.blob_path(digest);
        fs::read(&path).await.map_err(|_| ModctlError::NotFound(format!("blob {digest}")))
    }

    /// Checks whether `repo`'s index already carries `digest` as a manifest.
    pub async fn stat_manifest(&self, repo: &str, digest: &Digest) -> ModctlResult<bool> {
        let index = self.read_index(repo).await?;
        Ok(index.contains(digest))
    }

    /// Checks whether blob `digest` exists in the (global) blob tree.
    pub async fn stat_blob(&self, _repo: &str, digest: &Digest) -> ModctlResult<bool> {
        Ok(fs::metadata(self.layout.blob_path(digest)).await.is_ok())
    }

    /// Registers a blob already present under `from_repo` as reachable from
    /// `to_repo`, without copying bytes.
    ///
    /// The blob tree is repo-agnostic by construction (every blob lives at
    /// `blobs/<algorithm>/<hex>` regardless of which repository wrote it),
    /// so there is nothing to physically move; mounting reduces to
    /// asserting the blob is actually present and recording it in
    /// `to_repo`'s blob ledger, so a later `prune` of `to_repo` knows this
    /// digest is (now) one of its own rather than garbage.
    pub async fn mount_blob(&self, from_repo: &str, to_repo: &str, descriptor: &Descriptor) -> ModctlResult<()> {
        if !self.stat_blob(from_repo, &descriptor.digest).await? {
            return Err(ModctlError::blob_not_found(from_repo, &descriptor.digest));
        }
        self.record_blob_usage(to_repo, &descriptor.digest).await
    }

    //----------------------------------------------------------------------
    // Listing
    //----------------------------------------------------------------------

    /// Lists every repository with at least one index file, sorted.
    pub async fn list_repositories(&self) -> ModctlResult<Vec<String>> {
        let repos_dir = self.layout.repos_dir();
        if fs::metadata(&repos_dir).await.is_err() {
            return Ok(Vec::new());
        }

        let mut repos = Vec::new();
        for entry in walkdir::WalkDir::new(&repos_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() == "index.json")
        {
            let repo_dir = entry.path().parent().unwrap_or(entry.path());
            if let Ok(relative) = repo_dir.strip_prefix(&repos_dir) {
                let repo = relative.to_string_lossy().replace('\\', "/");
                if !repo.is_empty() {
                    repos.push(repo);
                }
            }
        }

        repos.sort();
        repos.dedup();
        Ok(repos)
    }

    /// Lists `repo`'s tags, sorted.
    pub async fn list_tags(&self, repo: &str) -> ModctlResult<Vec<String>> {
        let tags = self.read_tags(repo).await?;
        Ok(tags.into_keys().collect())
    }

    /// Lists every blob digest `repo` has ever written or had mounted into
    /// it (its blob ledger), regardless of whether a surviving manifest
    /// still reaches it — the set `prune` diffs against [`Self::reachable_blobs`]
    /// to find garbage.
    pub async fn list_blobs(&self, repo: &str) -> ModctlResult<Vec<Digest>> {
        let ledger = self.read_blob_ledger(repo).await?;
        Ok(ledger.digests.into_iter().collect())
    }

    /// Returns `repo`'s index document.
    pub async fn get_index(&self, repo: &str) -> ModctlResult<RepoIndex> {
        self.read_index(repo).await
    }

    //----------------------------------------------------------------------
    // Removal
    //----------------------------------------------------------------------

    /// Deletes a manifest by tag (untags only — the entry stays indexed and
    /// reachable, matching Docker-style "dangling" semantics) or by digest
    /// (removes the index entry outright and every tag pointing at it).
    /// Never deletes blobs — that's `prune`'s job.
    pub async fn delete_manifest(&self, repo: &str, reference: &str) -> ModctlResult<()> {
        if let Ok(digest) = reference.parse::<Digest>() {
            let mut index = self.read_index(repo).await?;
            if !index.remove(&digest) {
                return Err(ModctlError::manifest_not_found(repo, reference));
            }
            self.write_index(repo, &index).await?;

            let mut tags = self.read_tags(repo).await?;
            let before = tags.len();
            tags.retain(|_, d| d != &digest);
            if tags.len() != before {
                self.write_tags(repo, &tags).await?;
            }
            return Ok(());
        }

        let mut tags = self.read_tags(repo).await?;
        if tags.remove(reference).is_none() {
            return Err(ModctlError::manifest_not_found(repo, reference));
        }
        self.write_tags(repo, &tags).await
    }

    /// Optionally deletes a repository's bookkeeping files (index, tags,
    /// blob ledger) entirely, used by `rm` variants that drop a repository
    /// outright rather than just a tag or manifest. Never touches blob
    /// content — `prune_repo` owns blob deletion.
    pub async fn cleanup_repo(&self, repo: &str, remove_repo: bool) -> ModctlResult<()> {
        if remove_repo {
            let repo_dir = self.layout.repo_dir(repo);
            if fs::metadata(&repo_dir).await.is_ok() {
                fs::remove_dir_all(&repo_dir).await?;
            }
        }
        Ok(())
    }

    /// Prunes `repo`: diffs its blob ledger ([`Self::list_blobs`], every
    /// digest it has ever used) against what its surviving manifests
    /// currently reach ([`Self::reachable_blobs`]), and deletes the
    /// difference — unless another repository still reaches the same
    /// digest, since the blob tree is shared.
    /// Returns the digests actually deleted from disk.
    pub async fn prune_repo(&self, repo: &str) -> ModctlResult<Vec<Digest>> {
        let _guard = self.bookkeeping_lock.lock().await;

        let mut ledger = self.read_blob_ledger(repo).await?;
        let reachable_here = self.reachable_blobs(repo).await?;
        let candidates: Vec<Digest> = ledger.digests.iter().filter(|d| !reachable_here.contains(*d)).cloned().collect();

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut referenced_elsewhere = std::collections::HashSet::new();
        for other in self.list_repositories().await? {
            if other == repo {
                continue;
            }
            referenced_elsewhere.extend(self.reachable_blobs(&other).await?);
        }

        let mut deleted = Vec::new();
        for digest in candidates {
            ledger.forget(&digest);
            if referenced_elsewhere.contains(&digest) {
                continue;
            }
            if fs::remove_file(self.layout.blob_path(&digest)).await.is_ok() {
                deleted.push(digest);
            }
        }

        self.write_blob_ledger(repo, &ledger).await?;
        Ok(deleted)
    }

    /// Collects the set of blobs reachable from `repo`'s index: every
    /// manifest entry's config descriptor and layer descriptors — the set
    /// `prune` diffs against `list_blobs` to find garbage.
    pub async fn reachable_blobs(&self, repo: &str) -> ModctlResult<std::collections::HashSet<Digest>> {
        let index = self.read_index(repo).await?;
        let mut reachable = std::collections::HashSet::new();

        for descriptor in &index.manifests {
            reachable.insert(descriptor.digest.clone());
            let Ok(bytes) = fs::read(self.layout.blob_path(&descriptor.digest)).await else {
                continue;
            };
            let Ok(manifest) = serde_json::from_slice::<Manifest>(&bytes) else {
                continue;
            };
            reachable.insert(manifest.config.digest.clone());
            for layer in &manifest.layers {
                reachable.insert(layer.digest.clone());
            }
        }

        Ok(reachable)
    }

    //----------------------------------------------------------------------
    // Index/tag file I/O
    //----------------------------------------------------------------------

    async fn read_index(&self, repo: &str) -> ModctlResult<RepoIndex> {
        let path = self.layout.index_path(repo);
        match fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RepoIndex::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_index(&self, repo: &str, index: &RepoIndex) -> ModctlResult<()> {
        fs::create_dir_all(self.layout.repo_dir(repo)).await?;
        let bytes = serde_json::to_vec_pretty(index)?;
        atomic_write(&self.layout.index_path(repo), &bytes).await
    }

    async fn read_tags(&self, repo: &str) -> ModctlResult<TagMap> {
        let path = self.layout.tags_path(repo);
        match fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TagMap::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_tags(&self, repo: &str, tags: &TagMap) -> ModctlResult<()> {
        fs::create_dir_all(self.layout.repo_dir(repo)).await?;
        let bytes = serde_json::to_vec_pretty(tags)?;
        atomic_write(&self.layout.tags_path(repo), &bytes).await
    }
}

/// A shared, cloneable handle to one content store, used by orchestrators
/// that pass it across concurrent tasks.
pub type SharedContentStore = Arc<ContentStore>;

fn manifest_descriptor(digest: &Digest, size: u64) -> Descriptor {
    Descriptor::new(crate::manifest::MANIFEST_MEDIA_TYPE, digest.clone(), size)
}

fn temp_suffix() -> String {
    let mut rng = rand::rng();
    let n: u64 = rng.random();
    format!("{n:016x}")
}

/// Writes `bytes` to `path` atomically: write-then-rename within the same
/// directory, so a crash between the two never leaves a half-written file at
/// the final name (a stale rename source is just an orphaned temp file,
/// invisible to readers).
async fn atomic_write(path: &Path, bytes: &[u8]) -> ModctlResult<()> {
    let parent = path.parent().ok_or_else(|| ModctlError::Storage(std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        "path has no parent directory",
    )))?;
    let temp_path = parent.join(format!(".tmp-{}", temp_suffix()));
    fs::write(&temp_path, bytes).await?;
    fs::rename(&temp_path, path).await?;
    Ok(())
}

fn check_cancel(cancel: &CancellationToken) -> ModctlResult<()> {
    if cancel.is_cancelled() {
        Err(ModctlError::Canceled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store() -> (TempDir, ContentStore) {
        let dir = TempDir::new().unwrap();
        let store = ContentStore::open(dir.path()).await.unwrap();
        (dir, store)
    }

    fn cancel() -> CancellationToken {
        CancellationToken::new()
    }

    #[tokio::test]
    async fn push_then_pull_blob_round_trips() {
        let (_dir, store) = store().await;
        let bytes = b"some weights".to_vec();
        let digest = Digest::sha256(&bytes);
        let descriptor = Descriptor::new("application/octet-stream", digest.clone(), bytes.len() as u64);

        let (written_digest, size) = store
            .push_blob("demo", Box::new(std::io::Cursor::new(bytes.clone())), &descriptor, &cancel())
            .await
            .unwrap();
        assert_eq!(written_digest, digest);
        assert_eq!(size, bytes.len() as u64);

        let mut stream = store.pull_blob("demo", &digest, &cancel()).await.unwrap();
        let mut read_back = Vec::new();
        stream.read_to_end(&mut read_back).await.unwrap();
        assert_eq!(read_back, bytes);
    }

    #[tokio::test]
    async fn push_blob_rejects_digest_mismatch_and_leaves_no_blob() {
        let (_dir, store) = store().await;
        let bytes = b"real content".to_vec();
        let wrong_digest = Digest::sha256(b"different content");
        let descriptor = Descriptor::new("application/octet-stream", wrong_digest.clone(), bytes.len() as u64);

        let result = store
            .push_blob("demo", Box::new(std::io::Cursor::new(bytes)), &descriptor, &cancel())
            .await;

        assert!(matches!(result, Err(ModctlError::DigestMismatch { .. })));
        assert!(!store.stat_blob("demo", &wrong_digest).await.unwrap());
    }

    #[tokio::test]
    async fn push_manifest_registers_index_and_tag() {
        let (_dir, store) = store().await;
        let bytes = br#"{"schemaVersion":2}"#.to_vec();

        let digest = store.push_manifest("demo", Some("v1"), &bytes, &cancel()).await.unwrap();

        assert!(store.stat_manifest("demo", &digest).await.unwrap());
        assert_eq!(store.list_tags("demo").await.unwrap(), vec!["v1".to_string()]);

        let (pulled_bytes, pulled_digest) = store.pull_manifest("demo", "v1", &cancel()).await.unwrap();
        assert_eq!(pulled_bytes, bytes);
        assert_eq!(pulled_digest, digest);
    }

    #[tokio::test]
    async fn delete_manifest_by_tag_keeps_index_entry() {
        let (_dir, store) = store().await;
        let bytes = br#"{"schemaVersion":2}"#.to_vec();
        let digest = store.push_manifest("demo", Some("v1"), &bytes, &cancel()).await.unwrap();

        store.delete_manifest("demo", "v1").await.unwrap();

        assert!(store.list_tags("demo").await.unwrap().is_empty());
        assert!(store.stat_manifest("demo", &digest).await.unwrap());
    }

    #[tokio::test]
    async fn delete_manifest_by_digest_removes_index_entry_and_tags() {
        let (_dir, store) = store().await;
        let bytes = br#"{"schemaVersion":2}"#.to_vec();
        let digest = store.push_manifest("demo", Some("v1"), &bytes, &cancel()).await.unwrap();

        store.delete_manifest("demo", &digest.to_string()).await.unwrap();

        assert!(store.list_tags("demo").await.unwrap().is_empty());
        assert!(!store.stat_manifest("demo", &digest).await.unwrap());
    }

    #[tokio::test]
    async fn mount_blob_succeeds_when_blob_present() {
        let (_dir, store) = store().await;
        let bytes = b"shared layer".to_vec();
        let digest = Digest::sha256(&bytes);
        let descriptor = Descriptor::new("application/octet-stream", digest.clone(), bytes.len() as u64);
        store
            .push_blob("a", Box::new(std::io::Cursor::new(bytes)), &descriptor, &cancel())
            .await
            .unwrap();

        store.mount_blob("a", "b", &descriptor).await.unwrap();
        assert!(store.list_blobs("b").await.unwrap().contains(&digest));
    }

    #[tokio::test]
    async fn mount_blob_fails_when_blob_missing() {
        let (_dir, store) = store().await;
        let descriptor = Descriptor::new("application/octet-stream", Digest::sha256(b"missing"), 1);
        assert!(store.mount_blob("a", "b", &descriptor).await.is_err());
    }

    #[tokio::test]
    async fn prune_repo_deletes_unreferenced_blob_but_keeps_shared_one() {
        let (_dir, store) = store().await;
        let cancel = cancel();

        let shared_bytes = b"shared".to_vec();
        let shared_digest = Digest::sha256(&shared_bytes);
        let shared_descriptor = Descriptor::new("application/octet-stream", shared_digest.clone(), shared_bytes.len() as u64);

        let private_bytes = b"private-to-m1".to_vec();
        let private_digest = Digest::sha256(&private_bytes);
        let private_descriptor = Descriptor::new("application/octet-stream", private_digest.clone(), private_bytes.len() as u64);

        store
            .push_blob("demo", Box::new(std::io::Cursor::new(shared_bytes)), &shared_descriptor, &cancel)
            .await
            .unwrap();
        store
            .push_blob("demo", Box::new(std::io::Cursor::new(private_bytes)), &private_descriptor, &cancel)
            .await
            .unwrap();

        let config_bytes = b"{}".to_vec();
        let config_digest = Digest::sha256(&config_bytes);
        let config_descriptor = Descriptor::new("application/vnd.cnai.model.config.v1+json", config_digest, config_bytes.len() as u64);
        store
            .push_blob("demo", Box::new(std::io::Cursor::new(config_bytes)), &config_descriptor, &cancel)
            .await
            .unwrap();

        let m1 = Manifest::new(config_descriptor.clone(), vec![shared_descriptor.clone(), private_descriptor.clone()]);
        let m1_bytes = serde_json::to_vec(&m1).unwrap();
        let m1_digest = store.push_manifest("demo", Some("m1"), &m1_bytes, &cancel).await.unwrap();

        let m2 = Manifest::new(config_descriptor, vec![shared_descriptor]);
        let m2_bytes = serde_json::to_vec(&m2).unwrap();
        store.push_manifest("demo", Some("m2"), &m2_bytes, &cancel).await.unwrap();

        store.delete_manifest("demo", &m1_digest.to_string()).await.unwrap();

        let pruned = store.prune_repo("demo").await.unwrap();
        assert_eq!(pruned, vec![private_digest.clone()]);
        assert!(!store.stat_blob("demo", &private_digest).await.unwrap());
        assert!(store.stat_blob("demo", &shared_digest).await.unwrap());
    }

    #[tokio::test]
    async fn list_repositories_finds_nested_repo_paths() {
        let (_dir, store) = store().await;
        let bytes = br#"{"schemaVersion":2}"#.to_vec();
        store.push_manifest("org/team/model", Some("v1"), &bytes, &cancel()).await.unwrap();

        let repos = store.list_repositories().await.unwrap();
        assert_eq!(repos, vec!["org/team/model".to_string()]);
    }
}
