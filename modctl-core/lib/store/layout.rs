//! On-disk layout for the local content store: a flat
//! `blobs/sha256/<hex>` tree per storage-dir, following the OCI Image
//! Layout convention, plus one `repos/<repo-path>/index.json` +
//! `repos/<repo-path>/tags.json` pair per repository for per-image
//! bookkeeping.

use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Descriptor, Digest};

const BLOBS_DIRNAME: &str = "blobs";
const REPOS_DIRNAME: &str = "repos";
const INDEX_FILENAME: &str = "index.json";
const TAGS_FILENAME: &str = "tags.json";
const BLOBS_LEDGER_FILENAME: &str = "blobs.json";

/// Path helpers rooted at one storage directory.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    /// Roots this layout at `root` (typically `--storage-dir`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        StoreLayout { root: root.into() }
    }

    /// The storage root.
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// `<root>/blobs`.
    pub fn blobs_dir(&self) -> PathBuf {
        self.root.join(BLOBS_DIRNAME)
    }

    /// `<root>/blobs/<algorithm>/<hex>`, this digest's final resting place.
    pub fn blob_path(&self, digest: &Digest) -> PathBuf {
        self.blobs_dir().join(digest.storage_path_segment())
    }

    /// `<root>/repos`.
    pub fn repos_dir(&self) -> PathBuf {
        self.root.join(REPOS_DIRNAME)
    }

    /// `<root>/repos/<repo-path>`. `repo` may itself contain `/`, which nests
    /// naturally under `repos_dir`.
    pub fn repo_dir(&self, repo: &str) -> PathBuf {
        self.repos_dir().join(repo)
    }

    /// `<root>/repos/<repo-path>/index.json`.
    pub fn index_path(&self, repo: &str) -> PathBuf {
        self.repo_dir(repo).join(INDEX_FILENAME)
    }

    /// `<root>/repos/<repo-path>/tags.json`.
    pub fn tags_path(&self, repo: &str) -> PathBuf {
        self.repo_dir(repo).join(TAGS_FILENAME)
    }

    /// `<root>/repos/<repo-path>/blobs.json`: the ledger of every digest ever
    /// written or mounted under this repository, independent of whether a
    /// surviving manifest still references it — `prune` needs this
    /// because the blob tree itself is flat and repo-agnostic, so it cannot
    /// answer "which blobs did this repo ever use" on its own.
    pub fn blobs_ledger_path(&self, repo: &str) -> PathBuf {
        self.repo_dir(repo).join(BLOBS_LEDGER_FILENAME)
    }

    /// A fresh temp-file path in the same directory as its eventual blob
    /// destination, so the final rename is same-filesystem and atomic.
    pub fn blob_temp_path(&self, suffix: &str) -> PathBuf {
        self.blobs_dir().join(format!(".tmp-{suffix}"))
    }
}

/// The per-repository index: every manifest ever pushed or pulled into this
/// repository, tagged or not. An entry's presence here — not its tag
/// binding — is what makes it "reachable" per the content-store
/// invariants; only digest-qualified `rm` removes an entry outright.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoIndex {
    /// Always 2, mirroring the OCI image index schema version.
    #[serde(rename = "schemaVersion", default = "default_schema_version")]
    pub schema_version: u32,

    /// Manifest descriptors known to this repository.
    #[serde(default)]
    pub manifests: Vec<Descriptor>,
}

fn default_schema_version() -> u32 {
    2
}

impl RepoIndex {
    /// Inserts `descriptor`, replacing any existing entry with the same
    /// digest (a manifest's own descriptor never changes once pushed, but
    /// this keeps insertion idempotent).
    pub fn upsert(&mut self, descriptor: Descriptor) {
        self.manifests.retain(|d| d.digest != descriptor.digest);
        self.manifests.push(descriptor);
    }

    /// Removes the entry with digest `digest`, if present. Returns whether
    /// an entry was removed.
    pub fn remove(&mut self, digest: &Digest) -> bool {
        let before = self.manifests.len();
        self.manifests.retain(|d| &d.digest != digest);
        self.manifests.len() != before
    }

    /// True if an entry with digest `digest` is present.
    pub fn contains(&self, digest: &Digest) -> bool {
        self.manifests.iter().any(|d| &d.digest == digest)
    }
}

/// The per-repository tag → manifest-digest map.
pub type TagMap = BTreeMap<String, Digest>;

/// The per-repository blob ledger: every digest this repo has ever written
/// or had mounted into it, kept as a set independent of current manifest
/// reachability (see [`StoreLayout::blobs_ledger_path`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlobLedger {
    /// Every digest ever associated with this repo, unordered on disk but
    /// sorted by callers that need determinism.
    #[serde(default)]
    pub digests: std::collections::BTreeSet<Digest>,
}

impl BlobLedger {
    /// Records `digest` as used by this repo. Idempotent.
    pub fn record(&mut self, digest: Digest) {
        self.digests.insert(digest);
    }

    /// Removes `digest` from the ledger (it was pruned or never reachable
    /// from this repo again). Returns whether it was present.
    pub fn forget(&mut self, digest: &Digest) -> bool {
        self.digests.remove(digest)
    }
}
