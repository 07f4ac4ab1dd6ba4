//! Workspace provenance probing: `.git`/`.zeta` metadata extraction for the
//! `build` orchestrator's `revision` annotation.
//!
//! Shells out to `git` for HEAD's commit and working-tree cleanliness
//! rather than linking `git2`, matching how other external tools are
//! invoked elsewhere in this crate. A workspace with neither `.git` nor
//! `.zeta` simply yields no provenance, which `build` treats as an absent
//! `revision` field rather than an error.

use std::path::Path;

use tokio::process::Command;

/// Provenance extracted from a workspace's version control metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    /// The remote `origin` URL, if one is configured.
    pub url: Option<String>,
    /// The current commit hash, if resolvable.
    pub commit: Option<String>,
    /// Whether the working tree has uncommitted changes.
    pub dirty: bool,
}

impl Provenance {
    /// Formats `{commit}[-dirty]`: `-dirty` is appended when the working
    /// tree has uncommitted changes. `None` if no commit was resolved.
    pub fn revision(&self) -> Option<String> {
        let commit = self.commit.as_ref()?;
        Some(if self.dirty { format!("{commit}-dirty") } else { commit.clone() })
    }
}

/// Probes `workspace` for `.git` or `.zeta` metadata, preferring `.git`.
/// Returns `None` if neither is present or readable.
pub async fn probe(workspace: &Path) -> Option<Provenance> {
    if tokio::fs::metadata(workspace.join(".git")).await.is_ok() {
        return Some(probe_git(workspace).await);
    }
    if tokio::fs::metadata(workspace.join(".zeta")).await.is_ok() {
        return Some(probe_zeta(workspace).await);
    }
    None
}

async fn probe_git(workspace: &Path) -> Provenance {
    let commit = resolve_git_head(workspace).await;
    let url = read_git_origin_url(workspace).await;
    let dirty = git_status_is_dirty(workspace).await;
    Provenance { url, commit, dirty }
}

async fn resolve_git_head(workspace: &Path) -> Option<String> {
    let head = tokio::fs::read_to_string(workspace.join(".git/HEAD")).await.ok()?;
    let head = head.trim();

    let Some(ref_path) = head.strip_prefix("ref: ") else {
        return is_hex_commit(head).then(|| head.to_string());
    };

    if let Ok(contents) = tokio::fs::read_to_string(workspace.join(".git").join(ref_path)).await {
        let hash = contents.trim();
        if is_hex_commit(hash) {
            return Some(hash.to_string());
        }
    }

    let packed = tokio::fs::read_to_string(workspace.join(".git/packed-refs")).await.ok()?;
    packed
        .lines()
        .find(|line| line.ends_with(ref_path))
        .and_then(|line| line.split_whitespace().next())
        .filter(|hash| is_hex_commit(hash))
        .map(str::to_string)
}

async fn read_git_origin_url(workspace: &Path) -> Option<String> {
    let config = tokio::fs::read_to_string(workspace.join(".git/config")).await.ok()?;

    let mut in_origin_section = false;
    for line in config.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            in_origin_section = trimmed == r#"[remote "origin"]"#;
            continue;
        }
        if in_origin_section {
            if let Some(url) = trimmed.strip_prefix("url = ") {
                return Some(url.trim().to_string());
            }
        }
    }
    None
}

async fn git_status_is_dirty(workspace: &Path) -> bool {
    let Ok(output) = Command::new("git").arg("-C").arg(workspace).arg("status").arg("--porcelain").output().await else {
        return false;
    };
    !output.stdout.is_empty()
}

/// `.zeta` is an internal alternative VCS this engine treats only through a
/// best-effort interface: a `.zeta/HEAD` file holding a bare commit hash, if
/// present, with no dirty-tree detection (no `zeta` CLI exists to shell out
/// to in this environment).
async fn probe_zeta(workspace: &Path) -> Provenance {
    let commit = tokio::fs::read_to_string(workspace.join(".zeta/HEAD"))
        .await
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Provenance { url: None, commit, dirty: false }
}

fn is_hex_commit(s: &str) -> bool {
    s.len() >= 7 && s.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn probes_none_when_no_vcs_metadata_present() {
        let workspace = TempDir::new().unwrap();
        assert!(probe(workspace.path()).await.is_none());
    }

    #[tokio::test]
    async fn resolves_detached_head_commit() {
        let workspace = TempDir::new().unwrap();
        tokio::fs::create_dir(workspace.path().join(".git")).await.unwrap();
        tokio::fs::write(workspace.path().join(".git/HEAD"), "a".repeat(40)).await.unwrap();

        let provenance = probe(workspace.path()).await.unwrap();
        assert_eq!(provenance.commit.as_deref(), Some("a".repeat(40).as_str()));
    }

    #[tokio::test]
    async fn resolves_symbolic_head_via_refs_file() {
        let workspace = TempDir::new().unwrap();
        tokio::fs::create_dir_all(workspace.path().join(".git/refs/heads")).await.unwrap();
        tokio::fs::write(workspace.path().join(".git/HEAD"), "ref: refs/heads/main\n").await.unwrap();
        tokio::fs::write(workspace.path().join(".git/refs/heads/main"), "b".repeat(40)).await.unwrap();

        let provenance = probe(workspace.path()).await.unwrap();
        assert_eq!(provenance.commit.as_deref(), Some("b".repeat(40).as_str()));
    }

    #[test]
    fn revision_appends_dirty_suffix() {
        let clean = Provenance {
            url: None,
            commit: Some("abc1234".to_string()),
            dirty: false,
        };
        assert_eq!(clean.revision().as_deref(), Some("abc1234"));

        let dirty = Provenance { dirty: true, ..clean };
        assert_eq!(dirty.revision().as_deref(), Some("abc1234-dirty"));
    }

    #[test]
    fn revision_is_none_without_a_commit() {
        assert_eq!(Provenance::default().revision(), None);
    }
}
