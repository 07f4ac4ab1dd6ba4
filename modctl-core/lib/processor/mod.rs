//! Processor set: walks a build workspace, classifies every file, and hands
//! each one to the builder as a layer, bounded by a configurable worker
//! count.

pub mod patterns;

use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use tokio_util::sync::CancellationToken;

use crate::{
    Descriptor, ModctlResult,
    builder::Builder,
    codec::LAYER_MEDIA_TYPE_RAW,
    concurrency::bounded_for_each,
    processor::patterns::FileClass,
};

/// Default worker count for a build walk when the caller doesn't override it
///.
pub use modctl_utils::defaults::DEFAULT_CONCURRENCY;

struct ClassifiedEntry {
    relative_path: PathBuf,
    class: FileClass,
}

/// Walks `workspace_root`, classifies every regular file via
/// [`FileClass::classify`], encodes and writes each one through `builder` at
/// up to `concurrency` files in flight, and returns the produced descriptors
/// sorted by `(mediaTypePriority, filepath)` — the same order `attach`
/// re-sorts to and `extract` replays.
///
/// `force_raw` overrides every file's class-derived media type with the raw
/// codec (`build --raw` / `attach --raw`), trading mode/structure
/// preservation for a simpler single-file layer.
///
/// Files matching no known class are skipped; callers that want to surface
/// this (e.g. a `build --verbose` summary) should diff the walk's total file
/// count against the returned descriptor count themselves.
pub async fn process_workspace(
    builder: Arc<Builder>,
    workspace_root: PathBuf,
    concurrency: usize,
    cancel: CancellationToken,
    force_raw: bool,
) -> ModctlResult<Vec<Descriptor>> {
    let workspace_root = Arc::new(workspace_root);
    let entries = collect_classified_entries(&workspace_root)?;

    let mut results: Vec<(FileClass, Descriptor)> = bounded_for_each(entries, concurrency, cancel, move |entry, cancel| {
        let builder = builder.clone();
        let workspace_root = workspace_root.clone();
        async move {
            let media_type = if force_raw { LAYER_MEDIA_TYPE_RAW } else { entry.class.media_type() };
            let descriptor = builder
                .build_layer(&entry.relative_path, &workspace_root, media_type, BTreeMap::new(), &cancel)
                .await?;
            Ok((entry.class, descriptor))
        }
    })
    .await?;

    results.sort_by(|(class_a, desc_a), (class_b, desc_b)| {
        class_a.priority().cmp(&class_b.priority()).then_with(|| desc_a.filepath().cmp(&desc_b.filepath()))
    });

    Ok(results.into_iter().map(|(_, descriptor)| descriptor).collect())
}

fn collect_classified_entries(workspace_root: &std::path::Path) -> ModctlResult<Vec<ClassifiedEntry>> {
    let mut entries = Vec::new();

    for entry in walkdir::WalkDir::new(workspace_root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }

        let relative_path = match entry.path().strip_prefix(workspace_root) {
            Ok(path) => path.to_path_buf(),
            Err(_) => continue,
        };

        let relative_str = relative_path.to_string_lossy().replace('\\', "/");
        if let Some(class) = FileClass::classify(&relative_str) {
            entries.push(ClassifiedEntry { relative_path, class });
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{builder::BuildSink, store::ContentStore};
    use tempfile::TempDir;

    #[tokio::test]
    async fn walks_workspace_and_sorts_by_class_then_path() {
        let workspace = TempDir::new().unwrap();
        tokio::fs::write(workspace.path().join("model.safetensors"), b"weights").await.unwrap();
        tokio::fs::write(workspace.path().join("config.json"), b"{}").await.unwrap();
        tokio::fs::write(workspace.path().join("README.md"), b"# demo").await.unwrap();
        tokio::fs::create_dir(workspace.path().join("src")).await.unwrap();
        tokio::fs::write(workspace.path().join("src/train.py"), b"print(1)").await.unwrap();
        tokio::fs::write(workspace.path().join("notes.unknownext"), b"skip me").await.unwrap();

        let store_dir = TempDir::new().unwrap();
        let store = Arc::new(ContentStore::open(store_dir.path()).await.unwrap());
        let builder = Arc::new(Builder::new(BuildSink::local(store, "demo")));

        let descriptors = process_workspace(builder, workspace.path().to_path_buf(), DEFAULT_CONCURRENCY, CancellationToken::new(), false)
            .await
            .unwrap();

        assert_eq!(descriptors.len(), 4);

        let paths: Vec<&str> = descriptors.iter().map(|d| d.filepath().unwrap()).collect();
        assert_eq!(paths, vec!["config.json", "model.safetensors", "src/train.py", "README.md"]);
    }
}
