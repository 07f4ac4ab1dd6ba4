//! Operation orchestrators: the public verbs — `build`, `push`,
//! `pull`, `fetch`, `extract`, `attach`, `tag`, `rm`, `prune`, `inspect`,
//! `ls` — each parsing its reference, opening the store and/or remote
//! client it needs, and running under one [`OpContext`] (a shared
//! [`CancellationToken`] plus a concurrency bound and a progress sink).
//!
//! Every orchestrator here is a free `pub async fn` rather than a method on
//! some god object: one function per verb (`ops::build::build`,
//! `ops::push::push`, …) instead of a single "manager" type.

pub mod attach;
pub mod build;
pub mod extract;
pub mod fetch;
mod glob;
pub mod inspect;
pub mod list;
pub mod modelfile;
mod provenance;
pub mod prune;
pub mod pull;
pub mod push;
pub mod rm;
pub mod tag;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    progress::{NoopProgress, ProgressSink},
    reference::Reference,
    store::SharedContentStore,
};

/// The store-facing reference string for `reference`: its tag if present,
/// else its digest string. Every local-store call takes one flat `ref`
/// string rather than a `Reference`.
pub(crate) fn store_reference(reference: &Reference) -> String {
    match reference.tag() {
        Some(tag) => tag.to_string(),
        None => reference.digest().map(|d| d.to_string()).unwrap_or_default(),
    }
}

/// Shared state threaded through every orchestrator: the one content store
/// the whole process was opened against (every operation touches it, even
/// ones whose primary destination is remote — `build --output-remote` still
/// reads nothing from it, but `pull`/`push`/`attach`/`tag`/`rm`/`prune`/`ls`
/// all do), plus cancellation, progress, and a concurrency bound.
#[derive(Clone)]
pub struct OpContext {
    /// The local content store, opened once against `--storage-dir`.
    pub store: SharedContentStore,
    /// Cooperative cancellation shared with every nested bounded work group.
    pub cancel: CancellationToken,
    /// Progress rendering sink; [`NoopProgress`] when `--no-progress` (or a
    /// non-terminal stdout) disables rendering.
    pub progress: Arc<dyn ProgressSink>,
    /// Worker bound for bounded concurrent work (layers in flight, etc.).
    pub concurrency: usize,
}

impl OpContext {
    /// An [`OpContext`] over `store` with default cancellation/progress and
    /// the default concurrency bound.
    pub fn new(store: SharedContentStore) -> Self {
        OpContext {
            store,
            cancel: CancellationToken::new(),
            progress: Arc::new(NoopProgress),
            concurrency: modctl_utils::defaults::DEFAULT_CONCURRENCY,
        }
    }

    /// Overrides the progress sink.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Overrides the concurrency bound (0 is treated as 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Overrides the cancellation token (so a caller can cancel this
    /// operation from outside, e.g. on a signal).
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}
