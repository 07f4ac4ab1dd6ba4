//! Multi-bar progress sink consumed by builder/orchestrator I/O hooks.
//!
//! A process-wide toggle (here: which [`ProgressSink`] implementation is
//! constructed) disables rendering when stdout is not a terminal or
//! `--no-progress` is given — threaded in as a configuration value rather
//! than ambient global state, per the design note, so operations stay
//! testable with [`NoopProgress`].

use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, ReadBuf};

#[cfg(feature = "cli")]
use std::{collections::HashMap, sync::Mutex};

#[cfg(feature = "cli")]
use indicatif::ProgressBar;
#[cfg(feature = "cli")]
use modctl_utils::term::{create_bar, finish_with_error};

/// A handle to one in-flight progress bar, returned by [`ProgressSink::start`].
pub trait ProgressHandle: Send + Sync {
    /// Advances the bar by `delta` bytes/units.
    fn inc(&self, delta: u64);

    /// Marks the bar complete successfully.
    fn finish(&self);

    /// Marks the bar complete in an error state. Per , progress bars for
    /// aborted items transition to an error state, never omitted.
    fn finish_with_error(&self);
}

/// A multi-bar progress sink. Bars are keyed by name (typically a digest or
/// short digest prefix); starting a bar for an already-present name aborts
/// the old one in place, per the shared-resource policy.
pub trait ProgressSink: Send + Sync {
    /// Starts (or replaces) a bar named `name`, sized `size` if known, else
    /// rendered as an indeterminate spinner.
    fn start(&self, name: &str, size: Option<u64>) -> Arc<dyn ProgressHandle>;
}

//--------------------------------------------------------------------------------------------------
// No-op sink
//--------------------------------------------------------------------------------------------------

/// A progress sink that renders nothing — used when `--no-progress` is set
/// or stdout is not a terminal, and in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

struct NoopHandle;

impl ProgressHandle for NoopHandle {
    fn inc(&self, _delta: u64) {}
    fn finish(&self) {}
    fn finish_with_error(&self) {}
}

impl ProgressSink for NoopProgress {
    fn start(&self, _name: &str, _size: Option<u64>) -> Arc<dyn ProgressHandle> {
        Arc::new(NoopHandle)
    }
}

//--------------------------------------------------------------------------------------------------
// indicatif-backed sink
//--------------------------------------------------------------------------------------------------

/// A multi-bar progress sink rendered with `indicatif`.
#[cfg(feature = "cli")]
#[derive(Default)]
pub struct IndicatifProgress {
    bars: Mutex<HashMap<String, ProgressBar>>,
}

#[cfg(feature = "cli")]
impl IndicatifProgress {
    /// Creates a new, empty progress sink.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(feature = "cli")]
struct IndicatifHandle {
    bar: ProgressBar,
}

#[cfg(feature = "cli")]
impl ProgressHandle for IndicatifHandle {
    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn finish(&self) {
        self.bar.finish_with_message(format!("{} {}", modctl_utils::term::CHECKMARK.as_str(), self.bar.message()));
    }

    fn finish_with_error(&self) {
        finish_with_error(&self.bar);
    }
}

#[cfg(feature = "cli")]
impl ProgressSink for IndicatifProgress {
    fn start(&self, name: &str, size: Option<u64>) -> Arc<dyn ProgressHandle> {
        let mut bars = self.bars.lock().expect("progress bar map lock poisoned");
        if let Some(old) = bars.remove(name) {
            old.abandon();
        }

        let bar = create_bar(name.to_string(), None, size);
        bars.insert(name.to_string(), bar.clone());
        Arc::new(IndicatifHandle { bar })
    }
}

//--------------------------------------------------------------------------------------------------
// Reader tee
//--------------------------------------------------------------------------------------------------

pin_project! {
    /// Wraps an `AsyncRead`, reporting every successful read to a
    /// [`ProgressHandle`]. This is the reader the builder's `onStart` hook
    /// returns, 
    pub struct ProgressReader<R> {
        #[pin]
        inner: R,
        handle: Arc<dyn ProgressHandle>,
    }
}

impl<R> ProgressReader<R> {
    /// Wraps `inner`, reporting bytes read to `handle`.
    pub fn new(inner: R, handle: Arc<dyn ProgressHandle>) -> Self {
        ProgressReader { inner, handle }
    }
}

impl<R: AsyncRead> AsyncRead for ProgressReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.project();
        let before = buf.filled().len();
        let poll = this.inner.poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            let read = buf.filled().len() - before;
            if read > 0 {
                this.handle.inc(read as u64);
            }
        }
        poll
    }
}
