//! Progress reporting for transfers.
//!
//! Transfer tasks report through the [`ProgressSink`] trait so the engine never
//! depends on how (or whether) progress is rendered.

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Receives byte and file counts from concurrent transfer tasks.
pub trait ProgressSink: Send + Sync {
    /// Account `n` more bytes as processed.
    fn add_bytes(&self, n: u64);

    /// Take back bytes that were reported but have to be processed again.
    fn remove_bytes(&self, _n: u64) {}

    /// Mark one more file as completed.
    fn file_done(&self) {}
}

/// Sink that discards all updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn add_bytes(&self, _n: u64) {}
}

impl<T: ProgressSink + ?Sized> ProgressSink for Arc<T> {
    fn add_bytes(&self, n: u64) {
        (**self).add_bytes(n)
    }

    fn remove_bytes(&self, n: u64) {
        (**self).remove_bytes(n)
    }

    fn file_done(&self) {
        (**self).file_done()
    }
}

/// Byte progress bar with a completed-files counter in its description.
pub struct TransferProgress {
    bar: ProgressBar,
    label: String,
    total_files: usize,
    files_done: AtomicUsize,
    /// Serialises description updates coming from different tasks.
    describe: Mutex<()>,
}

impl TransferProgress {
    /// Create a bar for `total_bytes` across `total_files` files.
    ///
    /// When `visible` is false, or stderr is not a terminal, nothing is drawn
    /// but counters are still maintained.
    pub fn new(total_bytes: u64, label: &str, total_files: usize, visible: bool) -> Self {
        let bar = if visible && io::stderr().is_terminal() {
            ProgressBar::with_draw_target(Some(total_bytes), ProgressDrawTarget::stderr())
        } else {
            ProgressBar::hidden()
        };
        bar.set_length(total_bytes);

        let style = ProgressStyle::with_template(
            "{msg} [{bar:40.cyan/blue}] {binary_bytes}/{binary_total_bytes} ({binary_bytes_per_sec})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
        bar.set_style(style);

        let progress = Self {
            bar,
            label: label.to_string(),
            total_files,
            files_done: AtomicUsize::new(0),
            describe: Mutex::new(()),
        };
        progress.refresh_description(0);
        progress
    }

    pub fn files_done(&self) -> usize {
        self.files_done.load(Ordering::SeqCst)
    }

    pub fn bytes_done(&self) -> u64 {
        self.bar.position()
    }

    pub fn is_visible(&self) -> bool {
        !self.bar.is_hidden()
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn refresh_description(&self, done: usize) {
        let _guard = self.describe.lock().unwrap_or_else(|e| e.into_inner());
        self.bar
            .set_message(format!("{} ({}/{})", self.label, done, self.total_files));
    }
}

impl ProgressSink for TransferProgress {
    fn add_bytes(&self, n: u64) {
        // Archives can be larger than the files they hold; never run past the total.
        let total = self.bar.length().unwrap_or(u64::MAX);
        let remaining = total.saturating_sub(self.bar.position());
        self.bar.inc(n.min(remaining));
    }

    fn remove_bytes(&self, n: u64) {
        self.bar.set_position(self.bar.position().saturating_sub(n));
    }

    fn file_done(&self) {
        let done = self.files_done.fetch_add(1, Ordering::SeqCst) + 1;
        self.refresh_description(done);
    }
}

/// Writer adapter that reports every byte written to a sink.
pub struct ProgressWriter<'a, W> {
    inner: W,
    sink: &'a dyn ProgressSink,
}

impl<'a, W: Write> ProgressWriter<'a, W> {
    pub fn new(inner: W, sink: &'a dyn ProgressSink) -> Self {
        Self { inner, sink }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for ProgressWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.sink.add_bytes(n as u64);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Sink that forwards to another while counting the bytes it saw, so work that
/// turns out to be wasted can be taken back off the bar.
pub struct Tally<'a> {
    inner: &'a dyn ProgressSink,
    bytes: AtomicU64,
}

impl<'a> Tally<'a> {
    pub fn new(inner: &'a dyn ProgressSink) -> Self {
        Self {
            inner,
            bytes: AtomicU64::new(0),
        }
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::SeqCst)
    }

    /// Remove everything counted so far from the inner sink.
    pub fn revert(&self) {
        let n = self.bytes.swap(0, Ordering::SeqCst);
        if n > 0 {
            self.inner.remove_bytes(n);
        }
    }
}

impl ProgressSink for Tally<'_> {
    fn add_bytes(&self, n: u64) {
        self.bytes.fetch_add(n, Ordering::SeqCst);
        self.inner.add_bytes(n);
    }

    fn remove_bytes(&self, n: u64) {
        self.inner.remove_bytes(n);
    }

    fn file_done(&self) {
        self.inner.file_done();
    }
}
