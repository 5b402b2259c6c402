use crossbeam::channel::{Sender, bounded};
use indicatif::{ProgressBar, ProgressStyle};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Message carried by the progress channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressSignal {
    /// One task completed successfully
    Completed,
    /// Terminal sentinel, sent exactly once after the pool has stopped
    Finished,
}

/// Live progress display for one run
pub trait ProgressHandle: Send + 'static {
    /// Record one completed task
    fn advance(&mut self);

    /// Called once when no more signals will arrive
    fn finish(&mut self) {}
}

/// Factory for progress handles
///
/// Sinks with `ENABLED = false` make the executor skip the progress channel
/// and listener thread entirely.
pub trait ProgressSink {
    type Handle: ProgressHandle;

    const ENABLED: bool = true;

    fn start(&self, total: usize) -> Self::Handle;
}

/// Disables progress reporting
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

#[derive(Debug)]
pub struct NoopHandle;

impl ProgressHandle for NoopHandle {
    fn advance(&mut self) {}
}

impl ProgressSink for NoProgress {
    type Handle = NoopHandle;

    const ENABLED: bool = false;

    fn start(&self, _total: usize) -> Self::Handle {
        NoopHandle
    }
}

/// Terminal progress bar backed by indicatif
#[derive(Debug, Clone)]
pub struct BarProgress {
    label: String,
}

impl BarProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new("Processing")
    }
}

pub struct BarHandle {
    bar: ProgressBar,
}

impl ProgressHandle for BarHandle {
    fn advance(&mut self) {
        self.bar.inc(1);
    }

    fn finish(&mut self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressSink for BarProgress {
    type Handle = BarHandle;

    fn start(&self, total: usize) -> Self::Handle {
        let style = ProgressStyle::with_template(
            "⚡ {msg} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} ({percent}%)",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");

        let bar = ProgressBar::new(total as u64);
        bar.set_style(style);
        bar.set_message(self.label.clone());
        bar.enable_steady_tick(Duration::from_millis(100));

        BarHandle { bar }
    }
}

/// Counters shared between a [`CountingProgress`] and its handles
#[derive(Debug, Default)]
pub struct ProgressCounts {
    total: AtomicUsize,
    started: AtomicUsize,
    advanced: AtomicUsize,
    finished: AtomicUsize,
    late: AtomicUsize,
}

impl ProgressCounts {
    /// Total announced by the most recent `start`
    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Number of runs that started a handle
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn advanced(&self) -> usize {
        self.advanced.load(Ordering::SeqCst)
    }

    /// How many times `finish` was called
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// Signals observed after `finish`; always zero for a well-behaved run
    pub fn late(&self) -> usize {
        self.late.load(Ordering::SeqCst)
    }
}

/// Sink that only counts, useful for summaries and tests
#[derive(Debug, Clone, Default)]
pub struct CountingProgress {
    counts: Arc<ProgressCounts>,
}

impl CountingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> Arc<ProgressCounts> {
        self.counts.clone()
    }
}

pub struct CountingHandle {
    counts: Arc<ProgressCounts>,
    finished: bool,
}

impl ProgressHandle for CountingHandle {
    fn advance(&mut self) {
        if self.finished {
            self.counts.late.fetch_add(1, Ordering::SeqCst);
        } else {
            self.counts.advanced.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.counts.finished.fetch_add(1, Ordering::SeqCst);
    }
}

impl ProgressSink for CountingProgress {
    type Handle = CountingHandle;

    fn start(&self, total: usize) -> Self::Handle {
        self.counts.total.store(total, Ordering::SeqCst);
        self.counts.started.fetch_add(1, Ordering::SeqCst);
        CountingHandle {
            counts: self.counts.clone(),
            finished: false,
        }
    }
}

/// Sink handle that survives a panicking sink
///
/// The first panic in `start`, `advance` or `finish` is logged and the
/// handle is dropped; later calls are no-ops. Progress never aborts a run.
pub(crate) struct GuardedHandle<H> {
    inner: Option<H>,
}

impl<H: ProgressHandle> GuardedHandle<H> {
    pub(crate) fn start<P>(sink: &P, total: usize) -> Self
    where
        P: ProgressSink<Handle = H>,
    {
        Self {
            inner: guarded("start", || sink.start(total)),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.inner.is_some()
    }

    pub(crate) fn advance(&mut self) {
        if let Some(handle) = self.inner.as_mut()
            && guarded("advance", || handle.advance()).is_none()
        {
            self.inner = None;
        }
    }

    pub(crate) fn finish(&mut self) {
        if let Some(mut handle) = self.inner.take() {
            guarded("finish", || handle.finish());
        }
    }
}

fn guarded<T>(stage: &str, call: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(stage, "progress sink panicked; continuing without progress");
            None
        }
    }
}

/// Worker-side end of the progress channel
#[derive(Clone)]
pub(crate) struct ProgressEmitter {
    tx: Sender<ProgressSignal>,
}

impl ProgressEmitter {
    pub(crate) fn completed(&self) {
        // A dead listener only loses display updates
        let _ = self.tx.send(ProgressSignal::Completed);
    }
}

/// Dedicated thread draining the progress channel into a handle
///
/// The channel holds `total + 1` signals, so emitting never blocks. The
/// sentinel is sent and the thread joined on [`ProgressListener::shutdown`]
/// or, failing that, on drop.
pub(crate) struct ProgressListener {
    tx: Option<Sender<ProgressSignal>>,
    thread: Option<JoinHandle<usize>>,
}

impl ProgressListener {
    pub(crate) fn spawn<H: ProgressHandle>(
        mut handle: GuardedHandle<H>,
        total: usize,
    ) -> std::io::Result<Self> {
        let (tx, rx) = bounded(total + 1);

        let thread = thread::Builder::new()
            .name("parfold-progress".to_string())
            .spawn(move || {
                let mut observed = 0;
                for signal in rx.iter() {
                    match signal {
                        ProgressSignal::Completed => {
                            handle.advance();
                            observed += 1;
                        }
                        ProgressSignal::Finished => break,
                    }
                }
                handle.finish();
                observed
            })?;

        Ok(Self {
            tx: Some(tx),
            thread: Some(thread),
        })
    }

    pub(crate) fn emitter(&self) -> Option<ProgressEmitter> {
        self.tx.as_ref().map(|tx| ProgressEmitter { tx: tx.clone() })
    }

    /// Send the sentinel and wait for the listener; returns signals observed
    pub(crate) fn shutdown(mut self) -> Option<usize> {
        self.stop()
    }

    fn stop(&mut self) -> Option<usize> {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(ProgressSignal::Finished);
        }

        let thread = self.thread.take()?;
        match thread.join() {
            Ok(observed) => Some(observed),
            Err(_) => {
                tracing::warn!("progress listener panicked; continuing without progress");
                None
            }
        }
    }
}

impl Drop for ProgressListener {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_counts_signals_then_stops() {
        let sink = CountingProgress::new();
        let counts = sink.counts();
        let listener = ProgressListener::spawn(GuardedHandle::start(&sink, 3), 3).unwrap();

        let emitter = listener.emitter().unwrap();
        for _ in 0..3 {
            emitter.completed();
        }

        assert_eq!(listener.shutdown(), Some(3));
        assert_eq!(counts.advanced(), 3);
        assert_eq!(counts.finished(), 1);
        assert_eq!(counts.late(), 0);
    }

    #[test]
    fn test_listener_drop_delivers_sentinel() {
        let sink = CountingProgress::new();
        let counts = sink.counts();
        {
            let listener = ProgressListener::spawn(GuardedHandle::start(&sink, 2), 2).unwrap();
            listener.emitter().unwrap().completed();
        }
        assert_eq!(counts.finished(), 1);
        assert_eq!(counts.advanced(), 1);
    }

    #[test]
    fn test_emitting_after_shutdown_is_harmless() {
        let sink = CountingProgress::new();
        let counts = sink.counts();
        let listener = ProgressListener::spawn(GuardedHandle::start(&sink, 1), 1).unwrap();
        let emitter = listener.emitter().unwrap();

        listener.shutdown();
        emitter.completed();

        assert_eq!(counts.advanced(), 0);
        assert_eq!(counts.finished(), 1);
    }

    /// Sink whose handle panics on the `panic_at`-th advance
    struct FaultySink {
        panic_at: usize,
        counts: Arc<ProgressCounts>,
    }

    struct FaultyHandle {
        seen: usize,
        panic_at: usize,
        counts: Arc<ProgressCounts>,
    }

    impl ProgressHandle for FaultyHandle {
        fn advance(&mut self) {
            self.seen += 1;
            if self.seen == self.panic_at {
                panic!("display went away");
            }
            self.counts.advanced.fetch_add(1, Ordering::SeqCst);
        }

        fn finish(&mut self) {
            self.counts.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl ProgressSink for FaultySink {
        type Handle = FaultyHandle;

        fn start(&self, _total: usize) -> Self::Handle {
            FaultyHandle {
                seen: 0,
                panic_at: self.panic_at,
                counts: self.counts.clone(),
            }
        }
    }

    #[test]
    fn test_guarded_handle_drops_panicking_sink() {
        let counts = Arc::new(ProgressCounts::default());
        let sink = FaultySink {
            panic_at: 2,
            counts: counts.clone(),
        };

        let mut handle = GuardedHandle::start(&sink, 5);
        for _ in 0..5 {
            handle.advance();
        }
        handle.finish();

        assert!(!handle.is_active());
        assert_eq!(counts.advanced(), 1);
        // The sink was dropped at the panic, so it is never finished
        assert_eq!(counts.finished(), 0);
    }

    #[test]
    fn test_listener_survives_panicking_sink() {
        let counts = Arc::new(ProgressCounts::default());
        let sink = FaultySink {
            panic_at: 1,
            counts: counts.clone(),
        };
        let listener = ProgressListener::spawn(GuardedHandle::start(&sink, 3), 3).unwrap();
        let emitter = listener.emitter().unwrap();
        for _ in 0..3 {
            emitter.completed();
        }

        assert_eq!(listener.shutdown(), Some(3));
        assert_eq!(counts.advanced(), 0);
    }

    #[test]
    fn test_no_progress_is_disabled() {
        assert!(!NoProgress::ENABLED);
        assert!(CountingProgress::ENABLED);
        assert!(BarProgress::ENABLED);
    }

    #[test]
    fn test_bar_progress_basic() {
        let mut handle = BarProgress::new("Test").start(10);
        handle.advance();
        handle.finish();
    }
}
