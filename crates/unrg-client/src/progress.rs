//! Transfer progress accounting.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Receives progress for one transfer.
pub trait ProgressObserver: Send + Sync {
    /// Called once before any bytes move. `total` is `None` when unknown.
    fn on_start(&mut self, total: Option<u64>);

    /// Called after every non-empty chunk with the cumulative count.
    fn on_advance(&mut self, transferred: u64, total: Option<u64>);

    /// Called once when the stream ends.
    fn on_finish(&mut self, transferred: u64);
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressObserver for SilentProgress {
    fn on_start(&mut self, _total: Option<u64>) {}
    fn on_advance(&mut self, _transferred: u64, _total: Option<u64>) {}
    fn on_finish(&mut self, _transferred: u64) {}
}

/// Counts bytes flowing through a chunk stream and reports them.
pub struct ProgressStream<S> {
    inner: S,
    observer: Box<dyn ProgressObserver>,
    transferred: u64,
    total: Option<u64>,
    finished: bool,
}

impl<S> ProgressStream<S> {
    pub fn new(inner: S, total: Option<u64>, mut observer: Box<dyn ProgressObserver>) -> Self {
        observer.on_start(total);
        Self {
            inner,
            observer,
            transferred: 0,
            total,
            finished: false,
        }
    }

    /// Bytes seen so far.
    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.observer.on_finish(self.transferred);
        }
    }
}

impl<S, E> Stream for ProgressStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<Bytes, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if !chunk.is_empty() {
                    this.transferred += chunk.len() as u64;
                    this.observer.on_advance(this.transferred, this.total);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

const BAR_TEMPLATE: &str =
    "{msg} {percent:>3}% [{bar:40}] ({bytes}/{total_bytes}, {bytes_per_sec})";
const SPINNER_TEMPLATE: &str = "{spinner} {msg} {bytes} ({bytes_per_sec})";
const SPINNER_TICK: Duration = Duration::from_millis(100);

/// Progress bar on stderr. Falls back to a spinner when the total is unknown.
pub struct TerminalProgress {
    label: String,
    target: fn() -> ProgressDrawTarget,
    bar: Option<ProgressBar>,
}

impl TerminalProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_target(label, ProgressDrawTarget::stderr)
    }

    fn with_target(label: impl Into<String>, target: fn() -> ProgressDrawTarget) -> Self {
        Self {
            label: label.into(),
            target,
            bar: None,
        }
    }
}

impl std::fmt::Debug for TerminalProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalProgress")
            .field("label", &self.label)
            .field("started", &self.bar.is_some())
            .finish()
    }
}

impl ProgressObserver for TerminalProgress {
    fn on_start(&mut self, total: Option<u64>) {
        let bar = ProgressBar::with_draw_target(total, (self.target)());
        match total {
            Some(_) => {
                let style = ProgressStyle::with_template(BAR_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> ");
                bar.set_style(style);
            }
            None => {
                let style = ProgressStyle::with_template(SPINNER_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_spinner());
                bar.set_style(style);
                bar.enable_steady_tick(SPINNER_TICK);
            }
        }
        bar.set_message(self.label.clone());
        self.bar = Some(bar);
    }

    fn on_advance(&mut self, transferred: u64, _total: Option<u64>) {
        if let Some(bar) = &self.bar {
            bar.set_position(transferred);
        }
    }

    fn on_finish(&mut self, transferred: u64) {
        if let Some(bar) = &self.bar {
            bar.set_position(transferred);
            bar.finish();
        }
    }
}

impl Drop for TerminalProgress {
    fn drop(&mut self) {
        // Leave an interrupted bar where it stopped
        if let Some(bar) = &self.bar {
            if !bar.is_finished() {
                bar.abandon();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Start(Option<u64>),
        Advance(u64, Option<u64>),
        Finish(u64),
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Event>>>);

    impl ProgressObserver for Recorder {
        fn on_start(&mut self, total: Option<u64>) {
            self.0.lock().unwrap().push(Event::Start(total));
        }
        fn on_advance(&mut self, transferred: u64, total: Option<u64>) {
            self.0.lock().unwrap().push(Event::Advance(transferred, total));
        }
        fn on_finish(&mut self, transferred: u64) {
            self.0.lock().unwrap().push(Event::Finish(transferred));
        }
    }

    #[tokio::test]
    async fn test_counts_non_empty_chunks_and_finishes_once() {
        let recorder = Recorder::default();
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"abc")),
            Ok(Bytes::new()),
            Ok(Bytes::from_static(b"defg")),
        ];
        let mut stream = ProgressStream::new(
            futures_util::stream::iter(chunks),
            Some(10),
            Box::new(recorder.clone()),
        );

        while let Some(chunk) = stream.next().await {
            chunk.unwrap();
        }
        // Polling past the end must not finish twice.
        assert!(stream.next().await.is_none());
        assert_eq!(stream.transferred(), 7);

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec![
                Event::Start(Some(10)),
                Event::Advance(3, Some(10)),
                Event::Advance(7, Some(10)),
                Event::Finish(7),
            ]
        );
    }

    #[tokio::test]
    async fn test_errors_pass_through_without_finishing() {
        let recorder = Recorder::default();
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"ab")),
            Err(std::io::Error::new(std::io::ErrorKind::Other, "reset")),
        ];
        let mut stream =
            ProgressStream::new(futures_util::stream::iter(chunks), None, Box::new(recorder.clone()));

        assert!(stream.next().await.unwrap().is_ok());
        assert!(stream.next().await.unwrap().is_err());

        let events = recorder.0.lock().unwrap().clone();
        assert_eq!(events, vec![Event::Start(None), Event::Advance(2, None)]);
    }

    #[test]
    fn test_terminal_progress_with_known_total() {
        let mut progress = TerminalProgress::with_target("Uploading a.bin", ProgressDrawTarget::hidden);
        progress.on_start(Some(1024));
        progress.on_advance(512, Some(1024));

        let bar = progress.bar.clone().unwrap();
        assert_eq!(bar.length(), Some(1024));
        assert_eq!(bar.position(), 512);
        assert_eq!(bar.message(), "Uploading a.bin");
        assert!(!bar.is_finished());

        progress.on_finish(1024);
        assert_eq!(bar.position(), 1024);
        assert!(bar.is_finished());
    }

    #[test]
    fn test_terminal_progress_without_total() {
        let mut progress = TerminalProgress::with_target("Downloading f", ProgressDrawTarget::hidden);
        progress.on_start(None);
        progress.on_advance(2048, None);

        let bar = progress.bar.clone().unwrap();
        assert_eq!(bar.length(), None);
        assert_eq!(bar.position(), 2048);

        progress.on_finish(4096);
        assert_eq!(bar.position(), 4096);
        assert!(bar.is_finished());
    }
}
