//! Bounded in-memory pipe between the encoder task and the request body.
//!
//! The writer blocks while the channel is full and the reader blocks while
//! it is empty; that is the only synchronization between the two sides.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;
use thiserror::Error;
use tokio::sync::mpsc;

/// Chunks buffered between writer and reader.
pub const DEFAULT_RELAY_CAPACITY: usize = 8;

/// How long a single send may wait for the reader before giving up.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay reader was dropped")]
    Closed,

    #[error("relay stalled: reader made no progress for {0:?}")]
    Stalled(Duration),
}

/// Create a relay holding at most `capacity` chunks.
pub fn relay(capacity: usize, stall_timeout: Duration) -> (RelayWriter, RelayReader) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        RelayWriter { tx, stall_timeout },
        RelayReader { rx },
    )
}

/// Write end. Dropping it closes the relay cleanly.
#[derive(Debug)]
pub struct RelayWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
    stall_timeout: Duration,
}

impl RelayWriter {
    /// Hand a chunk to the reader, waiting while the relay is full.
    pub async fn send(&self, chunk: Bytes) -> Result<(), RelayError> {
        if chunk.is_empty() {
            return Ok(());
        }

        match tokio::time::timeout(self.stall_timeout, self.tx.send(Ok(chunk))).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(RelayError::Closed),
            Err(_) => Err(RelayError::Stalled(self.stall_timeout)),
        }
    }

    /// Close the relay in an error state; the reader sees `err` next.
    pub async fn fail(self, err: io::Error) {
        // The reader may already be gone, nothing left to notify then.
        let _ = tokio::time::timeout(self.stall_timeout, self.tx.send(Err(err))).await;
    }

    /// Whether the read end has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Read end, consumed as a stream of chunks.
#[derive(Debug)]
pub struct RelayReader {
    rx: mpsc::Receiver<io::Result<Bytes>>,
}

impl Stream for RelayReader {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
