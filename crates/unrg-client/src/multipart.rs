//! Streaming `multipart/form-data` encoder.
//!
//! The body is produced by a spawned task writing framing and payload into a
//! relay, so the total encoded size never has to be known up front.

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};
use crate::relay::RelayWriter;

/// Rough size of boundary and part headers, for callers that do not know
/// the filename yet.
pub const FRAMING_OVERHEAD_ESTIMATE: u64 = 1024;

/// Chunk size used when reading the local source.
pub const SOURCE_CHUNK_SIZE: usize = 64 * 1024;

/// Frames a single file part.
#[derive(Debug, Clone)]
pub struct MultipartEncoder {
    boundary: String,
}

impl Default for MultipartEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartEncoder {
    /// Encoder with a random boundary.
    pub fn new() -> Self {
        Self::with_boundary(format!("unrg-{}", Uuid::new_v4().simple()))
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Opening boundary and part headers.
    pub fn head(&self, field: &str, filename: &str) -> Bytes {
        Bytes::from(format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
            self.boundary,
            escape_quoted(field),
            escape_quoted(filename),
        ))
    }

    /// Closing boundary.
    pub fn tail(&self) -> Bytes {
        Bytes::from(format!("\r\n--{}--\r\n", self.boundary))
    }

    /// Exact number of framing bytes around a payload.
    pub fn framing_len(&self, field: &str, filename: &str) -> u64 {
        (self.head(field, filename).len() + self.tail().len()) as u64
    }
}

fn escape_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\r' | '\n' => {}
            '"' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Handle to a running encoder task.
///
/// Dropping the handle aborts the task, so an HTTP exchange that returns
/// early never leaves the encoder running.
#[derive(Debug)]
pub struct EncoderTask {
    handle: JoinHandle<ClientResult<u64>>,
}

impl EncoderTask {
    /// Wait for the encoder; returns the payload bytes read from the source.
    pub async fn join(mut self) -> ClientResult<u64> {
        match (&mut self.handle).await {
            Ok(result) => result,
            Err(e) => Err(ClientError::Encoder(e.to_string())),
        }
    }

    /// Whether the task has already stopped.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for EncoderTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawn the task writing `head`, the source payload and `tail` into the relay.
///
/// A source read error closes the relay in an error state so the request
/// body fails on its next read.
pub fn spawn_encoder<R>(writer: RelayWriter, head: Bytes, tail: Bytes, source: R) -> EncoderTask
where
    R: AsyncRead + Send + 'static,
{
    let handle = tokio::spawn(encode(writer, head, tail, source));
    EncoderTask { handle }
}

async fn encode<R>(writer: RelayWriter, head: Bytes, tail: Bytes, source: R) -> ClientResult<u64>
where
    R: AsyncRead,
{
    writer.send(head).await?;

    let stream = ReaderStream::with_capacity(source, SOURCE_CHUNK_SIZE);
    futures_util::pin_mut!(stream);

    let mut payload = 0u64;
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => {
                payload += chunk.len() as u64;
                writer.send(chunk).await?;
            }
            Err(e) => {
                warn!(error = %e, bytes = payload, "Upload source failed");
                writer
                    .fail(std::io::Error::new(e.kind(), e.to_string()))
                    .await;
                return Err(e.into());
            }
        }
    }

    writer.send(tail).await?;
    debug!(bytes = payload, "Encoder finished");
    Ok(payload)
}
