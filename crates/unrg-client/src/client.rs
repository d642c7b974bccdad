//! Typed HTTP client for the unregistry API.

use std::path::Path;
use std::time::Duration;

use futures_util::{Stream, TryStreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, info, warn};
use unrg_models::{
    DeleteResponse, FileListResponse, ImageListResponse, Namespace, UploadFileResponse,
    UploadImageResponse,
};

use crate::config::CredentialFile;
use crate::error::{ClientError, ClientResult};
use crate::multipart::{spawn_encoder, MultipartEncoder};
use crate::progress::{ProgressObserver, ProgressStream};
use crate::relay::{relay, DEFAULT_RELAY_CAPACITY, DEFAULT_STALL_TIMEOUT};

/// How long a failed upload waits for the encoder to report its own error.
const ENCODER_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the API client.
#[derive(Clone)]
pub struct ClientConfig {
    /// Server base URL
    pub base_url: String,
    /// Bearer token
    pub token: String,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Chunks buffered between encoder and request body
    pub relay_capacity: usize,
    /// Upper bound on a single stalled relay write
    pub stall_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            connect_timeout: Duration::from_secs(30),
            relay_capacity: DEFAULT_RELAY_CAPACITY,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
        }
    }

    /// Build from a credential file; fails when no token is set.
    pub fn from_credentials(credentials: &CredentialFile) -> ClientResult<Self> {
        let token = credentials.require_token()?;
        Ok(Self::new(credentials.base_url.clone(), token))
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .field("relay_capacity", &self.relay_capacity)
            .field("stall_timeout", &self.stall_timeout)
            .finish()
    }
}

/// Client for the unregistry API. Failed requests are never retried.
pub struct UnrgClient {
    http: Client,
    config: ClientConfig,
}

impl UnrgClient {
    /// Create a new client.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(ClientError::Network)?;

        Ok(Self { http, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .bearer_auth(&self.config.token)
    }

    /// Send and turn any non-success status into `ClientError::Server`.
    async fn send(&self, request: RequestBuilder) -> ClientResult<Response> {
        let response = request.send().await?;
        check_status(response).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = self.send(request).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    // ========================================================================
    // Files
    // ========================================================================

    pub async fn upload_file(
        &self,
        path: &Path,
        progress: Box<dyn ProgressObserver>,
    ) -> ClientResult<UploadFileResponse> {
        self.upload(Namespace::File, path, progress).await
    }

    pub async fn download_file(
        &self,
        filename: &str,
        dest: &Path,
        progress: Box<dyn ProgressObserver>,
    ) -> ClientResult<u64> {
        self.download(Namespace::File, filename, dest, progress).await
    }

    pub async fn list_files(&self) -> ClientResult<Vec<String>> {
        let body: FileListResponse = self
            .send_json(self.request(Method::GET, "/api/file/list"))
            .await?;
        Ok(body.files)
    }

    pub async fn delete_file(&self, filename: &str) -> ClientResult<DeleteResponse> {
        self.delete(Namespace::File, filename).await
    }

    // ========================================================================
    // Images
    // ========================================================================

    /// Upload an image archive; the stored name is the file name without
    /// its `.tar.gz` suffix.
    pub async fn upload_image(
        &self,
        path: &Path,
        progress: Box<dyn ProgressObserver>,
    ) -> ClientResult<UploadImageResponse> {
        self.upload(Namespace::Image, path, progress).await
    }

    pub async fn download_image(
        &self,
        name: &str,
        dest: &Path,
        progress: Box<dyn ProgressObserver>,
    ) -> ClientResult<u64> {
        self.download(Namespace::Image, name, dest, progress).await
    }

    pub async fn list_images(&self) -> ClientResult<Vec<String>> {
        let body: ImageListResponse = self
            .send_json(self.request(Method::GET, "/api/img/list"))
            .await?;
        Ok(body.images)
    }

    pub async fn delete_image(&self, name: &str) -> ClientResult<DeleteResponse> {
        self.delete(Namespace::Image, name).await
    }

    /// Check the unauthenticated liveness probe.
    pub async fn health(&self) -> ClientResult<bool> {
        match self.http.get(self.url("/health")).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                warn!("Health check error: {}", e);
                Ok(false)
            }
        }
    }

    // ========================================================================
    // Transfer pipeline
    // ========================================================================

    /// Stream a local file as a multipart body.
    async fn upload<T: DeserializeOwned>(
        &self,
        namespace: Namespace,
        path: &Path,
        progress: Box<dyn ProgressObserver>,
    ) -> ClientResult<T> {
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::config(format!("invalid file name: {}", path.display())))?
            .to_string();

        self.upload_source(namespace, &filename, size, file, progress)
            .await
    }

    /// Stream `size` bytes from `source` as the multipart field `filename`.
    ///
    /// An encoder task writes framing and payload into a bounded relay while
    /// the HTTP layer reads the other end. The task is aborted if the
    /// exchange ends before it does.
    async fn upload_source<T, R>(
        &self,
        namespace: Namespace,
        filename: &str,
        size: u64,
        source: R,
        progress: Box<dyn ProgressObserver>,
    ) -> ClientResult<T>
    where
        T: DeserializeOwned,
        R: AsyncRead + Send + 'static,
    {
        let encoder = MultipartEncoder::new();
        let head = encoder.head(namespace.form_field(), filename);
        let tail = encoder.tail();
        let total = size + (head.len() + tail.len()) as u64;

        info!(namespace = %namespace, filename = %filename, bytes = size, "Uploading");

        let (writer, reader) = relay(self.config.relay_capacity, self.config.stall_timeout);
        let task = spawn_encoder(writer, head, tail, source);
        let body = reqwest::Body::wrap_stream(ProgressStream::new(reader, Some(total), progress));

        let request = self
            .request(Method::POST, &format!("/api/{}/upload", namespace.route_segment()))
            .header(CONTENT_TYPE, encoder.content_type())
            .body(body);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                // The relay is closed once the request fails, so the encoder
                // ends promptly. A source read error is the root cause.
                return match tokio::time::timeout(ENCODER_SETTLE_TIMEOUT, task.join()).await {
                    Ok(Err(source_err @ ClientError::Io(_))) => Err(source_err),
                    _ => Err(e.into()),
                };
            }
        };
        let response = check_status(response).await?;

        let sent = task.join().await?;
        debug!(bytes = sent, "Upload body complete");

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Stream a response body into `dest`. A partial file is removed on
    /// failure.
    async fn download(
        &self,
        namespace: Namespace,
        name: &str,
        dest: &Path,
        progress: Box<dyn ProgressObserver>,
    ) -> ClientResult<u64> {
        let path = format!(
            "/api/{}/download/{}",
            namespace.route_segment(),
            urlencoding::encode(name)
        );
        let response = self.send(self.request(Method::GET, &path)).await?;
        let total = response.content_length();

        info!(namespace = %namespace, name = %name, dest = %dest.display(), "Downloading");

        let stream = ProgressStream::new(Box::pin(response.bytes_stream()), total, progress);

        let mut file = tokio::fs::File::create(dest).await?;
        match write_stream(&mut file, stream).await {
            Ok(written) => Ok(written),
            Err(e) => {
                drop(file);
                if let Err(remove_err) = tokio::fs::remove_file(dest).await {
                    warn!(path = %dest.display(), error = %remove_err, "Failed to remove partial download");
                }
                Err(e)
            }
        }
    }

    async fn delete(&self, namespace: Namespace, name: &str) -> ClientResult<DeleteResponse> {
        let path = format!(
            "/api/{}/{}",
            namespace.route_segment(),
            urlencoding::encode(name)
        );
        self.send_json(self.request(Method::DELETE, &path)).await
    }
}

async fn check_status(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Server { status, body })
}

async fn write_stream<S>(file: &mut tokio::fs::File, stream: S) -> ClientResult<u64>
where
    S: Stream<Item = reqwest::Result<bytes::Bytes>>,
{
    futures_util::pin_mut!(stream);

    let mut written = 0u64;
    while let Some(chunk) = stream.try_next().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}
