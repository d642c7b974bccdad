//! Container image packaging through the `docker` CLI.
//!
//! `docker save` output is gzipped in-process into an archive; pulling
//! reverses that into `docker load`.

use std::io::Write;
use std::path::Path;
use std::process::Stdio;

use flate2::write::{GzDecoder, GzEncoder};
use flate2::Compression;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use unrg_models::IMAGE_SUFFIX;

use crate::error::{ClientError, ClientResult};

const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// Name an image is stored under: `/` is not allowed in object names.
pub fn stored_name(image: &str) -> String {
    image.replace('/', "_")
}

/// Archive file name for an image, e.g. `library_nginx:latest.tar.gz`.
pub fn archive_name(image: &str) -> String {
    format!("{}{}", stored_name(image), IMAGE_SUFFIX)
}

/// Run `docker save <image>` and gzip its output into `dest`.
///
/// Returns the uncompressed size. `dest` is removed on failure.
pub async fn save_image(image: &str, dest: &Path) -> ClientResult<u64> {
    info!(image = %image, dest = %dest.display(), "Saving image");

    let mut child = Command::new("docker")
        .arg("save")
        .arg(image)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ClientError::command(format!("failed to start docker save: {}", e)))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ClientError::command("docker save stdout unavailable"))?;
    let stderr = drain_pipe(child.stderr.take());

    let result = finish_save(child, stdout, stderr, dest).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(dest).await;
    }
    result
}

async fn finish_save(
    mut child: Child,
    stdout: ChildStdout,
    stderr: JoinHandle<Vec<u8>>,
    dest: &Path,
) -> ClientResult<u64> {
    let mut out = tokio::fs::File::create(dest).await?;
    let copied = gzip_stream(stdout, &mut out).await;

    let status = child.wait().await?;
    let stderr = collect(stderr).await;
    if !status.success() {
        return Err(ClientError::command(format!(
            "docker save failed ({}): {}",
            status,
            String::from_utf8_lossy(&stderr).trim()
        )));
    }
    copied
}

/// Gunzip `src` into `docker load`. Returns what docker printed.
pub async fn load_image(src: &Path) -> ClientResult<String> {
    info!(src = %src.display(), "Loading image");

    let archive = tokio::fs::File::open(src).await?;

    let mut child = Command::new("docker")
        .arg("load")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ClientError::command(format!("failed to start docker load: {}", e)))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| ClientError::command("docker load stdin unavailable"))?;
    let stdout = drain_pipe(child.stdout.take());
    let stderr = drain_pipe(child.stderr.take());

    let copied = gunzip_stream(archive, &mut stdin).await;
    // Closing stdin lets docker finish
    drop(stdin);

    let status = child.wait().await?;
    let stdout = collect(stdout).await;
    let stderr = collect(stderr).await;
    if !status.success() {
        return Err(ClientError::command(format!(
            "docker load failed ({}): {}",
            status,
            String::from_utf8_lossy(&stderr).trim()
        )));
    }
    let bytes = copied?;
    debug!(bytes, "Fed archive to docker load");

    Ok(String::from_utf8_lossy(&stdout).trim().to_string())
}

/// Read a child pipe to the end on its own task.
fn drain_pipe<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut out = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut out).await {
                debug!(error = %e, "Child pipe read failed");
            }
        }
        out
    })
}

async fn collect(handle: JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.await.unwrap_or_default()
}

/// Gzip everything from `reader` into `writer`. Returns uncompressed bytes.
pub async fn gzip_stream<R, W>(mut reader: R, writer: &mut W) -> ClientResult<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut buf = vec![0u8; COPY_CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        total += n as u64;
        encoder.write_all(&buf[..n])?;
        drain(encoder.get_mut(), writer).await?;
    }

    let rest = encoder.finish()?;
    writer.write_all(&rest).await?;
    writer.flush().await?;
    Ok(total)
}

/// Gunzip everything from `reader` into `writer`. Returns decompressed bytes.
pub async fn gunzip_stream<R, W>(mut reader: R, writer: &mut W) -> ClientResult<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut decoder = GzDecoder::new(Vec::new());
    let mut buf = vec![0u8; COPY_CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        decoder.write_all(&buf[..n])?;
        total += drain(decoder.get_mut(), writer).await?;
    }

    let rest = decoder.finish()?;
    total += rest.len() as u64;
    writer.write_all(&rest).await?;
    writer.flush().await?;
    Ok(total)
}

async fn drain<W>(pending: &mut Vec<u8>, writer: &mut W) -> ClientResult<u64>
where
    W: AsyncWrite + Unpin,
{
    let len = pending.len() as u64;
    if len > 0 {
        writer.write_all(pending).await?;
        pending.clear();
    }
    Ok(len)
}
