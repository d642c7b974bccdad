//! Streaming client for unregistry.
//!
//! This crate provides:
//! - A bounded relay and multipart encoder task that stream uploads
//!   without buffering them
//! - Progress accounting for uploads and downloads
//! - A typed API client and the on-disk credential file
//! - Container image packaging through `docker save` / `docker load`

pub mod client;
pub mod config;
pub mod docker;
pub mod error;
pub mod multipart;
pub mod progress;
pub mod relay;

pub use client::{ClientConfig, UnrgClient};
pub use config::CredentialFile;
pub use error::{ClientError, ClientResult};
pub use multipart::{spawn_encoder, EncoderTask, MultipartEncoder, FRAMING_OVERHEAD_ESTIMATE};
pub use progress::{ProgressObserver, ProgressStream, SilentProgress, TerminalProgress};
pub use relay::{relay, RelayError, RelayReader, RelayWriter};
