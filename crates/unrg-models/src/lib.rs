//! Shared data models for unregistry.
//!
//! This crate provides:
//! - The two storage namespaces and their naming rules
//! - Object name validation (path traversal protection)
//! - Serde-serializable JSON envelopes exchanged by server and client

pub mod name;
pub mod namespace;
pub mod response;
pub mod utils;

pub use name::{image_name_from_filename, NameError, ObjectName, MAX_NAME_LENGTH};
pub use namespace::{Namespace, IMAGE_SUFFIX};
pub use response::{
    DeleteResponse, ErrorResponse, FileListResponse, ImageListResponse, UploadFileResponse,
    UploadImageResponse,
};
pub use utils::format_bytes;
