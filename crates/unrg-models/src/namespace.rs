//! Storage namespaces.

use serde::{Deserialize, Serialize};

/// Suffix under which image archives are persisted.
pub const IMAGE_SUFFIX: &str = ".tar.gz";

/// One of the two flat object namespaces.
///
/// An object named `x` may exist independently in both namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    File,
    Image,
}

impl Namespace {
    /// All namespaces, in a stable order.
    pub const ALL: [Namespace; 2] = [Namespace::File, Namespace::Image];

    /// Directory name under the data root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Namespace::File => "files",
            Namespace::Image => "images",
        }
    }

    /// Route segment under `/api`.
    pub fn route_segment(&self) -> &'static str {
        match self {
            Namespace::File => "file",
            Namespace::Image => "img",
        }
    }

    /// Multipart field carrying the upload payload.
    pub fn form_field(&self) -> &'static str {
        match self {
            Namespace::File => "file",
            Namespace::Image => "image",
        }
    }

    /// Capitalized noun used in user-facing messages.
    pub fn display_noun(&self) -> &'static str {
        match self {
            Namespace::File => "File",
            Namespace::Image => "Image",
        }
    }

    /// Suffix appended to names when persisting, if any.
    pub fn storage_suffix(&self) -> Option<&'static str> {
        match self {
            Namespace::File => None,
            Namespace::Image => Some(IMAGE_SUFFIX),
        }
    }

    /// Map an external name to the on-disk entry name.
    pub fn to_storage_name(&self, name: &str) -> String {
        match self.storage_suffix() {
            Some(suffix) => format!("{}{}", name, suffix),
            None => name.to_string(),
        }
    }

    /// Map an on-disk entry name back to the external name.
    ///
    /// Returns `None` for entries that do not belong to the namespace
    /// (missing suffix, or nothing left once the suffix is stripped).
    pub fn from_storage_name(&self, entry: &str) -> Option<String> {
        match self.storage_suffix() {
            None => Some(entry.to_string()),
            Some(suffix) => entry
                .strip_suffix(suffix)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
        }
    }

    /// File name offered to downloaders.
    pub fn download_filename(&self, name: &str) -> String {
        self.to_storage_name(name)
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Namespace::File => write!(f, "file"),
            Namespace::Image => write!(f, "image"),
        }
    }
}
