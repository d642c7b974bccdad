//! JSON envelopes returned by the HTTP API.

use serde::{Deserialize, Deserializer, Serialize};

/// Response to `POST /api/file/upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFileResponse {
    pub message: String,
    pub filename: String,
}

/// Response to `POST /api/img/upload`. `image_name` never carries the
/// storage suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadImageResponse {
    pub message: String,
    pub image_name: String,
}

/// Response to a successful delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
}

/// Response to `GET /api/file/list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub files: Vec<String>,
}

/// Response to `GET /api/img/list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageListResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub images: Vec<String>,
}

/// Accepts `null` for an empty listing.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Error body for every non-success response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_image_shape() {
        let body = UploadImageResponse {
            message: "Image uploaded successfully".to_string(),
            image_name: "nginx".to_string(),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["image_name"], "nginx");
        assert_eq!(value["message"], "Image uploaded successfully");
    }

    #[test]
    fn test_empty_listing_is_array() {
        let json = serde_json::to_string(&FileListResponse::default()).unwrap();
        assert_eq!(json, r#"{"files":[]}"#);
    }

    #[test]
    fn test_null_listing_decodes_as_empty() {
        let parsed: ImageListResponse = serde_json::from_str(r#"{"images":null}"#).unwrap();
        assert!(parsed.images.is_empty());
        let missing: ImageListResponse = serde_json::from_str("{}").unwrap();
        assert!(missing.images.is_empty());
    }
}
