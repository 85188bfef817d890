use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// URL prefix the upload directory is mounted under
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryItem {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub album: Option<String>,
    /// Stored file name inside the gallery directory
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub published: bool,
    pub uploaded_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Response type for gallery endpoints (adds the public URL)
#[derive(Debug, Clone, Serialize)]
pub struct GalleryItemResponse {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub album: Option<String>,
    pub url: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<GalleryItem> for GalleryItemResponse {
    fn from(item: GalleryItem) -> Self {
        Self {
            url: format!("{}/gallery/{}", UPLOADS_URL_PREFIX, item.filename),
            id: item.id,
            title: item.title,
            description: item.description,
            album: item.album,
            content_type: item.content_type,
            size_bytes: item.size_bytes,
            published: item.published,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateGalleryItemRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub album: Option<String>,
    pub published: Option<bool>,
}
