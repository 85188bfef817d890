//! Image uploads for the gallery.
//!
//! Uploads are capped at `MAX_UPLOAD_BYTES` and must be JPEG, PNG, GIF or WebP.
//! The declared content type has to agree with the file's magic bytes; the
//! stored file gets a fresh UUID name so client filenames never touch the disk.

use std::fmt;
use std::path::Path;

/// Per-upload size cap (5 MB)
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl ImageKind {
    pub fn content_type(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Gif => "image/gif",
            ImageKind::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "jpg",
            ImageKind::Png => "png",
            ImageKind::Gif => "gif",
            ImageKind::Webp => "webp",
        }
    }

    /// Map a declared MIME type (parameters ignored) to an accepted kind.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            "image/gif" => Some(ImageKind::Gif),
            "image/webp" => Some(ImageKind::Webp),
            _ => None,
        }
    }

    /// Detect the image kind from the leading bytes of the file.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageKind::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageKind::Png)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageKind::Gif)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageKind::Webp)
        } else {
            None
        }
    }
}

#[derive(Debug)]
pub enum UploadError {
    MissingFile,
    TooLarge { limit: usize },
    UnsupportedType(String),
    /// Declared type and actual content disagree
    ContentMismatch { declared: String },
    Io(std::io::Error),
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::MissingFile => write!(f, "No file was uploaded"),
            UploadError::TooLarge { limit } => {
                write!(f, "File exceeds the maximum size of {} MB", limit / (1024 * 1024))
            }
            UploadError::UnsupportedType(ct) => write!(
                f,
                "Unsupported file type '{}'. Allowed: JPEG, PNG, GIF, WebP",
                ct
            ),
            UploadError::ContentMismatch { declared } => {
                write!(f, "File content does not match declared type '{}'", declared)
            }
            UploadError::Io(e) => write!(f, "Failed to store file: {}", e),
        }
    }
}

impl std::error::Error for UploadError {}

impl From<std::io::Error> for UploadError {
    fn from(e: std::io::Error) -> Self {
        UploadError::Io(e)
    }
}

#[derive(Debug, Clone)]
pub struct StoredImage {
    pub filename: String,
    pub content_type: &'static str,
    pub size_bytes: i64,
}

/// Check an upload's size and type before anything is written.
pub fn check_image(bytes: &[u8], declared_type: &str) -> Result<ImageKind, UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::MissingFile);
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge { limit: MAX_UPLOAD_BYTES });
    }
    let declared = ImageKind::from_content_type(declared_type)
        .ok_or_else(|| UploadError::UnsupportedType(declared_type.to_string()))?;
    match ImageKind::sniff(bytes) {
        Some(actual) if actual == declared => Ok(declared),
        _ => Err(UploadError::ContentMismatch {
            declared: declared_type.to_string(),
        }),
    }
}

/// Validate and write an image into `dir` under a generated name.
pub fn store_image(dir: &Path, bytes: &[u8], declared_type: &str) -> Result<StoredImage, UploadError> {
    let kind = check_image(bytes, declared_type)?;
    std::fs::create_dir_all(dir)?;
    let filename = format!("{}.{}", uuid::Uuid::new_v4(), kind.extension());
    std::fs::write(dir.join(&filename), bytes)?;
    log::info!("Stored upload {} ({} bytes)", filename, bytes.len());
    Ok(StoredImage {
        filename,
        content_type: kind.content_type(),
        size_bytes: bytes.len() as i64,
    })
}

/// Remove a stored image. A file that is already gone is not an error.
pub fn remove_image(dir: &Path, filename: &str) -> std::io::Result<()> {
    // Stored names never contain separators
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Ok(());
    }
    match std::fs::remove_file(dir.join(filename)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
