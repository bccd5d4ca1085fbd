//! Local storage for report photos.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

/// Path prefix under which stored files are served.
pub const PUBLIC_PREFIX: &str = "/uploads";

const ACCEPTED: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
];

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("uploaded file is empty")]
    Empty,
    #[error("file exceeds the {limit} byte upload limit")]
    TooLarge { limit: usize },
    #[error("unsupported media type: {0}")]
    UnsupportedType(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct StoredMedia {
    pub file_name: String,
    pub url: String,
    pub content_type: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    dir: PathBuf,
    max_bytes: usize,
}

impl MediaStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub async fn ensure_dir(&self) -> Result<(), MediaError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Validates and writes an upload under a fresh random name.
    pub async fn save(
        &self,
        original_name: Option<&str>,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> Result<StoredMedia, MediaError> {
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(MediaError::TooLarge {
                limit: self.max_bytes,
            });
        }
        let (content_type, extension) = detect_type(original_name, content_type)?;

        self.ensure_dir().await?;
        let file_name = format!("{}.{extension}", Uuid::new_v4());
        tokio::fs::write(self.dir.join(&file_name), bytes).await?;

        info!(
            file_name = %file_name,
            content_type,
            size = bytes.len(),
            "Stored upload"
        );
        Ok(StoredMedia {
            url: format!("{PUBLIC_PREFIX}/{file_name}"),
            file_name,
            content_type: content_type.to_string(),
            size: bytes.len() as u64,
        })
    }
}

/// Uses the declared content type when it is specific, the file extension otherwise.
pub fn detect_type(
    original_name: Option<&str>,
    content_type: Option<&str>,
) -> Result<(&'static str, &'static str), MediaError> {
    let declared = content_type
        .map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream");
    let mime = match declared {
        Some(ct) => ct,
        None => original_name
            .and_then(|name| mime_guess::from_path(name).first())
            .map(|m| m.essence_str().to_string())
            .ok_or_else(|| {
                MediaError::UnsupportedType(original_name.unwrap_or("unknown").to_string())
            })?,
    };

    ACCEPTED
        .iter()
        .find(|(accepted, _)| *accepted == mime)
        .copied()
        .ok_or(MediaError::UnsupportedType(mime))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_type_wins_over_extension() {
        assert_eq!(
            detect_type(Some("photo.bin"), Some("image/png")).unwrap(),
            ("image/png", "png")
        );
        assert_eq!(
            detect_type(Some("photo.jpeg"), Some("application/octet-stream")).unwrap(),
            ("image/jpeg", "jpg")
        );
        assert_eq!(
            detect_type(None, Some("Image/WebP; charset=binary")).unwrap(),
            ("image/webp", "webp")
        );
    }

    #[test]
    fn non_images_are_rejected() {
        assert!(matches!(
            detect_type(Some("notes.pdf"), None),
            Err(MediaError::UnsupportedType(t)) if t == "application/pdf"
        ));
        assert!(matches!(
            detect_type(None, None),
            Err(MediaError::UnsupportedType(_))
        ));
    }

    #[tokio::test]
    async fn saves_under_random_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path().join("uploads"), 16);

        let stored = store
            .save(Some("pothole.gif"), None, b"GIF89a....")
            .await
            .unwrap();
        assert!(stored.file_name.ends_with(".gif"));
        assert_eq!(stored.url, format!("/uploads/{}", stored.file_name));
        assert_eq!(stored.size, 10);
        let written = tokio::fs::read(store.dir().join(&stored.file_name))
            .await
            .unwrap();
        assert_eq!(written, b"GIF89a....");
    }

    #[tokio::test]
    async fn size_limits_are_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path(), 4);
        assert!(matches!(
            store.save(Some("a.png"), None, b"").await,
            Err(MediaError::Empty)
        ));
        assert!(matches!(
            store.save(Some("a.png"), None, b"12345").await,
            Err(MediaError::TooLarge { limit: 4 })
        ));
    }
}
