//! Multipart upload payloads with local validation and progress reporting.

use bytes::Bytes;
use futures::stream;
use reqwest::Body;
use reqwest::multipart::Part;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

/// Progress callback receiving 0-100.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Bytes are handed to the HTTP client in slices of this size; progress is
/// reported once per slice.
const CHUNK_SIZE: usize = 64 * 1024;

/// A file ready to be uploaded.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub mime: String,
    pub bytes: Bytes,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::storage_io(path, e.to_string()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(name, mime_from_path(path), bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// MIME type for common extensions, `application/octet-stream` otherwise.
pub fn mime_from_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "zip" => "application/zip",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// Reject a file before any network call.
///
/// `allowed_types` of `None` accepts every type.
pub fn validate(file: &UploadFile, max_size: u64, allowed_types: Option<&[String]>) -> Result<()> {
    if file.size() > max_size {
        return Err(Error::Validation(format!(
            "File size cannot exceed {}",
            format_size(max_size)
        )));
    }
    if let Some(allowed) = allowed_types {
        if !allowed.iter().any(|t| t.eq_ignore_ascii_case(&file.mime)) {
            return Err(Error::Validation("Unsupported file type".into()));
        }
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    const MB: u64 = 1024 * 1024;
    if bytes >= MB && bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else if bytes >= MB {
        format!("{:.1}MB", bytes as f64 / MB as f64)
    } else {
        format!("{}KB", bytes.div_ceil(1024))
    }
}

/// Build the multipart part for `file`, reporting progress as the HTTP
/// client pulls the body.
pub fn file_part(file: &UploadFile, progress: Option<ProgressFn>) -> Result<Part> {
    let total = file.size();
    let part = match progress {
        None => Part::stream_with_length(file.bytes.clone(), total),
        Some(progress) => {
            let sent = Arc::new(AtomicU64::new(0));
            let chunks: Vec<Bytes> = if file.bytes.is_empty() {
                vec![Bytes::new()]
            } else {
                (0..file.bytes.len())
                    .step_by(CHUNK_SIZE)
                    .map(|start| {
                        let end = (start + CHUNK_SIZE).min(file.bytes.len());
                        file.bytes.slice(start..end)
                    })
                    .collect()
            };
            let body = stream::iter(chunks.into_iter().map(move |chunk| {
                let done = sent.fetch_add(chunk.len() as u64, Ordering::Relaxed) + chunk.len() as u64;
                progress(percent(done, total));
                Ok::<Bytes, std::io::Error>(chunk)
            }));
            Part::stream_with_length(Body::wrap_stream(body), total)
        }
    };

    part.file_name(file.name.clone())
        .mime_str(&file.mime)
        .map_err(|_| Error::Validation(format!("Invalid MIME type: {}", file.mime)))
}

/// Rounded percentage, 100 for an empty total.
pub fn percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done as f64 * 100.0 / total as f64).round() as u64).min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(size: usize) -> UploadFile {
        UploadFile::new("a.png", "image/png", vec![0u8; size])
    }

    #[test]
    fn test_validate_size() {
        let err = validate(&png(11), 10, None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(validate(&png(10), 10, None).is_ok());

        let err = validate(&png(10 * 1024 * 1024 + 1), 10 * 1024 * 1024, None).unwrap_err();
        assert_eq!(err.to_string(), "File size cannot exceed 10MB");
    }

    #[test]
    fn test_validate_type() {
        let allowed = vec!["image/jpeg".to_string(), "image/png".to_string()];
        assert!(validate(&png(1), 100, Some(&allowed)).is_ok());

        let pdf = UploadFile::new("a.pdf", "application/pdf", vec![1u8]);
        let err = validate(&pdf, 100, Some(&allowed)).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported file type");
    }

    #[test]
    fn test_mime_guess() {
        assert_eq!(mime_from_path(Path::new("x/photo.JPG")), "image/jpeg");
        assert_eq!(mime_from_path(Path::new("doc.pdf")), "application/pdf");
        assert_eq!(mime_from_path(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 0), 100);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(5, 4), 100);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(5 * 1024 * 1024), "5MB");
        assert_eq!(format_size(1536 * 1024), "1.5MB");
        assert_eq!(format_size(2048), "2KB");
    }

    #[tokio::test]
    async fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();

        let file = UploadFile::from_path(&path).await.unwrap();
        assert_eq!(file.name, "notes.txt");
        assert_eq!(file.mime, "text/plain");
        assert_eq!(file.size(), 5);

        let err = UploadFile::from_path(dir.path().join("missing.bin")).await.unwrap_err();
        assert!(matches!(err, Error::StorageIo { .. }));
    }
}
