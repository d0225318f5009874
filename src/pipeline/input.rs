//! Input resolution: turn a user-supplied path or URL into a [`Document`].
//!
//! pdfium loads from a byte slice, so both branches end with the whole file
//! in memory and no temp file is needed. Magic-byte validation happens later
//! in [`Document::validate`] so bytes supplied directly by a library caller
//! get the same checks.

use crate::document::Document;
use crate::error::ExtractionError;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read a local file or download a URL.
///
/// `timeout_secs` bounds the whole download; it is ignored for local files.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<Document, ExtractionError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<Document, ExtractionError> {
    let path = PathBuf::from(path_str);

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Read local document: {} ({} bytes)", path.display(), bytes.len());
            Ok(Document::new(bytes))
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(ExtractionError::PermissionDenied { path })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ExtractionError::FileNotFound { path })
        }
        Err(e) => Err(ExtractionError::Internal(format!(
            "Failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Document, ExtractionError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ExtractionError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            ExtractionError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ExtractionError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_err)?;

    if !response.status().is_success() {
        return Err(ExtractionError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(map_err)?;
    info!("Downloaded {} bytes", bytes.len());

    Ok(Document::new(bytes.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, ExtractionError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn local_file_is_read_whole() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"%PDF-1.7 fake").unwrap();

        let doc = resolve_input(file.path().to_str().unwrap(), 5).await.unwrap();
        assert_eq!(doc.bytes(), b"%PDF-1.7 fake");
    }

    #[tokio::test]
    async fn unreachable_url_fails_download() {
        let err = resolve_input("http://127.0.0.1:1/doc.pdf", 2).await.unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::DownloadFailed { .. } | ExtractionError::DownloadTimeout { .. }
        ));
    }
}
