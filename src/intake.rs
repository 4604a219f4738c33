//! File intake: accept a single image or PDF as the current upload.
//!
//! A candidate carries the same three facts a browser `File` object does:
//! name, declared MIME type and contents. Only `image/*` and
//! `application/pdf` are accepted. Rejection is a typed [`IntakeError`];
//! the caller decides whether to surface it, and the upload state is never
//! touched on rejection.

use crate::error::{IntakeError, MolSnapError};
use image::ImageFormat;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

/// MIME type of PDF documents.
pub const PDF_MIME: &str = "application/pdf";

/// A file offered by the user, not yet accepted.
#[derive(Debug, Clone)]
pub struct FileCandidate {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl FileCandidate {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a file from disk and detect its MIME type from its contents.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, MolSnapError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| MolSnapError::InputReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = detect_mime(&bytes, &file_name);
        debug!("Read {} ({} bytes, {})", file_name, bytes.len(), mime_type);
        Ok(Self {
            file_name,
            mime_type,
            bytes,
        })
    }
}

/// Broad category of an accepted upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Pdf,
}

/// The accepted upload. Replaced wholesale by the next accepted file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadSelection {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Page count, known for PDFs only.
    pub page_count: Option<usize>,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl UploadSelection {
    pub fn kind(&self) -> FileKind {
        if self.mime_type == PDF_MIME {
            FileKind::Pdf
        } else {
            FileKind::Image
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.kind() == FileKind::Pdf
    }

    /// Size in megabytes, as shown next to the file name.
    pub fn size_megabytes(&self) -> f64 {
        self.size_bytes as f64 / 1024.0 / 1024.0
    }
}

/// Whether a declared MIME type may be uploaded.
pub fn is_supported_mime(mime_type: &str) -> bool {
    mime_type.starts_with("image/") || mime_type == PDF_MIME
}

/// Accept or reject a candidate.
///
/// PDFs are opened once to count their pages; a PDF that cannot be parsed
/// is rejected rather than sent to the segmentation service.
pub fn accept(candidate: FileCandidate) -> Result<UploadSelection, IntakeError> {
    if !is_supported_mime(&candidate.mime_type) {
        return Err(IntakeError::UnsupportedType {
            file_name: candidate.file_name,
            mime_type: candidate.mime_type,
        });
    }
    if candidate.bytes.is_empty() {
        return Err(IntakeError::Empty {
            file_name: candidate.file_name,
        });
    }

    let page_count = if candidate.mime_type == PDF_MIME {
        Some(count_pdf_pages(&candidate.file_name, &candidate.bytes)?)
    } else {
        None
    };

    info!(
        "Accepted {} ({}, {} bytes)",
        candidate.file_name,
        candidate.mime_type,
        candidate.bytes.len()
    );

    Ok(UploadSelection {
        file_name: candidate.file_name,
        mime_type: candidate.mime_type,
        size_bytes: candidate.bytes.len() as u64,
        page_count,
        bytes: candidate.bytes,
    })
}

fn count_pdf_pages(file_name: &str, bytes: &[u8]) -> Result<usize, IntakeError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| IntakeError::CorruptPdf {
        file_name: file_name.to_string(),
        detail: e.to_string(),
    })?;
    Ok(doc.get_pages().len())
}

/// Detect a MIME type from magic bytes, falling back to the extension.
pub fn detect_mime(bytes: &[u8], file_name: &str) -> String {
    if bytes.starts_with(b"%PDF") {
        return PDF_MIME.to_string();
    }
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type().to_string();
    }
    let ext = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase());
    match ext.as_deref() {
        Some("pdf") => PDF_MIME.to_string(),
        Some(ext) => ImageFormat::from_extension(ext)
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string()),
        None => "application/octet-stream".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    #[test]
    fn supported_mime_types() {
        assert!(is_supported_mime("image/png"));
        assert!(is_supported_mime("image/jpeg"));
        assert!(is_supported_mime("application/pdf"));
        assert!(!is_supported_mime("text/plain"));
        assert!(!is_supported_mime("application/pdfx"));
        assert!(!is_supported_mime(""));
    }

    #[test]
    fn accepts_image() {
        let sel = accept(FileCandidate::new("MolSnap.png", "image/png", PNG_MAGIC.to_vec())).unwrap();
        assert_eq!(sel.kind(), FileKind::Image);
        assert_eq!(sel.size_bytes, PNG_MAGIC.len() as u64);
        assert_eq!(sel.page_count, None);
    }

    #[test]
    fn rejects_unsupported_type() {
        let err = accept(FileCandidate::new("notes.txt", "text/plain", b"hi".to_vec())).unwrap_err();
        assert_eq!(
            err,
            IntakeError::UnsupportedType {
                file_name: "notes.txt".into(),
                mime_type: "text/plain".into()
            }
        );
    }

    #[test]
    fn rejects_empty_file() {
        let err = accept(FileCandidate::new("a.png", "image/png", Vec::new())).unwrap_err();
        assert!(matches!(err, IntakeError::Empty { .. }));
    }

    #[test]
    fn rejects_unparseable_pdf() {
        let err = accept(FileCandidate::new(
            "broken.pdf",
            PDF_MIME,
            b"%PDF-1.7 not really".to_vec(),
        ))
        .unwrap_err();
        assert!(matches!(err, IntakeError::CorruptPdf { .. }));
    }

    #[test]
    fn detects_mime_from_magic_bytes() {
        assert_eq!(detect_mime(b"%PDF-1.4\n", "x.bin"), PDF_MIME);
        assert_eq!(detect_mime(PNG_MAGIC, "x.bin"), "image/png");
        assert_eq!(detect_mime(&[0xFF, 0xD8, 0xFF, 0xE0], "x"), "image/jpeg");
    }

    #[test]
    fn detects_mime_from_extension_fallback() {
        assert_eq!(detect_mime(b"????", "scan.JPG"), "image/jpeg");
        assert_eq!(detect_mime(b"????", "paper.pdf"), PDF_MIME);
        assert_eq!(detect_mime(b"????", "README"), "application/octet-stream");
    }

    #[test]
    fn size_in_megabytes() {
        let sel = UploadSelection {
            file_name: "a.png".into(),
            mime_type: "image/png".into(),
            size_bytes: 2 * 1024 * 1024,
            page_count: None,
            bytes: Vec::new(),
        };
        assert!((sel.size_megabytes() - 2.0).abs() < f64::EPSILON);
    }
}
