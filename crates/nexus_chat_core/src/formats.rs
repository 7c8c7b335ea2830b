//! crates/nexus_chat_core/src/formats.rs
//!
//! Upload validation: the extension allow-list and the size ceiling.

use crate::errors::IngestionError;
use std::fmt;

/// Largest accepted upload, in bytes (10 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// The document formats the ingestion gateway knows how to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Doc,
    Txt,
    Pptx,
    Csv,
    Md,
}

impl DocumentFormat {
    pub const ALL: [DocumentFormat; 7] = [
        DocumentFormat::Pdf,
        DocumentFormat::Docx,
        DocumentFormat::Doc,
        DocumentFormat::Txt,
        DocumentFormat::Pptx,
        DocumentFormat::Csv,
        DocumentFormat::Md,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Doc => "doc",
            DocumentFormat::Txt => "txt",
            DocumentFormat::Pptx => "pptx",
            DocumentFormat::Csv => "csv",
            DocumentFormat::Md => "md",
        }
    }

    /// Resolves the format from a file name's extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Result<Self, IngestionError> {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        Self::ALL
            .into_iter()
            .find(|format| format.extension() == extension)
            .ok_or_else(|| {
                if extension.is_empty() {
                    IngestionError::UnsupportedType(format!("'{filename}' has no extension"))
                } else {
                    IngestionError::UnsupportedType(format!(".{extension}"))
                }
            })
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Rejects payloads above `limit` bytes.
pub fn check_size(size: u64, limit: u64) -> Result<(), IngestionError> {
    if size > limit {
        return Err(IngestionError::TooLarge { size, limit });
    }
    Ok(())
}
