use anyhow::{Context, Result};
use log::{info, warn};
use pdf_extract::extract_text;
use std::fmt;
use std::fs;
use std::path::Path;

/// Source formats the indexer knows how to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    PlainText,
}

impl DocumentKind {
    /// Recognize a file by its extension. Anything but `.pdf` and `.txt` is unsupported.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        match path.as_ref().extension()?.to_str()? {
            "pdf" => Some(DocumentKind::Pdf),
            "txt" => Some(DocumentKind::PlainText),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Pdf => write!(f, "pdf"),
            DocumentKind::PlainText => write!(f, "txt"),
        }
    }
}

/// Read content from a document based on its kind
pub fn read_document_content<P: AsRef<Path>>(file_path: P, kind: DocumentKind) -> Result<String> {
    let path = file_path.as_ref();

    match kind {
        DocumentKind::Pdf => {
            info!("Processing PDF document: {}", path.display());
            let content = extract_text(path)
                .with_context(|| format!("Failed to extract text from PDF: {}", path.display()))?;

            if content.trim().is_empty() {
                warn!("Extracted PDF content is empty: {}", path.display());
            }

            Ok(content)
        }
        DocumentKind::PlainText => {
            info!("Processing text document: {}", path.display());
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read text file: {}", path.display()))
        }
    }
}
