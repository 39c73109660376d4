//! Core data models used throughout ragdesk.
//!
//! These types represent the documents, segments and chat turns that flow
//! through the ingestion and retrieval pipeline.

use serde::Serialize;

use crate::error::{AssistantError, Result};

/// Declared type of an uploaded document.
///
/// Decided once at ingestion and carried with the bytes; nothing downstream
/// looks at a filename again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
    PlainText,
}

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_TEXT: &str = "text/plain";

impl DocumentKind {
    /// Map a file extension (with or without the leading dot, any case).
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "docx" => Ok(DocumentKind::Docx),
            "txt" => Ok(DocumentKind::PlainText),
            other => Err(AssistantError::UnsupportedType(other.to_string())),
        }
    }

    /// Map a MIME content type; parameters such as `; charset=utf-8` are ignored.
    pub fn from_mime(content_type: &str) -> Result<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            MIME_PDF => Ok(DocumentKind::Pdf),
            MIME_DOCX => Ok(DocumentKind::Docx),
            MIME_TEXT => Ok(DocumentKind::PlainText),
            _ => Err(AssistantError::UnsupportedType(content_type.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Docx => "docx",
            DocumentKind::PlainText => "txt",
        }
    }
}

/// Raw uploaded bytes plus their declared kind.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(name: impl Into<String>, kind: DocumentKind, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            kind,
            bytes,
        }
    }

    /// Build a document from an upload name, deriving the kind from its extension.
    pub fn from_upload(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let name = name.into();
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .ok_or_else(|| AssistantError::UnsupportedType(name.clone()))?;
        let kind = DocumentKind::from_extension(ext)?;
        Ok(Self { name, kind, bytes })
    }
}

/// A contiguous, overlapping slice of a document's extracted text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextSegment {
    /// Position in the segment sequence, contiguous from 0.
    pub index: usize,
    pub text: String,
    /// Leading characters shared with the previous segment (0 for the first).
    pub overlap: usize,
    /// SHA-256 hex digest of `text`.
    pub hash: String,
}

/// One exchange shown in the chat view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub query: String,
    pub response: String,
}

impl ChatTurn {
    pub fn new(query: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            response: response.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_mapping_is_case_insensitive() {
        assert_eq!(DocumentKind::from_extension("PDF").unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_extension(".docx").unwrap(), DocumentKind::Docx);
        assert_eq!(DocumentKind::from_extension("txt").unwrap(), DocumentKind::PlainText);
    }

    #[test]
    fn test_unknown_extension_is_unsupported() {
        let err = DocumentKind::from_extension("xlsx").unwrap_err();
        assert!(matches!(err, AssistantError::UnsupportedType(ref t) if t == "xlsx"));
    }

    #[test]
    fn test_mime_parameters_are_ignored() {
        assert_eq!(
            DocumentKind::from_mime("text/plain; charset=utf-8").unwrap(),
            DocumentKind::PlainText
        );
        assert!(DocumentKind::from_mime("application/octet-stream").is_err());
    }

    #[test]
    fn test_upload_without_extension_is_unsupported() {
        let err = Document::from_upload("README", b"hi".to_vec()).unwrap_err();
        assert!(matches!(err, AssistantError::UnsupportedType(_)));
    }

    #[test]
    fn test_upload_uses_last_extension() {
        let doc = Document::from_upload("report.final.PDF", Vec::new()).unwrap();
        assert_eq!(doc.kind, DocumentKind::Pdf);
        assert_eq!(doc.name, "report.final.PDF");
    }
}
