//! Text extraction for uploaded documents (PDF, DOCX, plain text).
//!
//! The document kind is decided before extraction, when the upload is turned
//! into a [`Document`]; this module only maps bytes of a known kind to UTF-8
//! text. Errors abort processing of that document. The one soft failure is a
//! PDF page whose text cannot be extracted: it contributes nothing and is
//! logged.
//!
//! DOCX output covers every `<w:p>` in `word/document.xml`, including
//! paragraphs nested in table cells and text boxes, not only top-level body
//! paragraphs.

use std::io::Read;

use quick_xml::events::Event;
use ragdesk_core::models::{Document, DocumentKind};
use ragdesk_core::{AssistantError, Result};

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

const DOCX_BODY: &str = "word/document.xml";

/// Extract plain text from a document according to its declared kind.
pub fn extract_text(document: &Document) -> Result<String> {
    let text = match document.kind {
        DocumentKind::Pdf => extract_pdf(&document.bytes)?,
        DocumentKind::Docx => extract_docx(&document.bytes)?,
        DocumentKind::PlainText => decode_utf8(&document.bytes)?,
    };
    tracing::debug!(
        document = %document.name,
        kind = document.kind.as_str(),
        chars = text.chars().count(),
        "extracted text"
    );
    Ok(text)
}

fn decode_utf8(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| AssistantError::Decode(e.to_string()))
}

fn pdf_error(e: impl ToString) -> AssistantError {
    AssistantError::Extraction {
        kind: "PDF",
        message: e.to_string(),
    }
}

fn docx_error(e: impl ToString) -> AssistantError {
    AssistantError::Extraction {
        kind: "DOCX",
        message: e.to_string(),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let pdf = lopdf::Document::load_mem(bytes).map_err(pdf_error)?;
    let pages = pdf.get_pages();
    let mut out = String::new();
    for page_number in pages.keys() {
        match pdf.extract_text(&[*page_number]) {
            Ok(text) => out.push_str(&text),
            Err(e) => {
                tracing::warn!(page = page_number, error = %e, "no extractable text on PDF page");
            }
        }
    }
    Ok(out)
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>> {
    let entry = archive
        .by_name(name)
        .map_err(|e| docx_error(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(docx_error)?;
    if out.len() as u64 >= max_bytes {
        return Err(docx_error(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(docx_error)?;
    let xml = read_zip_entry_bounded(&mut archive, DOCX_BODY, MAX_XML_ENTRY_BYTES)?;
    docx_paragraphs(&xml)
}

/// Walk `word/document.xml`, emitting each paragraph followed by a newline.
///
/// Only character data inside `<w:t>` counts as text. Inside a `<w:r>` run,
/// `<w:tab/>` and `<w:br/>` map to a tab and a line break; outside a run
/// `<w:tab/>` is a tab-stop definition and is skipped. Table cells are
/// paragraphs too, so they come out in reading order.
fn docx_paragraphs(xml: &[u8]) -> Result<String> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();
    let mut in_text = false;
    let mut run_depth = 0usize;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"r" => run_depth += 1,
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"r" => run_depth = run_depth.saturating_sub(1),
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" if run_depth > 0 => out.push('\t'),
                b"br" | b"cr" if run_depth > 0 => out.push('\n'),
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t.unescape().map_err(docx_error)?;
                out.push_str(&text);
            }
            Ok(Event::CData(t)) if in_text => {
                out.push_str(&String::from_utf8_lossy(&t));
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(docx_error(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    fn docx_with_body(body: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file(DOCX_BODY, zip::write::SimpleFileOptions::default())
                .unwrap();
            let xml = format!(
                "<?xml version=\"1.0\"?><w:document xmlns:w=\"{}\"><w:body>{}</w:body></w:document>",
                W_NS, body
            );
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn test_plain_text_is_decoded() {
        let doc = Document::new("a.txt", DocumentKind::PlainText, "héllo\nworld".as_bytes().to_vec());
        assert_eq!(extract_text(&doc).unwrap(), "héllo\nworld");
    }

    #[test]
    fn test_invalid_utf8_is_a_decode_error() {
        let doc = Document::new("a.txt", DocumentKind::PlainText, vec![0x66, 0xff, 0xfe]);
        assert!(matches!(extract_text(&doc), Err(AssistantError::Decode(_))));
    }

    #[test]
    fn test_invalid_pdf_returns_error() {
        let doc = Document::new("a.pdf", DocumentKind::Pdf, b"not a pdf".to_vec());
        assert!(matches!(
            extract_text(&doc),
            Err(AssistantError::Extraction { kind: "PDF", .. })
        ));
    }

    #[test]
    fn test_invalid_zip_returns_error_for_docx() {
        let doc = Document::new("a.docx", DocumentKind::Docx, b"not a zip".to_vec());
        assert!(matches!(
            extract_text(&doc),
            Err(AssistantError::Extraction { kind: "DOCX", .. })
        ));
    }

    #[test]
    fn test_docx_without_body_is_an_error() {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("docProps/core.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(b"<x/>").unwrap();
            zip.finish().unwrap();
        }
        let doc = Document::new("a.docx", DocumentKind::Docx, buf);
        let err = extract_text(&doc).unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }

    #[test]
    fn test_docx_paragraphs_end_with_newline() {
        let body = "<w:p><w:r><w:t>First </w:t></w:r><w:r><w:t>line</w:t></w:r></w:p>\
                    <w:p/>\
                    <w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t></w:r></w:p>";
        let doc = Document::new("a.docx", DocumentKind::Docx, docx_with_body(body));
        assert_eq!(extract_text(&doc).unwrap(), "First line\n\na\tb\nc\n");
    }

    #[test]
    fn test_docx_ignores_text_outside_runs_and_unescapes() {
        let body = "<w:p><w:pPr><w:pStyle w:val=\"Heading1\"/></w:pPr>\
                    <w:r><w:t>Fish &amp; chips</w:t></w:r></w:p>";
        let doc = Document::new("a.docx", DocumentKind::Docx, docx_with_body(body));
        assert_eq!(extract_text(&doc).unwrap(), "Fish & chips\n");
    }

    #[test]
    fn test_docx_tab_stop_definitions_are_not_text() {
        let body = "<w:p><w:pPr><w:tabs>\
                    <w:tab w:val=\"left\" w:pos=\"720\"/>\
                    <w:tab w:val=\"right\" w:pos=\"9000\"/>\
                    </w:tabs></w:pPr>\
                    <w:r><w:t>Heading</w:t><w:tab/><w:t>1</w:t></w:r></w:p>";
        let doc = Document::new("a.docx", DocumentKind::Docx, docx_with_body(body));
        assert_eq!(extract_text(&doc).unwrap(), "Heading\t1\n");
    }

    #[test]
    fn test_docx_table_cells_are_read_in_order() {
        let body = "<w:tbl><w:tr>\
                    <w:tc><w:p><w:r><w:t>left</w:t></w:r></w:p></w:tc>\
                    <w:tc><w:p><w:r><w:t>right</w:t></w:r></w:p></w:tc>\
                    </w:tr></w:tbl>";
        let doc = Document::new("a.docx", DocumentKind::Docx, docx_with_body(body));
        assert_eq!(extract_text(&doc).unwrap(), "left\nright\n");
    }
}
