//! Integration tests for document support: PDF, DOCX and plain text
//! extraction, type detection from upload names, and chunking of the result.

use std::io::Write;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream};

use ragdesk::config::Config;
use ragdesk::core::chunk::{chunk_text, reconstruct};
use ragdesk::core::models::{Document, DocumentKind};
use ragdesk::core::AssistantError;
use ragdesk::extract::extract_text;

/// PDF with one page per phrase, each drawn with a single `Tj`.
fn pdf_with_pages(phrases: &[&str]) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for phrase in phrases {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![100.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*phrase)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// Minimal docx (ZIP) with one `<w:p>` per paragraph.
fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", p))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}

#[test]
fn test_pdf_pages_are_extracted_in_order() {
    let bytes = pdf_with_pages(&["first page phrase", "second page phrase"]);
    let doc = Document::from_upload("report.pdf", bytes).unwrap();
    assert_eq!(doc.kind, DocumentKind::Pdf);

    let text = extract_text(&doc).unwrap();
    let first = text.find("first page phrase").expect("first page text");
    let second = text.find("second page phrase").expect("second page text");
    assert!(first < second);
}

#[test]
fn test_pdf_page_without_text_keeps_page_order() {
    let bytes = pdf_with_pages(&["first page phrase", "", "third page phrase"]);
    let doc = Document::from_upload("gaps.pdf", bytes).unwrap();

    let text = extract_text(&doc).unwrap();
    let first = text.find("first page phrase").expect("first page text");
    let third = text.find("third page phrase").expect("third page text");
    assert!(first < third);
}

#[test]
fn test_truncated_pdf_is_an_extraction_error() {
    let bytes = pdf_with_pages(&["phrase"]);
    let doc = Document::new("cut.pdf", DocumentKind::Pdf, bytes[..20].to_vec());
    assert!(matches!(
        extract_text(&doc),
        Err(AssistantError::Extraction { kind: "PDF", .. })
    ));
}

#[test]
fn test_docx_paragraphs_are_newline_terminated() {
    let bytes = docx_with_paragraphs(&["office test phrase", "  indented second"]);
    let doc = Document::from_upload("Notes.DOCX", bytes).unwrap();
    assert_eq!(doc.kind, DocumentKind::Docx);
    assert_eq!(
        extract_text(&doc).unwrap(),
        "office test phrase\n  indented second\n"
    );
}

#[test]
fn test_plain_text_round_trips_through_chunking() {
    let text = "line one\n".repeat(300);
    let doc = Document::from_upload("notes.txt", text.clone().into_bytes()).unwrap();
    let extracted = extract_text(&doc).unwrap();
    assert_eq!(extracted, text);

    let cfg = Config::minimal();
    let segments = chunk_text(&extracted, &cfg.chunking.options());
    assert!(segments.len() > 1);
    assert!(segments.iter().all(|s| s.text.chars().count() <= 1000));
    assert_eq!(reconstruct(&segments), text);
}

#[test]
fn test_unsupported_types_are_rejected_before_extraction() {
    for name in ["sheet.xlsx", "slides.pptx", "README", "archive.tar.gz"] {
        let err = Document::from_upload(name, b"irrelevant".to_vec()).unwrap_err();
        assert!(
            matches!(err, AssistantError::UnsupportedType(_)),
            "{name}: {err}"
        );
    }
}

#[test]
fn test_mime_types_map_to_kinds() {
    assert_eq!(
        DocumentKind::from_mime("application/pdf").unwrap(),
        DocumentKind::Pdf
    );
    assert_eq!(
        DocumentKind::from_mime("text/plain; charset=utf-8").unwrap(),
        DocumentKind::PlainText
    );
    assert!(DocumentKind::from_mime("image/png").is_err());
}
