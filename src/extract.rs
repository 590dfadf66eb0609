//! Multi-format text extraction for course documents.
//!
//! Every supported format is turned into an ordered list of plain UTF-8
//! pages. What a "page" means depends on the format:
//!
//! | Format | Pages |
//! |--------|-------|
//! | PDF | one per PDF page |
//! | PPTX | one per slide, in slide order |
//! | DOCX | one, paragraphs separated by blank lines |
//! | HTML | one, visible body text |
//! | TXT | one, the whole file |
//!
//! Extraction never panics on bad input by itself; it returns an
//! [`ExtractError`] and the caller decides whether to skip the file.

use std::io::Read;

use scraper::{Html, Node, Selector};

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Elements whose text is never shown to a reader.
const HTML_HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// The document formats the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Pdf,
    Txt,
    Docx,
    Pptx,
    Html,
}

impl DocumentFormat {
    /// Every supported format, in the order extensions are usually listed.
    pub const ALL: [DocumentFormat; 5] = [
        DocumentFormat::Pdf,
        DocumentFormat::Txt,
        DocumentFormat::Docx,
        DocumentFormat::Pptx,
        DocumentFormat::Html,
    ];

    /// Resolve a file extension (with or without the leading dot), case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "txt" => Some(DocumentFormat::Txt),
            "docx" => Some(DocumentFormat::Docx),
            "pptx" => Some(DocumentFormat::Pptx),
            "html" => Some(DocumentFormat::Html),
            _ => None,
        }
    }

    /// Resolve the format of a path from its extension.
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(DocumentFormat::from_extension)
    }

    /// Canonical lowercase extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Txt => "txt",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Pptx => "pptx",
            DocumentFormat::Html => "html",
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Format-level extraction failure.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
    #[error("HTML extraction failed: {0}")]
    Html(String),
    #[error("text is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Extract the ordered pages of a document held in memory.
pub fn extract_pages(bytes: &[u8], format: DocumentFormat) -> Result<Vec<String>, ExtractError> {
    match format {
        DocumentFormat::Pdf => extract_pdf(bytes),
        DocumentFormat::Txt => extract_txt(bytes).map(|t| vec![t]),
        DocumentFormat::Docx => extract_docx(bytes).map(|t| vec![t]),
        DocumentFormat::Pptx => extract_pptx(bytes),
        DocumentFormat::Html => extract_html(bytes).map(|t| vec![t]),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_txt(bytes: &[u8]) -> Result<String, ExtractError> {
    let text = String::from_utf8(bytes.to_vec())?;
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn open_archive(bytes: &[u8]) -> Result<zip::ZipArchive<std::io::Cursor<&[u8]>>, ExtractError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let doc_xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    let paragraphs = extract_paragraphs(&doc_xml)?;
    Ok(paragraphs.join("\n\n"))
}

fn extract_pptx(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let mut slide_names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    if slide_names.is_empty() {
        return Err(ExtractError::Ooxml("presentation has no slides".to_string()));
    }
    slide_names.sort_by_key(|name| {
        name.trim_start_matches("ppt/slides/slide")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    let mut slides = Vec::with_capacity(slide_names.len());
    for name in slide_names {
        let xml = read_zip_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)?;
        slides.push(extract_paragraphs(&xml)?.join("\n"));
    }
    Ok(slides)
}

/// Collect the text runs (`<w:t>` / `<a:t>`) of an OOXML part, one string per
/// paragraph (`<w:p>` / `<a:p>`). Empty paragraphs are dropped.
fn extract_paragraphs(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    use quick_xml::events::Event;

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let para = current.trim();
                    if !para.is_empty() {
                        paragraphs.push(para.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    let tail = current.trim();
    if !tail.is_empty() {
        paragraphs.push(tail.to_string());
    }
    Ok(paragraphs)
}

fn extract_html(bytes: &[u8]) -> Result<String, ExtractError> {
    let source = extract_txt(bytes)?;
    let document = Html::parse_document(&source);
    let body_selector =
        Selector::parse("body").map_err(|e| ExtractError::Html(format!("{:?}", e)))?;
    let root = document
        .select(&body_selector)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut lines = Vec::new();
    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map(|el| HTML_HIDDEN_TAGS.contains(&el.name()))
                .unwrap_or(false)
        });
        if hidden {
            continue;
        }
        let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !line.is_empty() {
            lines.push(line);
        }
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_with(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            for (name, body) in entries {
                zip.start_file(*name, zip::write::SimpleFileOptions::default())
                    .unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn format_from_extension_is_case_insensitive() {
        assert_eq!(DocumentFormat::from_extension("PDF"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_extension(".Docx"), Some(DocumentFormat::Docx));
        assert_eq!(DocumentFormat::from_extension("htm"), None);
        assert_eq!(DocumentFormat::from_extension("xyz"), None);
    }

    #[test]
    fn txt_is_one_page() {
        let pages = extract_pages(b"\xef\xbb\xbfHello there", DocumentFormat::Txt).unwrap();
        assert_eq!(pages, vec!["Hello there".to_string()]);
    }

    #[test]
    fn invalid_utf8_text_returns_error() {
        let err = extract_pages(&[0xff, 0xfe, 0x00, 0xd8], DocumentFormat::Txt).unwrap_err();
        assert!(matches!(err, ExtractError::Encoding(_)));
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_pages(b"not a pdf", DocumentFormat::Pdf).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn invalid_zip_returns_error_for_docx() {
        let err = extract_pages(b"not a zip", DocumentFormat::Docx).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[test]
    fn docx_paragraphs_become_blank_line_separated() {
        let xml = r#"<?xml version="1.0"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>Remote </w:t></w:r><w:r><w:t>procedure calls</w:t></w:r></w:p><w:p/><w:p><w:r><w:t>Sockets &amp; ports</w:t></w:r></w:p></w:body></w:document>"#;
        let bytes = zip_with(&[("word/document.xml", xml)]);
        let pages = extract_pages(&bytes, DocumentFormat::Docx).unwrap();
        assert_eq!(pages, vec!["Remote procedure calls\n\nSockets & ports".to_string()]);
    }

    #[test]
    fn docx_without_body_part_is_an_error() {
        let bytes = zip_with(&[("word/styles.xml", "<w:styles/>")]);
        let err = extract_pages(&bytes, DocumentFormat::Docx).unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }

    #[test]
    fn pptx_slides_are_pages_in_numeric_order() {
        let slide = |t: &str| {
            format!(
                r#"<p:sld xmlns:p="p" xmlns:a="a"><p:cSld><p:spTree><p:sp><p:txBody><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#,
                t
            )
        };
        let s1 = slide("First slide");
        let s2 = slide("Second slide");
        let s10 = slide("Tenth slide");
        let bytes = zip_with(&[
            ("ppt/slides/slide10.xml", &s10),
            ("ppt/slides/slide2.xml", &s2),
            ("ppt/slides/slide1.xml", &s1),
        ]);
        let pages = extract_pages(&bytes, DocumentFormat::Pptx).unwrap();
        assert_eq!(pages, vec!["First slide", "Second slide", "Tenth slide"]);
    }

    #[test]
    fn html_skips_scripts_and_styles() {
        let html = b"<html><head><title>T</title><style>p{}</style></head><body><h1>Lab 2</h1><script>var x=1;</script><p>Use   <b>fork</b> wisely.</p></body></html>";
        let pages = extract_pages(html, DocumentFormat::Html).unwrap();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].contains("Lab 2"));
        assert!(pages[0].contains("fork"));
        assert!(!pages[0].contains("var x"));
        assert!(!pages[0].contains("p{}"));
    }
}
