//! services/api/src/adapters/extract.rs
//!
//! Text extraction for the supported upload formats. Parsing is CPU-bound, so
//! every document is handled on the blocking thread pool.

use async_trait::async_trait;
use bytes::Bytes;
use nexus_chat_core::formats::DocumentFormat;
use nexus_chat_core::ports::{DocumentExtractor, PortError, PortResult};
use regex::Regex;
use std::io::{Cursor, Read};
use tracing::{info, instrument};
use zip::ZipArchive;

#[derive(Clone, Copy, Debug, Default)]
pub struct FileTextExtractor;

#[async_trait]
impl DocumentExtractor for FileTextExtractor {
    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn extract(&self, format: DocumentFormat, data: Bytes) -> PortResult<String> {
        let text = tokio::task::spawn_blocking(move || extract_sync(format, &data))
            .await
            .map_err(|e| PortError::Unsupported(format!("the {format} parser crashed: {e}")))??;
        info!("Extracted {} characters from {format} document", text.len());
        Ok(text)
    }
}

/// Extracts plain text from `data` interpreted as `format`.
pub fn extract_sync(format: DocumentFormat, data: &[u8]) -> PortResult<String> {
    match format {
        DocumentFormat::Txt | DocumentFormat::Md => Ok(decode_text(data)),
        DocumentFormat::Csv => extract_csv(data),
        DocumentFormat::Pdf => pdf_extract::extract_text_from_mem(data)
            .map_err(|e| PortError::Unsupported(format!("could not read PDF: {e}"))),
        DocumentFormat::Docx => extract_docx(data),
        DocumentFormat::Doc => extract_docx(data).map_err(|_| {
            PortError::Unsupported(
                "legacy binary .doc files cannot be read; save the document as .docx".to_string(),
            )
        }),
        DocumentFormat::Pptx => extract_pptx(data),
    }
}

/// UTF-8, falling back to Latin-1 (every byte maps to one code point).
fn decode_text(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.trim_start_matches('\u{feff}').to_string(),
        Err(_) => data.iter().map(|&b| b as char).collect(),
    }
}

fn extract_csv(data: &[u8]) -> PortResult<String> {
    let text = decode_text(data);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut lines = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| PortError::Unsupported(format!("invalid CSV: {e}")))?;
        let fields: Vec<&str> = record.iter().map(str::trim).collect();
        if fields.iter().any(|f| !f.is_empty()) {
            lines.push(fields.join(", "));
        }
    }
    Ok(lines.join("\n"))
}

//=========================================================================================
// Office Open XML
//=========================================================================================

fn open_archive(data: &[u8]) -> PortResult<ZipArchive<Cursor<&[u8]>>> {
    ZipArchive::new(Cursor::new(data))
        .map_err(|e| PortError::Unsupported(format!("not an Office Open XML document: {e}")))
}

fn read_entry(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> PortResult<String> {
    let mut entry = archive
        .by_name(name)
        .map_err(|e| PortError::Unsupported(format!("missing {name}: {e}")))?;
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| PortError::Unsupported(format!("unreadable {name}: {e}")))?;
    Ok(xml)
}

/// Pulls paragraph text out of WordprocessingML and DrawingML parts.
struct XmlText {
    paragraph: Regex,
    run: Regex,
}

impl XmlText {
    fn new() -> PortResult<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| PortError::Unexpected(format!("bad pattern: {e}")))
        };
        Ok(Self {
            paragraph: compile(r"(?s)<(w|a):p[ >].*?</(w|a):p>")?,
            run: compile(r"(?s)<(w|a):t(?: [^>]*)?>(.*?)</(w|a):t>")?,
        })
    }

    /// Joins the text runs of each paragraph; one output line per non-empty paragraph.
    /// Table cells are paragraphs too, so tables come out one cell per line.
    fn paragraphs(&self, xml: &str) -> Vec<String> {
        self.paragraph
            .find_iter(xml)
            .map(|paragraph| {
                self.run
                    .captures_iter(paragraph.as_str())
                    .filter_map(|run| run.get(2))
                    .map(|text| unescape_xml(text.as_str()))
                    .collect::<String>()
            })
            .filter(|line| !line.trim().is_empty())
            .collect()
    }
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn extract_docx(data: &[u8]) -> PortResult<String> {
    let mut archive = open_archive(data)?;
    let xml = read_entry(&mut archive, "word/document.xml")?;
    Ok(XmlText::new()?.paragraphs(&xml).join("\n"))
}

fn extract_pptx(data: &[u8]) -> PortResult<String> {
    let mut archive = open_archive(data)?;

    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let number = name
                .strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?
                .parse()
                .ok()?;
            Some((number, name.to_string()))
        })
        .collect();
    slides.sort();

    let parser = XmlText::new()?;
    let mut text = Vec::new();
    for (_, name) in slides {
        let xml = read_entry(&mut archive, &name)?;
        text.extend(parser.paragraphs(&xml));
    }
    Ok(text.join("\n"))
}
