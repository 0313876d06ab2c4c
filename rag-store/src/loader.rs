//! Document loaders: PDF, DOCX and legacy DOC into ordered chunks.
//!
//! - PDF: one chunk per page that carries text (`page` metadata, 1-based).
//! - DOCX: paragraphs of `word/document.xml`, joined into one body chunk.
//! - DOC: read as DOCX when the bytes are really an OOXML zip (common for
//!   renamed files); otherwise the legacy OLE container is scanned for
//!   UTF-16LE text runs.
//!
//! Every chunk carries `source`, `kind` and `sha256` (of the whole upload).

use std::io::{Cursor, Read};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::json;
use tracing::{debug, warn};

use crate::errors::RagError;
use crate::normalize::clean_text;
use crate::record::{Chunk, meta};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
/// Shortest UTF-16 run kept by the legacy DOC scan.
const MIN_DOC_RUN: usize = 4;

/// Accepted upload type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Doc,
    Docx,
}

impl DocumentKind {
    /// Resolves the kind from the file extension (case-insensitive).
    ///
    /// # Errors
    /// [`RagError::UnsupportedFormat`] for anything but `pdf`, `doc`, `docx`.
    pub fn from_file_name(name: &str) -> Result<Self, RagError> {
        let ext = std::path::Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("pdf") => Ok(DocumentKind::Pdf),
            Some("doc") => Ok(DocumentKind::Doc),
            Some("docx") => Ok(DocumentKind::Docx),
            Some(other) => Err(RagError::UnsupportedFormat(format!(".{other}"))),
            None => Err(RagError::UnsupportedFormat(String::new())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Doc => "doc",
            DocumentKind::Docx => "docx",
        }
    }
}

/// Parses an uploaded document into ordered, cleaned chunks.
///
/// # Errors
/// - [`RagError::UnsupportedFormat`] for an unknown extension
/// - [`RagError::Read`] if the container cannot be parsed or holds no text
pub fn load_document(file_name: &str, bytes: &[u8]) -> Result<Vec<Chunk>, RagError> {
    let kind = DocumentKind::from_file_name(file_name)?;
    if bytes.is_empty() {
        return Err(RagError::Read("the uploaded file is empty".into()));
    }

    let segments: Vec<(Option<u32>, String)> = match kind {
        DocumentKind::Pdf => pdf_pages(bytes)?
            .into_iter()
            .map(|(page, text)| (Some(page), text))
            .collect(),
        DocumentKind::Docx => vec![(None, docx_text(bytes)?)],
        DocumentKind::Doc if bytes.starts_with(ZIP_MAGIC) => vec![(None, docx_text(bytes)?)],
        DocumentKind::Doc => vec![(None, legacy_doc_text(bytes)?)],
    };

    let sha = services::hash::sha_hex(bytes);
    let chunks: Vec<Chunk> = segments
        .into_iter()
        .filter_map(|(page, raw)| {
            let text = clean_text(&raw);
            if text.is_empty() {
                return None;
            }
            let mut chunk = Chunk::new(text)
                .with(meta::SOURCE, file_name)
                .with(meta::KIND, kind.as_str())
                .with(meta::SHA256, sha.clone());
            if let Some(p) = page {
                chunk = chunk.with(meta::PAGE, json!(p));
            }
            Some(chunk)
        })
        .collect();

    if chunks.is_empty() {
        return Err(RagError::Read(
            "document contains no extractable text".into(),
        ));
    }
    debug!(source = %file_name, kind = kind.as_str(), chunks = chunks.len(), "document loaded");
    Ok(chunks)
}

/// Page texts in page order.
fn pdf_pages(bytes: &[u8]) -> Result<Vec<(u32, String)>, RagError> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| RagError::Read(format!("not a readable PDF: {e}")))?;
    if doc.is_encrypted() {
        return Err(RagError::Read("encrypted PDFs are not supported".into()));
    }

    let mut out = Vec::new();
    for page in doc.get_pages().keys().copied() {
        match doc.extract_text(&[page]) {
            Ok(text) => out.push((page, text)),
            Err(e) => warn!(page, error = %e, "skipping PDF page without extractable text"),
        }
    }
    Ok(out)
}

static DOCX_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab\s*/>|<w:br\s*/>|<w:cr\s*/>|</w:p>")
        .expect("literal regex")
});
static XML_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(amp|lt|gt|quot|apos|#x[0-9A-Fa-f]+|#[0-9]+);").expect("literal regex"));

/// Body text of an OOXML word document, one line per paragraph.
fn docx_text(bytes: &[u8]) -> Result<String, RagError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| RagError::Read(format!("not a readable Word document: {e}")))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| RagError::Read(format!("missing word/document.xml: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| RagError::Read(format!("unreadable word/document.xml: {e}")))?;
    Ok(docx_xml_to_text(&xml))
}

fn docx_xml_to_text(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len() / 4);
    for cap in DOCX_TOKEN.captures_iter(xml) {
        match cap.get(1) {
            Some(run) => out.push_str(&decode_entities(run.as_str())),
            None => match cap.get(0).map(|m| m.as_str()) {
                Some("</w:p>") => out.push('\n'),
                Some(tag) if tag.starts_with("<w:tab") => out.push('\t'),
                _ => out.push('\n'),
            },
        }
    }
    out
}

fn decode_entities(s: &str) -> String {
    XML_ENTITY
        .replace_all(s, |c: &regex::Captures<'_>| {
            let name = &c[1];
            let decoded = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => {
                    let n = match name.strip_prefix("#x") {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => name[1..].parse::<u32>().ok(),
                    };
                    n.and_then(char::from_u32)
                }
            };
            decoded.map(String::from).unwrap_or_default()
        })
        .into_owned()
}

/// Text runs of a legacy Word 97-2003 binary.
///
/// Word stores body text as UTF-16LE in the WordDocument stream; runs of
/// printable code units are collected in order.
fn legacy_doc_text(bytes: &[u8]) -> Result<String, RagError> {
    if !bytes.starts_with(OLE_MAGIC) {
        return Err(RagError::Read("not a Word 97-2003 document".into()));
    }

    let mut out = String::new();
    let mut run = String::new();
    for pair in bytes.chunks_exact(2) {
        let unit = u16::from_le_bytes([pair[0], pair[1]]);
        match char::from_u32(u32::from(unit)) {
            Some(c) if is_text_char(c) => run.push(c),
            Some('\r') | Some('\n') if !run.is_empty() => run.push('\n'),
            _ => flush_run(&mut run, &mut out),
        }
    }
    flush_run(&mut run, &mut out);
    Ok(out)
}

fn is_text_char(c: char) -> bool {
    (c == '\t' || !c.is_control()) && c != '\u{FFFD}' && !('\u{E000}'..='\u{F8FF}').contains(&c)
}

fn flush_run(run: &mut String, out: &mut String) {
    let visible = run.chars().filter(|c| c.is_alphanumeric()).count();
    if visible >= MIN_DOC_RUN {
        out.push_str(run.trim());
        out.push('\n');
    }
    run.clear();
}
