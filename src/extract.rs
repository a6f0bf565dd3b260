//! Multi-format text extraction for educational documents.
//!
//! Maps a file's detected format to an extraction routine. Extractors are
//! pure over the input bytes: no network calls, no mutation of the source.
//! The format set is a closed enumeration; anything outside it is rejected
//! at validation with an unsupported-format error.

use std::io::Read;

use pulldown_cmark::{Event, Parser, TagEnd};

use crate::error::{PipelineError, PipelineResult};

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Supported file formats. Extension set is closed; see [`FileFormat::from_extension`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Pdf,
    Docx,
    /// Legacy .doc; handled by the DOCX extractor, matching upstream behavior.
    Doc,
    Text,
    Markdown,
    Html,
    Csv,
    Json,
    Yaml,
}

impl FileFormat {
    /// Resolve a lower-cased extension (with leading dot) to a format.
    pub fn from_extension(ext: &str) -> Option<FileFormat> {
        match ext {
            ".pdf" => Some(FileFormat::Pdf),
            ".docx" => Some(FileFormat::Docx),
            ".doc" => Some(FileFormat::Doc),
            ".txt" => Some(FileFormat::Text),
            ".md" => Some(FileFormat::Markdown),
            ".html" => Some(FileFormat::Html),
            ".csv" => Some(FileFormat::Csv),
            ".json" => Some(FileFormat::Json),
            ".yaml" | ".yml" => Some(FileFormat::Yaml),
            _ => None,
        }
    }

    /// Human-readable format label carried in file metadata.
    pub fn label(&self) -> &'static str {
        match self {
            FileFormat::Pdf => "PDF Document",
            FileFormat::Docx => "Word Document",
            FileFormat::Doc => "Word Document (Legacy)",
            FileFormat::Text => "Text File",
            FileFormat::Markdown => "Markdown File",
            FileFormat::Html => "HTML File",
            FileFormat::Csv => "CSV Data File",
            FileFormat::Json => "JSON Data File",
            FileFormat::Yaml => "YAML Configuration",
        }
    }

    /// Every supported extension, used for directory scans and help output.
    pub fn extensions() -> &'static [&'static str] {
        &[
            ".pdf", ".docx", ".doc", ".txt", ".md", ".html", ".csv", ".json", ".yaml", ".yml",
        ]
    }
}

/// Extract plain UTF-8 text from file bytes.
///
/// Whitespace-only output is a hard failure: an ingested document must carry
/// visible text.
pub fn extract_text(format: FileFormat, bytes: &[u8]) -> PipelineResult<String> {
    let text = match format {
        FileFormat::Pdf => extract_pdf(bytes)?,
        FileFormat::Docx | FileFormat::Doc => extract_docx(bytes)?,
        FileFormat::Text => extract_txt(bytes)?,
        FileFormat::Markdown => extract_markdown(bytes)?,
        FileFormat::Html => extract_html(bytes)?,
        FileFormat::Csv => extract_csv(bytes)?,
        FileFormat::Json => extract_json(bytes)?,
        FileFormat::Yaml => extract_yaml(bytes)?,
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::ExtractionFailed(
            "no text content extracted from file".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

fn extract_pdf(bytes: &[u8]) -> PipelineResult<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| PipelineError::ExtractionFailed(format!("PDF: {}", e)))
}

fn extract_txt(bytes: &[u8]) -> PipelineResult<String> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| PipelineError::ExtractionFailed(format!("not valid UTF-8: {}", e)))?;
    Ok(text.to_string())
}

/// DOCX: unpack `word/document.xml`, collect `w:t` runs, newline per paragraph.
fn extract_docx(bytes: &[u8]) -> PipelineResult<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| PipelineError::ExtractionFailed(format!("OOXML: {}", e)))?;

    let mut doc_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|_| PipelineError::ExtractionFailed("word/document.xml not found".to_string()))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut doc_xml)
            .map_err(|e| PipelineError::ExtractionFailed(format!("OOXML: {}", e)))?;
        if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
            return Err(PipelineError::ExtractionFailed(
                "word/document.xml exceeds size limit".to_string(),
            ));
        }
    }

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(doc_xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_text_run = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text_run = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_text_run => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => {
                match e.local_name().as_ref() {
                    b"t" => in_text_run = false,
                    // paragraph boundary
                    b"p" => out.push('\n'),
                    _ => {}
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(PipelineError::ExtractionFailed(format!("OOXML: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// Markdown: walk the event stream and keep only visible text.
fn extract_markdown(bytes: &[u8]) -> PipelineResult<String> {
    let source = std::str::from_utf8(bytes)
        .map_err(|e| PipelineError::ExtractionFailed(format!("not valid UTF-8: {}", e)))?;

    let mut out = String::new();
    for event in Parser::new(source) {
        match event {
            Event::Text(t) | Event::Code(t) => out.push_str(&t),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            // block-level ends separate visible text; inline ends (emphasis,
            // links) must not split a sentence
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::List(_)
                | TagEnd::CodeBlock
                | TagEnd::Table
                | TagEnd::TableRow
                | TagEnd::HtmlBlock,
            ) => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
    Ok(out)
}

/// HTML: strip all markup, keep visible text; script and style bodies dropped.
///
/// Runs quick-xml in a lenient configuration since real-world HTML is rarely
/// well-formed XML.
fn extract_html(bytes: &[u8]) -> PipelineResult<String> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(bytes);
    let config = reader.config_mut();
    config.trim_text(true);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut buf = Vec::new();
    let mut skip_depth = 0u32;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"script" || name.as_ref() == b"style" {
                    skip_depth += 1;
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                let name = e.local_name();
                if (name.as_ref() == b"script" || name.as_ref() == b"style") && skip_depth > 0 {
                    skip_depth -= 1;
                } else if is_block_tag(name.as_ref()) && !out.ends_with('\n') && !out.is_empty() {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if skip_depth == 0 => {
                let text = te.unescape().unwrap_or_default();
                if !text.trim().is_empty() {
                    if !out.is_empty() && !out.ends_with(char::is_whitespace) {
                        out.push(' ');
                    }
                    out.push_str(text.trim());
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(PipelineError::ExtractionFailed(format!("HTML: {}", e))),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn is_block_tag(name: &[u8]) -> bool {
    matches!(
        name,
        b"p" | b"div"
            | b"li"
            | b"tr"
            | b"h1"
            | b"h2"
            | b"h3"
            | b"h4"
            | b"h5"
            | b"h6"
            | b"br"
            | b"section"
            | b"article"
    )
}

/// CSV: row/column summary line, the column names, then a whitespace-aligned dump.
fn extract_csv(bytes: &[u8]) -> PipelineResult<String> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| PipelineError::ExtractionFailed(format!("CSV: {}", e)))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| PipelineError::ExtractionFailed(format!("CSV: {}", e)))?;
        rows.push(record.iter().map(|f| f.to_string()).collect());
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, field) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(field.len());
            } else {
                widths.push(field.len());
            }
        }
    }

    let mut out = format!(
        "CSV Data with {} rows and {} columns:\n\n",
        rows.len(),
        headers.len()
    );
    out.push_str(&format!("Columns: {}\n\n", headers.join(", ")));
    out.push_str(&format_row(&headers, &widths));
    for row in &rows {
        out.push_str(&format_row(row, &widths));
    }
    Ok(out)
}

fn format_row(fields: &[String], widths: &[usize]) -> String {
    let mut line = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            line.push_str("  ");
        }
        let width = widths.get(i).copied().unwrap_or(field.len());
        line.push_str(&format!("{:<width$}", field, width = width));
    }
    line.push('\n');
    line
}

/// JSON: pretty-print with stable 2-space indentation, non-ASCII preserved.
fn extract_json(bytes: &[u8]) -> PipelineResult<String> {
    let value: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| PipelineError::ExtractionFailed(format!("JSON: {}", e)))?;
    serde_json::to_string_pretty(&value)
        .map_err(|e| PipelineError::ExtractionFailed(format!("JSON: {}", e)))
}

/// YAML: parse then re-serialize in block style, non-ASCII preserved.
fn extract_yaml(bytes: &[u8]) -> PipelineResult<String> {
    let value: serde_yaml::Value = serde_yaml::from_slice(bytes)
        .map_err(|e| PipelineError::ExtractionFailed(format!("YAML: {}", e)))?;
    serde_yaml::to_string(&value)
        .map_err(|e| PipelineError::ExtractionFailed(format!("YAML: {}", e)))
}
