//! The `document` worker: read, compare and convert text documents.
//!
//! Binary formats (PDF, DOCX, spreadsheets other than CSV/TSV) are recognised
//! but refused with `INVALID_PARAMS`; there is no extractor for them here.

mod convert_format;
mod diff_documents;
mod extract_text;
mod read_spreadsheet;

use std::path::Path;

use regex::Regex;

pub use convert_format::ConvertFormat;
pub use diff_documents::DiffDocuments;
pub use extract_text::ExtractText;
pub use read_spreadsheet::ReadSpreadsheet;

use crate::error::ToolError;
use crate::mcp::registry::ToolRegistryBuilder;
use crate::sandbox::Sandbox;

/// Formats that are read byte-for-byte as UTF-8.
const PLAIN_TEXT_EXTENSIONS: &[&str] = &["txt", "md", "csv", "tsv", "log"];

/// Formats that need a binary extractor this build does not carry.
const UNSUPPORTED_BINARY_EXTENSIONS: &[&str] = &["pdf", "docx", "doc", "xlsx", "xls"];

/// Adds the document tools, in manifest order.
///
/// # Errors
///
/// Returns an error if the HTML-stripping patterns fail to compile.
pub fn register(
    builder: ToolRegistryBuilder,
    sandbox: &Sandbox,
) -> Result<ToolRegistryBuilder, regex::Error> {
    let html = HtmlStripper::new()?;
    Ok(builder
        .tool(ExtractText::new(sandbox.clone(), html.clone()))
        .tool(ReadSpreadsheet::new(sandbox.clone()))
        .tool(DiffDocuments::new(sandbox.clone(), html.clone()))
        .tool(ConvertFormat::new(sandbox.clone(), html)))
}

/// Removes markup from HTML, leaving whitespace-collapsed text.
#[derive(Debug, Clone)]
pub struct HtmlStripper {
    script: Regex,
    style: Regex,
    tag: Regex,
    whitespace: Regex,
}

impl HtmlStripper {
    /// Compiles the stripping patterns.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern fails to compile.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            script: Regex::new(r"(?is)<script[^>]*>.*?</script>")?,
            style: Regex::new(r"(?is)<style[^>]*>.*?</style>")?,
            tag: Regex::new(r"<[^>]+>")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    /// Strips scripts, styles and tags, then collapses whitespace.
    #[must_use]
    pub fn strip(&self, html: &str) -> String {
        let text = self.script.replace_all(html, "");
        let text = self.style.replace_all(&text, "");
        let text = self.tag.replace_all(&text, " ");
        self.whitespace.replace_all(&text, " ").trim().to_string()
    }
}

/// Fails with `FILE_NOT_FOUND` unless `path` exists.
fn ensure_exists(path: &Path, original: &str) -> Result<(), ToolError> {
    if path.exists() {
        Ok(())
    } else {
        Err(ToolError::file_not_found(format!("File not found: {original}")))
    }
}

/// Fails with `INVALID_PARAMS` for formats without an extractor.
fn ensure_text_format(ext: Option<&str>) -> Result<(), ToolError> {
    match ext {
        Some(ext) if UNSUPPORTED_BINARY_EXTENSIONS.contains(&ext) => Err(
            ToolError::invalid_params(format!(
                "Unsupported document format: .{ext}. Supported: .txt, .md, .csv, .tsv, .log, .html, .htm"
            )),
        ),
        _ => Ok(()),
    }
}

/// Reads a file as strict UTF-8, prefixing failures with `action`.
fn read_utf8(path: &Path, action: &str) -> Result<String, ToolError> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => {
            ToolError::permission_denied(format!("Permission denied: {}", path.display()))
        }
        _ => ToolError::internal(format!("Failed to {action}: {e}")),
    })
}

/// Reads any supported document as plain text.
///
/// HTML is stripped to text, everything else is read as UTF-8.
fn read_document_text(
    path: &Path,
    html: &HtmlStripper,
    action: &str,
) -> Result<String, ToolError> {
    let ext = crate::sandbox::extension_lowercase(path);
    ensure_text_format(ext.as_deref())?;

    let text = read_utf8(path, action)?;
    match ext.as_deref() {
        Some("html" | "htm") => Ok(html.strip(&text)),
        _ => Ok(text),
    }
}
