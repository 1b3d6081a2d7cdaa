//! `document.extract_text`

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{ensure_exists, ensure_text_format, read_utf8, HtmlStripper, PLAIN_TEXT_EXTENSIONS};
use crate::error::ToolError;
use crate::mcp::registry::Tool;
use crate::sandbox::{extension_lowercase, file_category, Sandbox};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractTextParams {
    path: String,
}

#[derive(Debug, Serialize)]
pub struct ExtractTextOutput {
    text: String,
    format: String,
    pages: Option<u32>,
}

/// Extracts plain text from a document.
#[derive(Debug)]
pub struct ExtractText {
    sandbox: Sandbox,
    html: HtmlStripper,
}

impl ExtractText {
    #[must_use]
    pub const fn new(sandbox: Sandbox, html: HtmlStripper) -> Self {
        Self { sandbox, html }
    }
}

impl Tool for ExtractText {
    type Params = ExtractTextParams;
    type Output = ExtractTextOutput;

    const NAME: &'static str = "document.extract_text";
    const DESCRIPTION: &'static str =
        "Extract plain text from a document (TXT, MD, CSV, TSV, LOG, HTML)";

    fn params_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute path to the document"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    fn result_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string" },
                "format": {
                    "type": "string",
                    "description": "Detected format: the file extension, 'html', or 'text' for anything else"
                },
                "pages": { "type": ["integer", "null"] }
            },
            "required": ["text", "format", "pages"]
        })
    }

    fn execute(&self, params: ExtractTextParams) -> Result<ExtractTextOutput, ToolError> {
        let path = self.sandbox.check_param(&params.path, "path")?;
        ensure_exists(&path, &params.path)?;

        let ext = extension_lowercase(&path);
        ensure_text_format(ext.as_deref())?;
        if let category @ ("image" | "audio" | "video" | "archive") = file_category(&path) {
            return Err(ToolError::invalid_params(format!(
                "Cannot extract text from {category} file: {}",
                params.path
            )));
        }

        let (text, format) = match ext.as_deref() {
            Some(ext) if PLAIN_TEXT_EXTENSIONS.contains(&ext) => {
                (read_utf8(&path, "extract text")?, ext.to_string())
            }
            Some("html" | "htm") => {
                let raw = read_utf8(&path, "extract text")?;
                (self.html.strip(&raw), "html".to_string())
            }
            _ => {
                let bytes = std::fs::read(&path)?;
                (
                    String::from_utf8_lossy(&bytes).into_owned(),
                    "text".to_string(),
                )
            }
        };

        Ok(ExtractTextOutput {
            text,
            format,
            pages: None,
        })
    }
}
