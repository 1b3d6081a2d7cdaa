//! `document.convert_format`
//!
//! Writes a file, so the host asks the user before calling it.

use std::fmt::Write as _;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::{ensure_exists, ensure_text_format, read_utf8, HtmlStripper};
use crate::error::ToolError;
use crate::mcp::registry::Tool;
use crate::sandbox::{extension_lowercase, Sandbox};

const TARGET_FORMATS: &[&str] = &["txt", "md", "html"];
/// Every spelling of [`TARGET_FORMATS`] that `execute` accepts.
const TARGET_FORMAT_PATTERN: &str = r"^\.?([Tt][Xx][Tt]|[Mm][Dd]|[Hh][Tt][Mm][Ll])$";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConvertFormatParams {
    path: String,
    target_format: String,
    #[serde(default)]
    output_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConvertFormatOutput {
    path: String,
}

/// Converts a text document between plain text, Markdown and HTML.
#[derive(Debug)]
pub struct ConvertFormat {
    sandbox: Sandbox,
    html: HtmlStripper,
}

impl ConvertFormat {
    #[must_use]
    pub const fn new(sandbox: Sandbox, html: HtmlStripper) -> Self {
        Self { sandbox, html }
    }
}

impl Tool for ConvertFormat {
    type Params = ConvertFormatParams;
    type Output = ConvertFormatOutput;

    const NAME: &'static str = "document.convert_format";
    const DESCRIPTION: &'static str = "Convert a document between formats (txt, md, html)";
    const REQUIRES_CONFIRMATION: bool = true;

    fn params_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute path to the source document"
                },
                "target_format": {
                    "type": "string",
                    "pattern": TARGET_FORMAT_PATTERN,
                    "description": "Target format: txt, md or html (case-insensitive, leading dot optional)"
                },
                "output_path": {
                    "type": "string",
                    "description": "Absolute output path (defaults to the source path with the target extension)"
                }
            },
            "required": ["path", "target_format"],
            "additionalProperties": false
        })
    }

    fn result_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Path of the written file" }
            },
            "required": ["path"]
        })
    }

    fn execute(&self, params: ConvertFormatParams) -> Result<ConvertFormatOutput, ToolError> {
        let source = self.sandbox.check_param(&params.path, "path")?;
        ensure_exists(&source, &params.path)?;

        let requested = params.target_format.as_str();
        let target = requested
            .strip_prefix('.')
            .unwrap_or(requested)
            .to_ascii_lowercase();
        if !TARGET_FORMATS.contains(&target.as_str()) {
            return Err(ToolError::invalid_params(format!(
                "Unsupported target format: {target}. Allowed: {}",
                TARGET_FORMATS.join(", ")
            )));
        }

        let output_param = match params.output_path {
            Some(path) if !path.is_empty() => path,
            _ => Path::new(&params.path)
                .with_extension(&target)
                .display()
                .to_string(),
        };
        let output = self.sandbox.check_param(&output_param, "output_path")?;

        let source_ext = extension_lowercase(&source);
        ensure_text_format(source_ext.as_deref())?;
        let text = read_utf8(&source, "convert")?;
        let source_is_html = matches!(source_ext.as_deref(), Some("html" | "htm"));

        let converted = match target.as_str() {
            "html" if source_is_html => text,
            "html" => wrap_html(&text),
            _ if source_is_html => self.html.strip(&text),
            _ => text,
        };

        write_output(&output, &converted)?;
        info!(source = %source.display(), output = %output.display(), "Converted document");

        Ok(ConvertFormatOutput {
            path: output_param,
        })
    }
}

fn write_output(path: &Path, contents: &str) -> Result<(), ToolError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}

/// Wraps blank-line separated paragraphs in a minimal HTML document.
fn wrap_html(text: &str) -> String {
    let mut body = String::new();
    for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        let _ = writeln!(body, "<p>{}</p>", escape_html(paragraph));
    }
    format!("<!DOCTYPE html>\n<html>\n<body>\n{body}</body>\n</html>\n")
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
