//! `document.read_spreadsheet`

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::ensure_exists;
use crate::error::ToolError;
use crate::mcp::registry::Tool;
use crate::sandbox::{extension_lowercase, Sandbox};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReadSpreadsheetParams {
    path: String,
    /// Only meaningful for multi-sheet workbooks; ignored for CSV/TSV.
    #[serde(default)]
    sheet: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReadSpreadsheetOutput {
    headers: Vec<String>,
    /// One object per data row, keyed by header, in column order.
    rows: Vec<IndexMap<String, Value>>,
    total_rows: usize,
}

/// Reads a delimited spreadsheet, treating the first row as headers.
#[derive(Debug)]
pub struct ReadSpreadsheet {
    sandbox: Sandbox,
}

impl ReadSpreadsheet {
    #[must_use]
    pub const fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

impl Tool for ReadSpreadsheet {
    type Params = ReadSpreadsheetParams;
    type Output = ReadSpreadsheetOutput;

    const NAME: &'static str = "document.read_spreadsheet";
    const DESCRIPTION: &'static str = "Read data from a CSV or TSV spreadsheet";

    fn params_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute path to the spreadsheet"
                },
                "sheet": {
                    "type": "string",
                    "description": "Sheet name (for multi-sheet files)"
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
                "headers": { "type": "array", "items": { "type": "string" } },
                "rows": {
                    "type": "array",
                    "items": { "type": "object", "additionalProperties": { "type": ["string", "null"] } }
                },
                "total_rows": { "type": "integer", "minimum": 0 }
            },
            "required": ["headers", "rows", "total_rows"]
        })
    }

    fn execute(&self, params: ReadSpreadsheetParams) -> Result<ReadSpreadsheetOutput, ToolError> {
        let path = self.sandbox.check_param(&params.path, "path")?;
        ensure_exists(&path, &params.path)?;

        let delimiter = match extension_lowercase(&path).as_deref() {
            Some("csv") => b',',
            Some("tsv") => b'\t',
            other => {
                return Err(ToolError::invalid_params(format!(
                    "Unsupported spreadsheet format: .{}. Supported: .csv, .tsv",
                    other.unwrap_or("")
                )))
            }
        };

        if let Some(sheet) = &params.sheet {
            debug!(sheet = %sheet, "Delimited files have a single sheet, ignoring selection");
        }

        read_delimited(&path, delimiter)
            .map_err(|e| ToolError::internal(format!("Failed to read spreadsheet: {e}")))
    }
}

fn read_delimited(path: &Path, delimiter: u8) -> Result<ReadSpreadsheetOutput, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        // Short rows pad with null; extra trailing fields are dropped.
        let row = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let value = record
                    .get(i)
                    .map_or(Value::Null, |field| Value::String(field.to_string()));
                (header.clone(), value)
            })
            .collect::<IndexMap<_, _>>();
        rows.push(row);
    }

    Ok(ReadSpreadsheetOutput {
        total_rows: rows.len(),
        headers,
        rows,
    })
}
