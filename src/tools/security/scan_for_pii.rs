//! `security.scan_for_pii`

use serde::Deserialize;
use serde_json::{json, Value};

use super::{resolve_target, scan_file, scan_output_schema, PiiPatterns, PiiType, ScanOutput};
use crate::error::ToolError;
use crate::mcp::registry::Tool;
use crate::sandbox::Sandbox;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanForPiiParams {
    path: String,
    #[serde(default)]
    types: Option<Vec<String>>,
}

/// Scans a file or directory for SSNs, card numbers, emails and phone numbers.
#[derive(Debug)]
pub struct ScanForPii {
    sandbox: Sandbox,
    patterns: PiiPatterns,
}

impl ScanForPii {
    #[must_use]
    pub const fn new(sandbox: Sandbox, patterns: PiiPatterns) -> Self {
        Self { sandbox, patterns }
    }
}

/// Parses the requested types; none (or an empty list) means all of them.
fn resolve_types(types: Option<&[String]>) -> Result<Vec<PiiType>, ToolError> {
    let Some(types) = types.filter(|t| !t.is_empty()) else {
        return Ok(PiiType::ALL.to_vec());
    };

    let mut resolved = Vec::with_capacity(types.len());
    for name in types {
        let Some(pii_type) = PiiType::parse(name) else {
            let allowed: Vec<_> = PiiType::ALL.iter().map(|t| t.name()).collect();
            return Err(ToolError::invalid_params(format!(
                "Unknown PII type: {name}. Allowed: {}",
                allowed.join(", ")
            )));
        };
        if !resolved.contains(&pii_type) {
            resolved.push(pii_type);
        }
    }
    Ok(resolved)
}

impl Tool for ScanForPii {
    type Params = ScanForPiiParams;
    type Output = ScanOutput;

    const NAME: &'static str = "security.scan_for_pii";
    const DESCRIPTION: &'static str =
        "Scan files for PII (SSNs, credit card numbers, email addresses, phone numbers)";

    fn params_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute path to a file or directory to scan"
                },
                "types": {
                    "type": "array",
                    "items": {
                        "type": "string",
                        "enum": PiiType::ALL.map(PiiType::name)
                    },
                    "description": "PII types to scan for. All if omitted."
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    fn result_schema() -> Value {
        scan_output_schema()
    }

    fn execute(&self, params: ScanForPiiParams) -> Result<ScanOutput, ToolError> {
        let types = resolve_types(params.types.as_deref())?;
        let files = resolve_target(&self.sandbox, &params.path)?;

        let findings = files
            .iter()
            .flat_map(|file| {
                scan_file(file, |line| {
                    self.patterns
                        .matches(line, &types)
                        .map(|(pii_type, text)| (pii_type.name(), text.to_string()))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        Ok(ScanOutput { findings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::ErrorCode;
    use std::fs;

    fn tool(root: &std::path::Path) -> ScanForPii {
        ScanForPii::new(Sandbox::new([root]), PiiPatterns::compile().unwrap())
    }

    #[test]
    fn finds_and_masks_pii_in_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("customers.txt"),
            "Name: Ada\nSSN: 123-45-6789\nContact: ada@example.org\n",
        )
        .unwrap();
        fs::write(dir.path().join("clean.md"), "nothing here\n").unwrap();

        let out = tool(dir.path())
            .execute(ScanForPiiParams {
                path: dir.path().display().to_string(),
                types: Some(vec!["ssn".to_string(), "EMAIL".to_string()]),
            })
            .unwrap();

        assert_eq!(out.findings.len(), 2);
        let ssn = &out.findings[0];
        assert_eq!(ssn.finding_type, "ssn");
        assert_eq!(ssn.line_number, 2);
        assert_eq!(ssn.matched_text, "12*******89");
        assert_eq!(ssn.context, "SSN: 123-45-6789");
        assert!(ssn.file_path.ends_with("customers.txt"));

        assert_eq!(out.findings[1].finding_type, "email");
        assert_eq!(out.findings[1].line_number, 3);
    }

    #[test]
    fn invalid_card_numbers_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("cards.csv");
        fs::write(&file, "good,4111 1111 1111 1111\nbad,4111 1111 1111 1112\n").unwrap();

        let out = tool(dir.path())
            .execute(ScanForPiiParams {
                path: file.display().to_string(),
                types: Some(vec!["credit_card".to_string()]),
            })
            .unwrap();

        assert_eq!(out.findings.len(), 1);
        assert_eq!(out.findings[0].line_number, 1);
    }

    #[test]
    fn unknown_type_is_invalid_params() {
        let dir = tempfile::tempdir().unwrap();
        let err = tool(dir.path())
            .execute(ScanForPiiParams {
                path: dir.path().display().to_string(),
                types: Some(vec!["passport".to_string()]),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            ToolError::Domain {
                code: ErrorCode::InvalidParams,
                ..
            }
        ));
    }

    #[test]
    fn missing_path_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");
        let err = tool(dir.path())
            .execute(ScanForPiiParams {
                path: missing.display().to_string(),
                types: None,
            })
            .unwrap_err();
        assert_eq!(
            err,
            ToolError::file_not_found(format!("Path not found: {}", missing.display()))
        );
    }

    #[test]
    fn empty_type_list_means_all() {
        let empty: &[String] = &[];
        assert_eq!(resolve_types(Some(empty)).unwrap(), PiiType::ALL);
        assert_eq!(resolve_types(None).unwrap(), PiiType::ALL);
    }
}
