//! `security.scan_for_secrets`

use serde::Deserialize;
use serde_json::{json, Value};

use super::{resolve_target, scan_file, scan_output_schema, ScanOutput, SecretPatterns};
use crate::error::ToolError;
use crate::mcp::registry::Tool;
use crate::sandbox::Sandbox;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScanForSecretsParams {
    path: String,
}

/// Scans a file or directory for API keys, tokens, private keys and
/// hard-coded passwords.
#[derive(Debug)]
pub struct ScanForSecrets {
    sandbox: Sandbox,
    patterns: SecretPatterns,
}

impl ScanForSecrets {
    #[must_use]
    pub const fn new(sandbox: Sandbox, patterns: SecretPatterns) -> Self {
        Self { sandbox, patterns }
    }
}

impl Tool for ScanForSecrets {
    type Params = ScanForSecretsParams;
    type Output = ScanOutput;

    const NAME: &'static str = "security.scan_for_secrets";
    const DESCRIPTION: &'static str =
        "Scan files for exposed secrets (API keys, private keys, passwords)";

    fn params_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute path to a file or directory to scan"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    fn result_schema() -> Value {
        scan_output_schema()
    }

    fn execute(&self, params: ScanForSecretsParams) -> Result<ScanOutput, ToolError> {
        let files = resolve_target(&self.sandbox, &params.path)?;

        let findings = files
            .iter()
            .flat_map(|file| {
                scan_file(file, |line| {
                    self.patterns
                        .matches(line)
                        .map(|(name, text)| (name, text.to_string()))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        Ok(ScanOutput { findings })
    }
}
