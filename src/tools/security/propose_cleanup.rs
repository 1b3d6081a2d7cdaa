//! `security.propose_cleanup`
//!
//! Turns scan findings into one proposed action per file and finding type.
//! Nothing is changed on disk.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::Finding;
use crate::error::ToolError;
use crate::mcp::registry::Tool;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProposeCleanupParams {
    findings: Vec<Finding>,
}

/// A remediation step for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposedAction {
    /// `redact`, `rotate` or `move`.
    pub action_type: &'static str,
    pub target_path: String,
    pub description: String,
    /// `high`, `medium` or `low`.
    pub severity: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ProposeCleanupOutput {
    pub actions: Vec<ProposedAction>,
}

/// Proposes cleanup actions for PII and secret findings.
#[derive(Debug, Default)]
pub struct ProposeCleanup;

impl Tool for ProposeCleanup {
    type Params = ProposeCleanupParams;
    type Output = ProposeCleanupOutput;

    const NAME: &'static str = "security.propose_cleanup";
    const DESCRIPTION: &'static str = "Generate cleanup proposals for PII and secret findings";

    fn params_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "findings": {
                    "type": "array",
                    "description": "Findings from security.scan_for_pii or security.scan_for_secrets",
                    "items": {
                        "type": "object",
                        "properties": {
                            "file_path": { "type": "string" },
                            "line_number": { "type": "integer", "minimum": 1 },
                            "finding_type": { "type": "string" },
                            "matched_text": { "type": "string" },
                            "context": { "type": "string" }
                        },
                        "required": ["file_path", "line_number", "finding_type", "matched_text", "context"]
                    }
                }
            },
            "required": ["findings"],
            "additionalProperties": false
        })
    }

    fn result_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "actions": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "action_type": { "type": "string", "enum": ["redact", "rotate", "move"] },
                            "target_path": { "type": "string" },
                            "description": { "type": "string" },
                            "severity": { "type": "string", "enum": ["high", "medium", "low"] }
                        },
                        "required": ["action_type", "target_path", "description", "severity"]
                    }
                }
            },
            "required": ["actions"]
        })
    }

    fn execute(&self, params: ProposeCleanupParams) -> Result<ProposeCleanupOutput, ToolError> {
        let mut seen = HashSet::new();
        let mut actions = Vec::new();
        for finding in &params.findings {
            if seen.insert((finding.file_path.as_str(), finding.finding_type.as_str())) {
                actions.push(build_action(finding));
            }
        }

        Ok(ProposeCleanupOutput { actions })
    }
}

fn build_action(finding: &Finding) -> ProposedAction {
    let kind = finding.finding_type.as_str();
    let description = match kind {
        "ssn" => "Redact Social Security Number from file".to_string(),
        "credit_card" => "Redact credit card number from file".to_string(),
        "email" => "Redact email address from file".to_string(),
        "phone" => "Redact phone number from file".to_string(),
        "aws_key" => "Rotate exposed AWS access key and remove from file".to_string(),
        "github_token" => "Rotate exposed GitHub token and remove from file".to_string(),
        "stripe_key" => "Rotate exposed Stripe key and remove from file".to_string(),
        "private_key" => {
            "Move private key to a secure location with restricted permissions".to_string()
        }
        "generic_api_key" => {
            "Rotate exposed secret/password/token and remove from file".to_string()
        }
        other => format!("Address {other} finding in file"),
    };

    ProposedAction {
        action_type: action_type(kind),
        target_path: finding.file_path.clone(),
        description: format!("{description}: {}", finding.file_path),
        severity: severity(kind),
    }
}

fn severity(kind: &str) -> &'static str {
    match kind {
        "ssn" | "credit_card" | "aws_key" | "github_token" | "stripe_key" | "private_key" => {
            "high"
        }
        "email" | "phone" => "low",
        _ => "medium",
    }
}

fn action_type(kind: &str) -> &'static str {
    match kind {
        "aws_key" | "github_token" | "stripe_key" | "generic_api_key" => "rotate",
        "private_key" => "move",
        _ => "redact",
    }
}
