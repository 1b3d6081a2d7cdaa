//! The `security` worker: scan files for PII and exposed secrets, find
//! duplicate files, and propose cleanups for findings.
//!
//! Both scanners share file collection and finding construction. Matched
//! values never leave the worker unmasked.

mod find_duplicates;
mod patterns;
mod propose_cleanup;
mod scan_for_pii;
mod scan_for_secrets;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use walkdir::WalkDir;

pub use find_duplicates::{FileInfo, FindDuplicates};
pub use patterns::{luhn_check, mask_sensitive_value, PiiPatterns, PiiType, SecretPatterns};
pub use propose_cleanup::{ProposeCleanup, ProposedAction};
pub use scan_for_pii::ScanForPii;
pub use scan_for_secrets::ScanForSecrets;

use crate::error::ToolError;
use crate::mcp::registry::ToolRegistryBuilder;
use crate::sandbox::{extension_lowercase, Sandbox};

/// Files beyond this many are not scanned.
pub const MAX_FILES: usize = 10_000;
/// Directories nested deeper than this below the target are not entered.
pub const MAX_DEPTH: usize = 12;
/// Larger files are skipped.
pub const MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;

const CONTEXT_MAX_CHARS: usize = 200;

const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "tiff", "webp", "pdf", "zip", "tar", "gz", "rar",
    "7z", "bz2", "exe", "dll", "so", "dylib", "bin", "dat", "mp3", "wav", "ogg", "mp4", "avi",
    "mkv", "mov", "woff", "woff2", "ttf", "otf", "eot", "pyc", "pyo", "class", "o", "obj", "enc",
    "key",
];

/// Dependency, cache and VCS directories that are never scanned.
const SKIP_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "__pycache__",
    ".venv",
    "venv",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    ".ruff_cache",
    "dist",
    "build",
    ".next",
    ".nuxt",
    "target",
    ".cargo",
    ".npm",
    ".yarn",
    ".pnp",
    "vendor",
    "Pods",
    ".gradle",
    ".DS_Store",
];

/// Adds the security tools, in manifest order.
///
/// # Errors
///
/// Returns an error if a detection pattern fails to compile.
pub fn register(
    builder: ToolRegistryBuilder,
    sandbox: &Sandbox,
) -> Result<ToolRegistryBuilder, regex::Error> {
    Ok(builder
        .tool(ScanForPii::new(sandbox.clone(), PiiPatterns::compile()?))
        .tool(ScanForSecrets::new(
            sandbox.clone(),
            SecretPatterns::compile()?,
        ))
        .tool(FindDuplicates::new(sandbox.clone()))
        .tool(ProposeCleanup))
}

/// A single PII or secret match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Path of the file containing the match.
    pub file_path: String,
    /// 1-based line number.
    pub line_number: usize,
    /// PII type or secret type.
    pub finding_type: String,
    /// The match, masked.
    pub matched_text: String,
    /// The trimmed line, at most 200 characters.
    pub context: String,
}

/// Result of either scanner.
#[derive(Debug, Serialize)]
pub struct ScanOutput {
    pub findings: Vec<Finding>,
}

fn scan_output_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "findings": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "file_path": { "type": "string" },
                        "line_number": { "type": "integer", "minimum": 1 },
                        "finding_type": { "type": "string" },
                        "matched_text": { "type": "string", "description": "Masked match" },
                        "context": { "type": "string", "maxLength": CONTEXT_MAX_CHARS }
                    },
                    "required": ["file_path", "line_number", "finding_type", "matched_text", "context"]
                }
            }
        },
        "required": ["findings"]
    })
}

/// Validates the scan target and collects the files beneath it.
fn resolve_target(sandbox: &Sandbox, path: &str) -> Result<Vec<PathBuf>, ToolError> {
    let target = sandbox.check_param(path, "path")?;
    if !target.exists() {
        return Err(ToolError::file_not_found(format!("Path not found: {path}")));
    }
    let files = collect_files(&target);
    debug!(target = %target.display(), files = files.len(), "Collected files for scanning");
    Ok(files)
}

fn is_binary_file(path: &Path) -> bool {
    extension_lowercase(path).is_some_and(|ext| BINARY_EXTENSIONS.contains(&ext.as_str()))
}

fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIP_DIRS.contains(&name))
}

fn within_size_limit(metadata: Option<std::fs::Metadata>) -> bool {
    metadata.is_some_and(|m| m.len() <= MAX_FILE_SIZE_BYTES)
}

/// Collects scannable files under `target`, or `target` itself if it is a
/// file.
///
/// Skips binary extensions, [`SKIP_DIRS`], files over
/// [`MAX_FILE_SIZE_BYTES`] and anything unreadable. Stops after
/// [`MAX_FILES`]. Symlinks are not followed.
fn collect_files(target: &Path) -> Vec<PathBuf> {
    if target.is_file() {
        if is_binary_file(target) || !within_size_limit(target.metadata().ok()) {
            return Vec::new();
        }
        return vec![target.to_path_buf()];
    }

    let walker = WalkDir::new(target)
        .max_depth(MAX_DEPTH + 1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped_dir(entry));

    walker
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| !is_binary_file(entry.path()))
        .filter(|entry| within_size_limit(entry.metadata().ok()))
        .take(MAX_FILES)
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Reads `path` lossily and builds a finding for every match `matcher` reports
/// on each line. Unreadable files yield nothing.
fn scan_file<'p, F, I>(path: &Path, mut matcher: F) -> Vec<Finding>
where
    F: FnMut(&str) -> I,
    I: IntoIterator<Item = (&'p str, String)>,
{
    let Ok(bytes) = std::fs::read(path) else {
        debug!(path = %path.display(), "Skipping unreadable file");
        return Vec::new();
    };
    let content = String::from_utf8_lossy(&bytes);
    let file_path = path.display().to_string();

    let mut findings = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let context: String = line.trim().chars().take(CONTEXT_MAX_CHARS).collect();
        for (finding_type, matched) in matcher(line) {
            findings.push(Finding {
                file_path: file_path.clone(),
                line_number: index + 1,
                finding_type: finding_type.to_string(),
                matched_text: mask_sensitive_value(&matched),
                context: context.clone(),
            });
        }
    }
    findings
}
