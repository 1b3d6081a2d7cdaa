//! `security.find_duplicates`
//!
//! Groups files under a directory by content hash, file name, or size then
//! hash. Only groups with two or more members are reported.

use std::fs::File;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

use super::{MAX_DEPTH, MAX_FILES};
use crate::error::ToolError;
use crate::mcp::registry::Tool;
use crate::sandbox::Sandbox;

const METHODS: &[&str] = &["content", "hash", "name"];

fn default_method() -> String {
    "hash".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FindDuplicatesParams {
    path: String,
    #[serde(default = "default_method")]
    method: String,
}

/// A member of a duplicate group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub path: String,
    pub size: u64,
    /// SHA-256 hex digest, empty when grouping by name.
    pub hash: String,
}

#[derive(Debug, Serialize)]
pub struct FindDuplicatesOutput {
    pub groups: Vec<Vec<FileInfo>>,
}

/// Finds duplicate files in a directory tree.
#[derive(Debug)]
pub struct FindDuplicates {
    sandbox: Sandbox,
}

impl FindDuplicates {
    #[must_use]
    pub const fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }
}

impl Tool for FindDuplicates {
    type Params = FindDuplicatesParams;
    type Output = FindDuplicatesOutput;

    const NAME: &'static str = "security.find_duplicates";
    const DESCRIPTION: &'static str = "Find duplicate files by hash, name, or content comparison";

    fn params_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute path to the directory to scan"
                },
                "method": {
                    "type": "string",
                    "enum": METHODS,
                    "default": "hash",
                    "description": "hash (SHA-256), name, or content (size, then hash)"
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
                "groups": {
                    "type": "array",
                    "items": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "path": { "type": "string" },
                                "size": { "type": "integer", "minimum": 0 },
                                "hash": { "type": "string" }
                            },
                            "required": ["path", "size", "hash"]
                        }
                    }
                }
            },
            "required": ["groups"]
        })
    }

    fn execute(&self, params: FindDuplicatesParams) -> Result<FindDuplicatesOutput, ToolError> {
        let target = self.sandbox.check_param(&params.path, "path")?;
        if !target.exists() {
            return Err(ToolError::file_not_found(format!(
                "Path not found: {}",
                params.path
            )));
        }
        if !target.is_dir() {
            return Err(ToolError::invalid_params(format!(
                "Path must be a directory: {}",
                params.path
            )));
        }

        let method = params.method.to_ascii_lowercase();
        let files = collect_regular_files(&target);
        debug!(target = %target.display(), files = files.len(), %method, "Grouping files");

        let groups = match method.as_str() {
            "hash" => group_by_hash(&files),
            "name" => group_by_name(&files),
            "content" => group_by_content(&files),
            _ => {
                return Err(ToolError::invalid_params(format!(
                    "Invalid method: {method}. Must be one of: {}",
                    METHODS.join(", ")
                )))
            }
        };

        Ok(FindDuplicatesOutput {
            groups: groups.into_iter().filter(|g| g.len() >= 2).collect(),
        })
    }
}

/// Regular files under `dir` in file-name order. Symlinks are not followed.
fn collect_regular_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .max_depth(MAX_DEPTH + 1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .take(MAX_FILES)
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// SHA-256 of the file's contents, or `None` if it cannot be read.
fn sha256_file(path: &Path) -> Option<String> {
    let mut file = File::open(path).ok()?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).ok()?;
    Some(hex::encode(hasher.finalize()))
}

fn file_info(path: &Path, hash: String) -> FileInfo {
    FileInfo {
        path: path.display().to_string(),
        size: path.metadata().map_or(0, |m| m.len()),
        hash,
    }
}

fn group_by_hash(files: &[PathBuf]) -> Vec<Vec<FileInfo>> {
    let mut groups: IndexMap<String, Vec<FileInfo>> = IndexMap::new();
    for path in files {
        if let Some(digest) = sha256_file(path) {
            groups
                .entry(digest.clone())
                .or_default()
                .push(file_info(path, digest));
        }
    }
    groups.into_values().collect()
}

fn group_by_name(files: &[PathBuf]) -> Vec<Vec<FileInfo>> {
    let mut groups: IndexMap<&std::ffi::OsStr, Vec<FileInfo>> = IndexMap::new();
    for path in files {
        if let Some(name) = path.file_name() {
            groups
                .entry(name)
                .or_default()
                .push(file_info(path, String::new()));
        }
    }
    groups.into_values().collect()
}

/// Hashes only files that share their size with another file.
fn group_by_content(files: &[PathBuf]) -> Vec<Vec<FileInfo>> {
    let mut by_size: IndexMap<u64, Vec<PathBuf>> = IndexMap::new();
    for path in files {
        if let Ok(metadata) = path.metadata() {
            by_size.entry(metadata.len()).or_default().push(path.clone());
        }
    }

    by_size
        .into_values()
        .filter(|same_size| same_size.len() >= 2)
        .flat_map(|same_size| group_by_hash(&same_size))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::ErrorCode;
    use std::fs;

    fn find(root: &Path, path: &Path, method: &str) -> Result<FindDuplicatesOutput, ToolError> {
        FindDuplicates::new(Sandbox::new([root])).execute(FindDuplicatesParams {
            path: path.display().to_string(),
            method: method.to_string(),
        })
    }

    fn names(group: &[FileInfo], root: &Path) -> Vec<String> {
        group
            .iter()
            .map(|f| {
                Path::new(&f.path)
                    .strip_prefix(root)
                    .unwrap()
                    .display()
                    .to_string()
            })
            .collect()
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.txt"), "same bytes").unwrap();
        fs::create_dir(root.join("copies")).unwrap();
        fs::write(root.join("copies").join("b.txt"), "same bytes").unwrap();
        fs::write(root.join("copies").join("a.txt"), "other bytes").unwrap();
        fs::write(root.join("unique.txt"), "nothing like it").unwrap();
        dir
    }

    #[test]
    fn groups_by_hash() {
        let dir = fixture();
        let root = fs::canonicalize(dir.path()).unwrap();
        let out = find(&root, &root, "hash").unwrap();

        assert_eq!(out.groups.len(), 1);
        assert_eq!(names(&out.groups[0], &root), ["a.txt", "copies/b.txt"]);
        let group = &out.groups[0];
        assert_eq!(group[0].hash, group[1].hash);
        assert_eq!(group[0].hash.len(), 64);
        assert_eq!(group[0].size, 10);
    }

    #[test]
    fn groups_by_name() {
        let dir = fixture();
        let root = fs::canonicalize(dir.path()).unwrap();
        let out = find(&root, &root, "NAME").unwrap();

        assert_eq!(out.groups.len(), 1);
        assert_eq!(names(&out.groups[0], &root), ["a.txt", "copies/a.txt"]);
        assert!(out.groups[0].iter().all(|f| f.hash.is_empty()));
    }

    #[test]
    fn groups_by_content() {
        let dir = fixture();
        let root = fs::canonicalize(dir.path()).unwrap();
        fs::write(root.join("same_size.txt"), "diff bytes").unwrap();

        let out = find(&root, &root, "content").unwrap();
        assert_eq!(out.groups.len(), 1);
        assert_eq!(names(&out.groups[0], &root), ["a.txt", "copies/b.txt"]);
    }

    #[test]
    fn rejects_files_missing_paths_and_unknown_methods() {
        let dir = fixture();
        let root = dir.path();

        let err = find(root, &root.join("a.txt"), "hash").unwrap_err();
        assert_eq!(
            err,
            ToolError::invalid_params(format!(
                "Path must be a directory: {}",
                root.join("a.txt").display()
            ))
        );

        let err = find(root, &root.join("gone"), "hash").unwrap_err();
        assert!(matches!(
            err,
            ToolError::Domain {
                code: ErrorCode::FileNotFound,
                ..
            }
        ));

        let err = find(root, root, "fuzzy").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid method: fuzzy. Must be one of: content, hash, name"
        );
    }
}
