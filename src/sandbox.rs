//! File-system sandbox shared by the tools of one worker.
//!
//! A [`Sandbox`] is built once at startup from the permitted root directories
//! and handed to each tool that touches the file system. Every path a tool
//! reads or writes must resolve to a root or to something beneath one.
//!
//! Resolution follows symlinks for the part of the path that exists, so a
//! link pointing out of a root is rejected, while paths that do not exist yet
//! (outputs) can still be checked.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::error::ToolError;

/// Environment variable holding the permitted roots, separated by the
/// platform path-list separator (`:` on Unix, `;` on Windows).
pub const ALLOWED_PATHS_ENV: &str = "LOCALCOWORK_ALLOWED_PATHS";

/// Coarse file categories, by extension.
const FILE_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "document",
        &["pdf", "docx", "doc", "txt", "md", "rtf", "odt", "html"],
    ),
    ("spreadsheet", &["xlsx", "xls", "csv", "tsv", "ods"]),
    (
        "image",
        &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp", "svg"],
    ),
    ("audio", &["mp3", "wav", "m4a", "ogg", "flac", "aac", "wma"]),
    ("video", &["mp4", "avi", "mkv", "mov", "wmv", "flv", "webm"]),
    ("archive", &["zip", "tar", "gz", "rar", "7z", "bz2"]),
    ("code", &["ts", "js", "py", "rs", "go", "java", "c", "cpp", "h"]),
];

/// The set of directories tools may touch.
#[derive(Debug, Clone)]
pub struct Sandbox {
    roots: Arc<Vec<PathBuf>>,
}

impl Sandbox {
    /// Creates a sandbox over the given roots.
    ///
    /// Roots are resolved the same way checked paths are, so symlinked roots
    /// (e.g. `/tmp` on macOS) compare correctly.
    #[must_use]
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let roots = roots
            .into_iter()
            .filter(|p| !p.as_ref().as_os_str().is_empty())
            .map(|p| resolve(p.as_ref()))
            .collect();
        Self {
            roots: Arc::new(roots),
        }
    }

    /// Creates a sandbox from [`ALLOWED_PATHS_ENV`], defaulting to the user's
    /// home directory.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var_os(ALLOWED_PATHS_ENV) {
            Some(value) if !value.is_empty() => Self::new(std::env::split_paths(&value)),
            _ => Self::new(dirs::home_dir()),
        }
    }

    /// The resolved roots.
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolves `path` and checks that it lies within a root.
    ///
    /// Returns the resolved path.
    ///
    /// # Errors
    ///
    /// Returns a `SANDBOX_VIOLATION` error if the path is outside every root.
    pub fn check(&self, path: impl AsRef<Path>) -> Result<PathBuf, ToolError> {
        let resolved = resolve(path.as_ref());

        if self.roots.iter().any(|root| resolved.starts_with(root)) {
            return Ok(resolved);
        }

        let allowed = self
            .roots
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(ToolError::sandbox_violation(format!(
            "Path \"{}\" is outside the sandboxed directories. Allowed: {allowed}",
            resolved.display()
        )))
    }

    /// Checks that `path` is absolute, then that it is inside the sandbox.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_PARAMS` for a relative path and `SANDBOX_VIOLATION`
    /// for a path outside every root.
    pub fn check_param(&self, path: &str, param_name: &str) -> Result<PathBuf, ToolError> {
        require_absolute(path, param_name)?;
        self.check(path)
    }
}

/// Fails unless `path` is absolute.
///
/// # Errors
///
/// Returns an `INVALID_PARAMS` error naming the parameter.
pub fn require_absolute(path: &str, param_name: &str) -> Result<(), ToolError> {
    if Path::new(path).is_absolute() {
        Ok(())
    } else {
        Err(ToolError::invalid_params(format!(
            "Parameter \"{param_name}\" must be an absolute path. Got: \"{path}\""
        )))
    }
}

/// Returns the category of a file by its extension, or `"other"`.
#[must_use]
pub fn file_category(path: impl AsRef<Path>) -> &'static str {
    let Some(ext) = extension_lowercase(path.as_ref()) else {
        return "other";
    };
    FILE_CATEGORIES
        .iter()
        .find(|(_, exts)| exts.contains(&ext.as_str()))
        .map_or("other", |(category, _)| category)
}

/// Lower-cased extension without the dot.
#[must_use]
pub fn extension_lowercase(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// Canonicalises the longest existing ancestor of `path` and appends the
/// remaining components, normalising `.` and `..` lexically.
fn resolve(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    let mut existing = absolute.as_path();
    let mut tail = Vec::new();
    let base = loop {
        if let Ok(canonical) = existing.canonicalize() {
            break canonical;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            // `..` as the last component, or a root that cannot be resolved.
            _ => break normalise(existing),
        }
    };

    let mut resolved = base;
    for name in tail.into_iter().rev() {
        resolved.push(name);
    }
    normalise(&resolved)
}

fn normalise(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
