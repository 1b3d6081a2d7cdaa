//! `document.diff_documents`
//!
//! Splits both documents into units (paragraphs, sentences or words) and
//! reports the units outside their longest common subsequence. Within a run of
//! changes, removals are listed before additions. Regions too far apart to
//! align within `MAX_EDIT_COST` edits are reported as replaced.

use std::ops::{Index, IndexMut};
#[cfg(test)]
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{ensure_exists, read_document_text, HtmlStripper};
use crate::error::ToolError;
use crate::mcp::registry::Tool;
use crate::sandbox::Sandbox;

const GRANULARITIES: &[&str] = &["paragraph", "sentence", "word"];

fn default_granularity() -> String {
    "paragraph".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiffDocumentsParams {
    path_a: String,
    path_b: String,
    #[serde(default = "default_granularity")]
    granularity: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    #[serde(rename = "type")]
    kind: ChangeKind,
    text: String,
    /// Surrounding text. Not yet populated.
    context: String,
}

impl Change {
    fn new(kind: ChangeKind, text: &str) -> Self {
        Self {
            kind,
            text: text.to_string(),
            context: String::new(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DiffDocumentsOutput {
    changes: Vec<Change>,
    summary: String,
}

/// Produces a structured diff between two documents.
#[derive(Debug)]
pub struct DiffDocuments {
    sandbox: Sandbox,
    html: HtmlStripper,
}

impl DiffDocuments {
    #[must_use]
    pub const fn new(sandbox: Sandbox, html: HtmlStripper) -> Self {
        Self { sandbox, html }
    }

    fn read(&self, param: &str, value: &str) -> Result<String, ToolError> {
        let path = self.sandbox.check_param(value, param)?;
        ensure_exists(&path, value)?;
        read_document_text(&path, &self.html, "diff")
    }
}

impl Tool for DiffDocuments {
    type Params = DiffDocumentsParams;
    type Output = DiffDocumentsOutput;

    const NAME: &'static str = "document.diff_documents";
    const DESCRIPTION: &'static str = "Produce a structured diff between two documents";

    fn params_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "path_a": {
                    "type": "string",
                    "description": "Absolute path to the first document"
                },
                "path_b": {
                    "type": "string",
                    "description": "Absolute path to the second document"
                },
                "granularity": {
                    "type": "string",
                    "enum": GRANULARITIES,
                    "default": "paragraph",
                    "description": "Diff level"
                }
            },
            "required": ["path_a", "path_b"],
            "additionalProperties": false
        })
    }

    fn result_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "changes": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "type": { "type": "string", "enum": ["added", "removed"] },
                            "text": { "type": "string" },
                            "context": { "type": "string" }
                        },
                        "required": ["type", "text", "context"]
                    }
                },
                "summary": { "type": "string" }
            },
            "required": ["changes", "summary"]
        })
    }

    fn execute(&self, params: DiffDocumentsParams) -> Result<DiffDocumentsOutput, ToolError> {
        if !GRANULARITIES.contains(&params.granularity.as_str()) {
            return Err(ToolError::invalid_params(format!(
                "Invalid granularity: {}. Allowed: {}",
                params.granularity,
                GRANULARITIES.join(", ")
            )));
        }

        let text_a = self.read("path_a", &params.path_a)?;
        let text_b = self.read("path_b", &params.path_b)?;

        let units_a = split(&text_a, &params.granularity);
        let units_b = split(&text_b, &params.granularity);
        let changes = diff(&units_a, &units_b);

        let added = changes
            .iter()
            .filter(|c| c.kind == ChangeKind::Added)
            .count();
        let removed = changes.len() - added;
        let summary = format!("{} changes: {added} added, {removed} removed", changes.len());

        Ok(DiffDocumentsOutput { changes, summary })
    }
}

fn split<'a>(text: &'a str, granularity: &str) -> Vec<&'a str> {
    match granularity {
        "paragraph" => text
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect(),
        "sentence" => split_sentences(text),
        _ => text.split_whitespace().collect(),
    }
}

/// Splits after `.`, `!` or `?` when followed by whitespace.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let at_boundary = matches!(c, '.' | '!' | '?')
            && chars.peek().is_some_and(|(_, next)| next.is_whitespace());
        if at_boundary {
            sentences.push(&text[start..=i]);
            while let Some((_, next)) = chars.peek() {
                if !next.is_whitespace() {
                    break;
                }
                chars.next();
            }
            start = chars.peek().map_or(text.len(), |(j, _)| *j);
        }
    }
    sentences.push(&text[start..]);

    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Edit distance explored for one region before the whole region is reported
/// as replaced. Bounds both memory and time on unrelated inputs.
const MAX_EDIT_COST: usize = 4096;

fn diff<'a>(a: &[&'a str], b: &[&'a str]) -> Vec<Change> {
    let limit = max_cost(a.len(), b.len()).min(MAX_EDIT_COST);
    let mut forward = Frontier::new(limit);
    let mut backward = Frontier::new(limit);
    let mut script = Script::default();
    conquer(a, b, &mut forward, &mut backward, &mut script);
    script.finish()
}

/// Upper bound on `d` in the middle-snake search for inputs of these sizes.
const fn max_cost(n: usize, m: usize) -> usize {
    (n + m + 1) / 2 + 1
}

/// Furthest-reaching x per diagonal `k`, indexed from `-limit` to `limit`.
struct Frontier {
    offset: isize,
    v: Vec<usize>,
}

impl Frontier {
    #[allow(clippy::cast_possible_wrap)]
    fn new(limit: usize) -> Self {
        Self {
            offset: limit as isize,
            v: vec![0; 2 * limit + 1],
        }
    }
}

impl Index<isize> for Frontier {
    type Output = usize;

    #[allow(clippy::cast_sign_loss)]
    fn index(&self, k: isize) -> &usize {
        &self.v[(k + self.offset) as usize]
    }
}

impl IndexMut<isize> for Frontier {
    #[allow(clippy::cast_sign_loss)]
    fn index_mut(&mut self, k: isize) -> &mut usize {
        &mut self.v[(k + self.offset) as usize]
    }
}

/// Collects edits, listing removals before additions within each run.
#[derive(Default)]
struct Script<'a> {
    changes: Vec<Change>,
    removed: Vec<&'a str>,
    added: Vec<&'a str>,
}

impl<'a> Script<'a> {
    fn keep(&mut self) {
        self.changes
            .extend(self.removed.drain(..).map(|text| Change::new(ChangeKind::Removed, text)));
        self.changes
            .extend(self.added.drain(..).map(|text| Change::new(ChangeKind::Added, text)));
    }

    fn remove(&mut self, units: &[&'a str]) {
        self.removed.extend_from_slice(units);
    }

    fn add(&mut self, units: &[&'a str]) {
        self.added.extend_from_slice(units);
    }

    fn finish(mut self) -> Vec<Change> {
        self.keep();
        self.changes
    }
}

fn common_prefix(a: &[&str], b: &[&str]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn common_suffix(a: &[&str], b: &[&str]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Linear-space divide and conquer over middle snakes (Myers 1986, 4b).
fn conquer<'a>(
    a: &[&'a str],
    b: &[&'a str],
    forward: &mut Frontier,
    backward: &mut Frontier,
    script: &mut Script<'a>,
) {
    let prefix = common_prefix(a, b);
    if prefix > 0 {
        script.keep();
    }
    let (a, b) = (&a[prefix..], &b[prefix..]);
    let suffix = common_suffix(a, b);
    let (a, b) = (&a[..a.len() - suffix], &b[..b.len() - suffix]);

    if a.is_empty() {
        script.add(b);
    } else if b.is_empty() {
        script.remove(a);
    } else if let Some((x, y)) = middle_snake(a, b, forward, backward) {
        conquer(&a[..x], &b[..y], forward, backward, script);
        conquer(&a[x..], &b[y..], forward, backward, script);
    } else {
        script.remove(a);
        script.add(b);
    }

    if suffix > 0 {
        script.keep();
    }
}

/// Finds a split point on an optimal edit path, or `None` when the edit
/// distance exceeds the frontier's capacity.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn middle_snake(
    a: &[&str],
    b: &[&str],
    forward: &mut Frontier,
    backward: &mut Frontier,
) -> Option<(usize, usize)> {
    let (n, m) = (a.len(), b.len());
    let delta = n as isize - m as isize;
    let odd = delta & 1 == 1;
    let limit = max_cost(n, m).min(forward.offset as usize) as isize;
    forward[1] = 0;
    backward[1] = 0;

    for d in 0..limit {
        for k in (-d..=d).rev().step_by(2) {
            let mut x = if k == -d || (k != d && forward[k - 1] < forward[k + 1]) {
                forward[k + 1]
            } else {
                forward[k - 1] + 1
            };
            let y = (x as isize - k) as usize;
            let (x0, y0) = (x, y);
            if x < n && y < m {
                x += common_prefix(&a[x..], &b[y..]);
            }
            forward[k] = x;
            if odd && (k - delta).abs() < d && forward[k] + backward[delta - k] >= n {
                return Some((x0, y0));
            }
        }

        for k in (-d..=d).rev().step_by(2) {
            let mut x = if k == -d || (k != d && backward[k - 1] < backward[k + 1]) {
                backward[k + 1]
            } else {
                backward[k - 1] + 1
            };
            let mut y = (x as isize - k) as usize;
            if x < n && y < m {
                let run = common_suffix(&a[..n - x], &b[..m - y]);
                x += run;
                y += run;
            }
            backward[k] = x;
            if !odd && (k - delta).abs() <= d && backward[k] + forward[delta - k] >= n {
                return Some((n - x, m - y));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::protocol::ErrorCode;
    use std::fs;

    fn run(
        dir: &Path,
        a: &str,
        b: &str,
        granularity: &str,
    ) -> Result<DiffDocumentsOutput, ToolError> {
        let path_a = dir.join("a.txt");
        let path_b = dir.join("b.txt");
        fs::write(&path_a, a).unwrap();
        fs::write(&path_b, b).unwrap();

        DiffDocuments::new(Sandbox::new([dir]), HtmlStripper::new().unwrap()).execute(
            DiffDocumentsParams {
                path_a: path_a.display().to_string(),
                path_b: path_b.display().to_string(),
                granularity: granularity.to_string(),
            },
        )
    }

    #[test]
    fn paragraph_changes() {
        let dir = tempfile::tempdir().unwrap();
        let out = run(
            dir.path(),
            "Intro\n\nOld middle\n\nOutro",
            "Intro\n\nNew middle\n\nOutro\n\nAppendix",
            "paragraph",
        )
        .unwrap();

        assert_eq!(
            out.changes,
            [
                Change::new(ChangeKind::Removed, "Old middle"),
                Change::new(ChangeKind::Added, "New middle"),
                Change::new(ChangeKind::Added, "Appendix"),
            ]
        );
        assert_eq!(out.summary, "3 changes: 2 added, 1 removed");
    }

    #[test]
    fn identical_documents_have_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let out = run(dir.path(), "Same.\n\nText.", "Same.\n\nText.", "sentence").unwrap();
        assert!(out.changes.is_empty());
        assert_eq!(out.summary, "0 changes: 0 added, 0 removed");
    }

    #[test]
    fn word_changes() {
        let dir = tempfile::tempdir().unwrap();
        let out = run(dir.path(), "the quick brown fox", "the slow brown fox jumps", "word").unwrap();
        assert_eq!(
            out.changes,
            [
                Change::new(ChangeKind::Removed, "quick"),
                Change::new(ChangeKind::Added, "slow"),
                Change::new(ChangeKind::Added, "jumps"),
            ]
        );
    }

    #[test]
    fn sentences_split_on_terminal_punctuation() {
        assert_eq!(
            split_sentences("One. Two!  Three?\nFour 3.5 five"),
            ["One.", "Two!", "Three?", "Four 3.5 five"]
        );
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn invalid_granularity() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(dir.path(), "a", "b", "line").unwrap_err();
        assert!(matches!(
            err,
            ToolError::Domain {
                code: ErrorCode::InvalidParams,
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "Invalid granularity: line. Allowed: paragraph, sentence, word"
        );
    }

    #[test]
    fn missing_second_document() {
        let dir = tempfile::tempdir().unwrap();
        let path_a = dir.path().join("a.txt");
        fs::write(&path_a, "x").unwrap();

        let err = DiffDocuments::new(Sandbox::new([dir.path()]), HtmlStripper::new().unwrap())
            .execute(DiffDocumentsParams {
                path_a: path_a.display().to_string(),
                path_b: dir.path().join("gone.txt").display().to_string(),
                granularity: default_granularity(),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            ToolError::Domain {
                code: ErrorCode::FileNotFound,
                ..
            }
        ));
    }

    #[test]
    fn granularity_defaults_to_paragraph() {
        let params: DiffDocumentsParams =
            serde_json::from_value(json!({ "path_a": "/a", "path_b": "/b" })).unwrap();
        assert_eq!(params.granularity, "paragraph");
    }

    #[test]
    fn changes_carry_an_empty_context() {
        let change = Change::new(ChangeKind::Added, "new");
        assert_eq!(
            serde_json::to_value(change).unwrap(),
            json!({ "type": "added", "text": "new", "context": "" })
        );
    }

    #[test]
    fn scattered_edits_in_a_long_document() {
        let a: Vec<String> = (0..30_000).map(|i| format!("w{i}")).collect();
        let mut b = a.clone();
        b[1_000] = "first".to_string();
        b.insert(15_000, "second".to_string());
        b.remove(29_000);
        let a: Vec<&str> = a.iter().map(String::as_str).collect();
        let b: Vec<&str> = b.iter().map(String::as_str).collect();

        assert_eq!(
            diff(&a, &b),
            [
                Change::new(ChangeKind::Removed, "w1000"),
                Change::new(ChangeKind::Added, "first"),
                Change::new(ChangeKind::Added, "second"),
                Change::new(ChangeKind::Removed, "w28999"),
            ]
        );
    }

    #[test]
    fn interleaved_edits_stay_minimal() {
        let a = ["a", "b", "c", "a", "b", "b", "a"];
        let b = ["c", "b", "a", "b", "a", "c"];
        let changes = diff(&a, &b);
        let removed = changes
            .iter()
            .filter(|c| c.kind == ChangeKind::Removed)
            .count();
        assert_eq!(removed, 3);
        assert_eq!(changes.len(), 5);
    }

    #[test]
    fn unrelated_large_documents_are_replaced_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let a: Vec<String> = (0..20_000).map(|i| format!("old{i}")).collect();
        let b: Vec<String> = (0..20_000).map(|i| format!("new{i}")).collect();

        let out = run(dir.path(), &a.join(" "), &b.join(" "), "word").unwrap();

        assert_eq!(out.changes.len(), 40_000);
        assert_eq!(out.summary, "40000 changes: 20000 added, 20000 removed");
        assert_eq!(out.changes[0], Change::new(ChangeKind::Removed, "old0"));
        assert_eq!(out.changes[20_000], Change::new(ChangeKind::Added, "new0"));
    }
}
