use serde::Deserialize;

/// Kind of a canonical diff line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Addition,
    Deletion,
    Context,
}

impl LineKind {
    /// Marker written in front of the line text in the formatted output.
    pub fn marker(self) -> char {
        match self {
            LineKind::Addition => '+',
            LineKind::Deletion => '-',
            LineKind::Context => ' ',
        }
    }
}

/// A single normalized diff line, produced by either the patch parser or the
/// HTML scraper. `text` never carries the leading `+`/`-`/` ` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub kind: LineKind,
    /// Line number in the new file. Always `None` for deletions.
    pub line_number: Option<usize>,
    pub text: String,
}

impl DiffLine {
    pub fn new(kind: LineKind, line_number: Option<usize>, text: impl Into<String>) -> Self {
        let line_number = match kind {
            LineKind::Deletion => None,
            _ => line_number,
        };
        Self {
            kind,
            line_number,
            text: text.into(),
        }
    }
}

/// All canonical lines extracted for one changed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// File path (e.g., "src/auth/config.rs")
    pub path: String,
    pub lines: Vec<DiffLine>,
}

impl FileDiff {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Title, number and description of the PR being extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub title: String,
    /// PR number as text, or [`UNKNOWN_IDENTIFIER`].
    pub identifier: String,
    pub owner_repo: Option<(String, String)>,
    pub description: Option<String>,
}

pub const UNKNOWN_IDENTIFIER: &str = "unknown";
pub const UNKNOWN_TITLE: &str = "Unknown PR";

/// Represents the parsed components of a GitHub PR URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrUrl {
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
}

/// The page the extraction runs against. `pr` is `None` when the address
/// does not identify a pull request, in which case only the HTML path runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageAddress {
    pub url: String,
    pub pr: Option<PrUrl>,
}

/// One record of `GET /repos/{owner}/{repo}/pulls/{number}/files`.
/// `patch` is absent for binary files and pure renames.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    #[serde(default)]
    pub patch: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// The subset of `GET /repos/{owner}/{repo}/pulls/{number}` used for the header.
#[derive(Debug, Clone, Deserialize)]
pub struct PrSummary {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deletion_drops_line_number() {
        let line = DiffLine::new(LineKind::Deletion, Some(7), "gone");
        assert_eq!(line.line_number, None);

        let line = DiffLine::new(LineKind::Addition, Some(7), "new");
        assert_eq!(line.line_number, Some(7));
    }

    #[test]
    fn test_line_kind_markers() {
        assert_eq!(LineKind::Addition.marker(), '+');
        assert_eq!(LineKind::Deletion.marker(), '-');
        assert_eq!(LineKind::Context.marker(), ' ');
    }

    #[test]
    fn test_changed_file_without_patch() {
        let json = r#"[{"filename": "logo.png", "status": "added", "sha": "abc"}]"#;
        let files: Vec<ChangedFile> = serde_json::from_str(json).unwrap();
        assert_eq!(files[0].filename, "logo.png");
        assert!(files[0].patch.is_none());
    }
}
