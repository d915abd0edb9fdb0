use super::types::{DiffLine, FileDiff, LineKind};
use super::PrError;

/// Parse the `patch` field of one changed-file record into a FileDiff.
///
/// The patch is the hunk portion of a unified diff, without the
/// `diff --git` / `---` / `+++` file headers:
///
///   @@ -{old_start},{old_count} +{new_start},{new_count} @@ {section}
///
/// Lines are prefixed with:
///   '+' for additions (numbered in the new file)
///   '-' for deletions (never numbered)
///   ' ' for context (numbered in the new file)
///
/// Every hunk header resets the running line number to its new-start value.
/// Anything else, such as `\ No newline at end of file`, is ignored. A missing
/// patch (binary files, renames) yields a FileDiff with no lines.
pub fn parse_patch(filename: &str, patch: Option<&str>) -> FileDiff {
    let mut lines = Vec::new();
    let mut current_line = 0usize;

    for line in patch.unwrap_or_default().lines() {
        if line.starts_with("@@") {
            if let Ok((_, _, new_start, _)) = parse_hunk_header(line) {
                current_line = new_start;
            }
            continue;
        }

        if let Some(text) = line.strip_prefix('+') {
            lines.push(DiffLine::new(LineKind::Addition, Some(current_line), text));
            current_line = current_line.saturating_add(1);
        } else if let Some(text) = line.strip_prefix('-') {
            lines.push(DiffLine::new(LineKind::Deletion, None, text));
        } else if let Some(text) = line.strip_prefix(' ') {
            lines.push(DiffLine::new(LineKind::Context, Some(current_line), text));
            current_line = current_line.saturating_add(1);
        }
    }

    FileDiff {
        path: filename.to_string(),
        lines,
    }
}

fn parse_hunk_header(line: &str) -> Result<(usize, usize, usize, usize), PrError> {
    let header = line
        .trim()
        .strip_prefix("@@")
        .ok_or_else(|| PrError::DiffParse("Invalid hunk header".to_string()))?;
    // Anything after the closing "@@" is the section heading.
    let (ranges, _) = header
        .split_once("@@")
        .ok_or_else(|| PrError::DiffParse("Unterminated hunk header".to_string()))?;
    let mut parts = ranges.split_whitespace();
    let old_part = parts
        .next()
        .ok_or_else(|| PrError::DiffParse("Missing old range".to_string()))?;
    let new_part = parts
        .next()
        .ok_or_else(|| PrError::DiffParse("Missing new range".to_string()))?;

    let (old_start, old_count) = parse_range(old_part, '-')?;
    let (new_start, new_count) = parse_range(new_part, '+')?;

    Ok((old_start, old_count, new_start, new_count))
}

fn parse_range(part: &str, prefix: char) -> Result<(usize, usize), PrError> {
    let range = part
        .strip_prefix(prefix)
        .ok_or_else(|| PrError::DiffParse("Invalid range prefix".to_string()))?;
    let (start_str, count_str) = match range.split_once(',') {
        Some((start, count)) => (start, count),
        None => (range, "1"),
    };
    let start = start_str
        .parse::<usize>()
        .map_err(|_| PrError::DiffParse(format!("Invalid range start in {}", part)))?;
    let count = count_str
        .parse::<usize>()
        .map_err(|_| PrError::DiffParse(format!("Invalid range count in {}", part)))?;
    Ok((start, count))
}
