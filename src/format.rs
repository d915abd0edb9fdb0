use crate::pr::types::{FileDiff, PageInfo};

/// Serialize the PR header and extracted files into the text that goes
/// into an LLM prompt:
///
/// PR Diff: Add OAuth2 login flow (#42)
///
/// Description:
/// Adds the login flow.
///
/// [src/auth.rs]
/// + fn login() {}
/// - fn old_login() {}
///
/// Line text is passed through verbatim.
pub fn format(page: &PageInfo, files: &[FileDiff]) -> String {
    let mut out = format!("PR Diff: {} (#{})\n\n", page.title, page.identifier);

    if let Some(description) = &page.description {
        out.push_str(&format!("Description:\n{}\n\n", description));
    }

    for file in files {
        out.push_str(&format!("[{}]\n", file.path));
        for line in &file.lines {
            out.push(line.kind.marker());
            out.push(' ');
            out.push_str(&line.text);
            out.push('\n');
        }
        out.push('\n');
    }

    out
}
