use colored::Colorize;

use crate::extract::ExtractError;

/// The one-word outcome shown to the user. Details go to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Copied,
    Printed,
    Saved,
    GoToFiles,
    NoDiff,
    Empty,
    NoClipboard,
    Error,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Copied => "Copied!",
            Status::Printed => "Printed",
            Status::Saved => "Saved",
            Status::GoToFiles => "Go to Files?",
            Status::NoDiff => "No diff",
            Status::Empty => "Empty",
            Status::NoClipboard => "No clipboard",
            Status::Error => "Error",
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, Status::Copied | Status::Printed | Status::Saved)
    }
}

impl From<&ExtractError> for Status {
    fn from(error: &ExtractError) -> Self {
        match error {
            ExtractError::EmptyResult => Status::NoDiff,
            ExtractError::ArtifactTooShort { .. } => Status::Empty,
            ExtractError::ClipboardUnavailable(_) => Status::NoClipboard,
            ExtractError::NavigationRequired { .. } => Status::GoToFiles,
            _ => Status::Error,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Print the status line to stderr, keeping stdout free for `--stdout`.
pub fn report(status: Status, detail: Option<&str>) {
    let label = match status {
        s if s.is_success() => s.label().green().bold(),
        Status::GoToFiles => status.label().yellow().bold(),
        _ => status.label().red().bold(),
    };
    match detail {
        Some(detail) => eprintln!("{} {}", label, detail.dimmed()),
        None => eprintln!("{}", label),
    }
}
