use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResumeError {
    #[error("Failed to access resume record: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode resume record: {0}")]
    Json(#[from] serde_json::Error),
}

/// Survives a navigation to the files-changed view, so the extraction
/// continues against the new page instead of starting over.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeRecord {
    pub pending_extraction: bool,
    /// Files view the pending extraction belongs to.
    #[serde(default)]
    pub files_url: Option<String>,
}

impl ResumeRecord {
    pub fn pending_for(files_url: &str) -> Self {
        Self {
            pending_extraction: true,
            files_url: Some(files_url.to_string()),
        }
    }

    /// True when an extraction is pending on exactly `files_url`.
    pub fn resumes(&self, files_url: &str) -> bool {
        self.pending_extraction && self.files_url.as_deref() == Some(files_url)
    }
}

/// Persists the [`ResumeRecord`] as a small JSON file.
pub struct ResumeStore {
    file_path: PathBuf,
}

impl ResumeStore {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    /// Load the record. A missing or unreadable record means nothing is pending.
    pub fn load(&self) -> Result<ResumeRecord, ResumeError> {
        if !self.file_path.exists() {
            return Ok(ResumeRecord::default());
        }
        let content = fs::read_to_string(&self.file_path)?;
        Ok(serde_json::from_str(&content).unwrap_or_default())
    }

    pub fn save(&self, record: &ResumeRecord) -> Result<(), ResumeError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(record)?;
        fs::write(&self.file_path, content)?;
        Ok(())
    }

    /// Delete the record file.
    pub fn clear(&self) -> Result<(), ResumeError> {
        if self.file_path.exists() {
            fs::remove_file(&self.file_path)?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}
