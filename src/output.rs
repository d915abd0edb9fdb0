use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::clipboard::Clipboard;
use crate::extract::ExtractError;
use crate::status::Status;

/// Destination of the formatted diff.
pub enum Output {
    Clipboard(Arc<dyn Clipboard>),
    Stdout,
    File(PathBuf),
}

impl Output {
    /// Write `text` and report the status shown to the user.
    #[instrument(skip_all, fields(bytes = text.len()))]
    pub async fn write(&self, text: &str) -> Result<Status, ExtractError> {
        match self {
            Output::Clipboard(clipboard) => {
                clipboard.write_text(text).await?;
                Ok(Status::Copied)
            }
            Output::Stdout => {
                debug!("writing diff to stdout");
                print!("{}", text);
                Ok(Status::Printed)
            }
            Output::File(path) => {
                debug!(path = %path.display(), "writing diff to file");
                tokio::fs::write(path, text).await?;
                Ok(Status::Saved)
            }
        }
    }
}
