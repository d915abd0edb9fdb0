//! System clipboard access through the platform's copy command.

use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("No clipboard command available (tried: {tried})")]
    Unavailable { tried: String },

    #[error("Clipboard command `{command}` failed: {reason}")]
    CommandFailed { command: String, reason: String },
}

#[async_trait]
pub trait Clipboard: Send + Sync {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Pipes text into `pbcopy`, `clip`, `wl-copy`, `xclip` or `xsel`, whichever
/// works first, or into a configured command.
pub struct SystemClipboard {
    commands: Vec<Vec<String>>,
}

impl SystemClipboard {
    pub fn new(configured: Option<Vec<String>>) -> Self {
        let commands = match configured {
            Some(command) if !command.is_empty() => vec![command],
            _ => default_commands(),
        };
        Self { commands }
    }
}

const PBCOPY: &[&str] = &["pbcopy"];
const CLIP: &[&str] = &["clip"];
const WL_COPY: &[&str] = &["wl-copy"];
const XCLIP: &[&str] = &["xclip", "-selection", "clipboard"];
const XSEL: &[&str] = &["xsel", "--clipboard", "--input"];

fn default_commands() -> Vec<Vec<String>> {
    let raw: &[&[&str]] = if cfg!(target_os = "macos") {
        &[PBCOPY]
    } else if cfg!(target_os = "windows") {
        &[CLIP]
    } else if std::env::var_os("WAYLAND_DISPLAY").is_some() {
        &[WL_COPY, XCLIP, XSEL]
    } else {
        &[XCLIP, XSEL, WL_COPY]
    };
    raw.iter()
        .map(|cmd| cmd.iter().map(|s| s.to_string()).collect())
        .collect()
}

async fn pipe_into(command: &[String], text: &str) -> Result<(), ClipboardError> {
    let display = command.join(" ");
    let failed = |reason: String| ClipboardError::CommandFailed {
        command: display.clone(),
        reason,
    };
    let (program, args) = command
        .split_first()
        .ok_or_else(|| failed("empty command".to_string()))?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| failed(e.to_string()))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(text.as_bytes())
            .await
            .map_err(|e| failed(e.to_string()))?;
    }

    let status = child.wait().await.map_err(|e| failed(e.to_string()))?;
    if status.success() {
        Ok(())
    } else {
        Err(failed(format!("exited with {}", status)))
    }
}

#[async_trait]
impl Clipboard for SystemClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        for command in &self.commands {
            match pipe_into(command, text).await {
                Ok(()) => {
                    debug!(command = %command.join(" "), bytes = text.len(), "copied to clipboard");
                    return Ok(());
                }
                Err(e) => warn!(error = %e, "clipboard command failed"),
            }
        }
        Err(ClipboardError::Unavailable {
            tried: self
                .commands
                .iter()
                .map(|c| c.join(" "))
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_command_replaces_defaults() {
        let clipboard = SystemClipboard::new(Some(vec!["wl-copy".to_string()]));
        assert_eq!(clipboard.commands, vec![vec!["wl-copy".to_string()]]);
    }

    #[test]
    fn test_empty_configured_command_uses_defaults() {
        let clipboard = SystemClipboard::new(Some(vec![]));
        assert!(!clipboard.commands.is_empty());
    }

    #[tokio::test]
    async fn test_missing_command_is_unavailable() {
        let clipboard = SystemClipboard::new(Some(vec!["pr-llm-diff-no-such-command".to_string()]));
        let result = clipboard.write_text("hello").await;
        assert!(matches!(result, Err(ClipboardError::Unavailable { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pipes_text_into_command() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("clip.txt");
        let command = vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("cat > '{}'", out.display()),
        ];
        let clipboard = SystemClipboard::new(Some(command));
        clipboard.write_text("PR Diff: x (#1)\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "PR Diff: x (#1)\n");
    }
}
