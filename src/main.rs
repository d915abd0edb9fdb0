mod clipboard;
mod config;
mod extract;
mod format;
mod output;
mod pr;
mod scrape;
mod status;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, info_span};
use tracing_subscriber::EnvFilter;

use config::ExtractionMode;
use extract::resume::ResumeStore;
use extract::{ExtractError, ExtractOptions, Extractor};
use output::Output;
use pr::{GitHubClient, HttpPageSource, PageAddress, PageSource, SavedPageSource};
use status::Status;

/// pr-llm-diff: copies a GitHub Pull Request diff to the clipboard as plain
/// text ready to paste into an LLM prompt.
#[derive(Parser, Debug)]
#[command(name = "pr-llm-diff", version, about)]
struct Cli {
    /// GitHub Pull Request URL (e.g., https://github.com/org/repo/pull/42)
    ///
    /// Not required when --html is used.
    pr_url: Option<String>,

    /// Scrape a PR page saved from the browser instead of fetching it
    #[arg(long)]
    html: Option<PathBuf>,

    /// Write the formatted diff to a file instead of the clipboard
    #[arg(short, long, conflicts_with = "stdout")]
    output: Option<PathBuf>,

    /// Print the formatted diff to stdout instead of the clipboard
    #[arg(long)]
    stdout: bool,

    /// Skip the GitHub API and read the rendered page only
    #[arg(long)]
    dom_only: bool,

    /// Do not switch to the files-changed view when the page shows no diff
    #[arg(long)]
    no_follow: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut address = match (&cli.pr_url, &cli.html) {
        (Some(url), _) => {
            if cli.html.is_none() && !pr::is_pr_page(url) {
                return Err(pr::PrError::InvalidUrl(url.clone()).into());
            }
            PageAddress::new(url.as_str())
        }
        (None, Some(path)) => PageAddress::new(format!("file://{}", path.display())),
        (None, None) => {
            return Err(
                "PR URL is required unless --html is used. Usage: pr-llm-diff <URL> or pr-llm-diff --html <FILE>"
                    .into(),
            )
        }
    };

    let _main_span = info_span!("pr_llm_diff", url = %address.url).entered();

    info!("loading configuration");
    let mut config = config::Config::load()?;
    if cli.dom_only {
        config.extraction.mode = ExtractionMode::DomOnly;
    }
    if cli.no_follow {
        config.extraction.follow_navigation = false;
    }
    debug!(mode = ?config.extraction.mode, follow = config.extraction.follow_navigation, "extraction settings");

    let pages: Box<dyn PageSource> = match &cli.html {
        Some(path) => Box::new(SavedPageSource::new(path)),
        None => Box::new(HttpPageSource::new(&config)?),
    };
    let extractor = Extractor::new(
        Box::new(GitHubClient::new(&config)?),
        pages,
        ExtractOptions::from(&config.extraction),
        ResumeStore::new(config.resume_path()),
    )?;

    // A previous run stopped between navigating and extracting.
    if let Some(files_view) = extractor.take_pending(&address) {
        info!(url = %files_view.url, "resuming extraction on files view");
        address = files_view;
    }

    let output = match (cli.output, cli.stdout) {
        (Some(path), _) => Output::File(path),
        (None, true) => Output::Stdout,
        (None, false) => Output::Clipboard(Arc::new(clipboard::SystemClipboard::new(
            config.clipboard.command.clone(),
        ))),
    };

    info!("extracting diff");
    let result = extractor.trigger(&address, &output).await;
    debug!(state = ?extractor.state(), "extraction finished");
    match result {
        Some(Ok(delivered)) => {
            let detail = format!(
                "{} files, {} chars from {} for PR #{}",
                delivered.files, delivered.chars, delivered.source, delivered.page.identifier
            );
            status::report(delivered.status, Some(&detail));
            Ok(ExitCode::SUCCESS)
        }
        Some(Err(e)) => {
            error!(error = %e, "extraction failed");
            let detail = match &e {
                ExtractError::NavigationRequired { files_url } => Some(files_url.as_str()),
                _ => None,
            };
            status::report(Status::from(&e), detail);
            Ok(ExitCode::FAILURE)
        }
        None => {
            status::report(Status::Error, Some("an extraction is already running"));
            Ok(ExitCode::FAILURE)
        }
    }
}
