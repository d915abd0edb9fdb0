use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use super::*;
use crate::clipboard::Clipboard;
use crate::pr::types::{ChangedFile, LineKind, PrSummary, PrUrl};

const FILES_VIEW: &str = include_str!("../../tests/fixtures/files_view.html");
const CONVERSATION: &str = include_str!("../../tests/fixtures/conversation.html");

const PR_URL: &str = "https://github.com/org/repo/pull/42";
const FILES_URL: &str = "https://github.com/org/repo/pull/42/files";

/// Files API double: either a fixed list of records or an HTTP status.
struct FakeApi {
    files: Result<Vec<ChangedFile>, u16>,
    summary: Option<PrSummary>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl FakeApi {
    fn with_files(files: Vec<ChangedFile>) -> Self {
        Self {
            files: Ok(files),
            summary: None,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn failing(status: u16) -> Self {
        Self {
            files: Err(status),
            ..Self::with_files(vec![])
        }
    }
}

#[async_trait]
impl PullRequestApi for FakeApi {
    async fn list_files(&self, pr: &PrUrl) -> Result<Vec<ChangedFile>, PrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.files {
            Ok(files) => Ok(files.clone()),
            Err(status) => Err(PrError::ApiStatus {
                status: *status,
                url: format!("/repos/{}/{}/pulls/{}/files", pr.owner, pr.repo, pr.pr_number),
            }),
        }
    }

    async fn fetch_summary(&self, _pr: &PrUrl) -> Result<PrSummary, PrError> {
        self.summary.clone().ok_or(PrError::ApiStatus {
            status: 404,
            url: "summary".to_string(),
        })
    }
}

/// Serves canned HTML per URL and records every load, along with whether
/// the watched resume record existed at that moment.
struct FakePages {
    pages: HashMap<String, String>,
    loads: Arc<Mutex<Vec<String>>>,
    watched: Option<PathBuf>,
    record_seen: Arc<Mutex<Vec<bool>>>,
}

impl FakePages {
    fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, html)| (url.to_string(), html.to_string()))
                .collect(),
            loads: Arc::new(Mutex::new(Vec::new())),
            watched: None,
            record_seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn watching(mut self, record: PathBuf) -> Self {
        self.watched = Some(record);
        self
    }
}

#[async_trait]
impl PageSource for FakePages {
    async fn load(&self, address: &PageAddress) -> Result<String, PrError> {
        self.loads.lock().unwrap().push(address.url.clone());
        if let Some(record) = &self.watched {
            self.record_seen.lock().unwrap().push(record.exists());
        }
        self.pages
            .get(&address.url)
            .cloned()
            .ok_or_else(|| PrError::ApiStatus {
                status: 404,
                url: address.url.clone(),
            })
    }
}

#[derive(Default)]
struct MemoryClipboard {
    text: Mutex<Option<String>>,
    unavailable: bool,
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        if self.unavailable {
            return Err(ClipboardError::Unavailable {
                tried: "memory".to_string(),
            });
        }
        *self.text.lock().unwrap() = Some(text.to_string());
        Ok(())
    }
}

fn options() -> ExtractOptions {
    ExtractOptions::from(&ExtractionConfig::default())
}

fn extractor(api: FakeApi, pages: FakePages, options: ExtractOptions, dir: &TempDir) -> Extractor {
    let resume = ResumeStore::new(dir.path().join("resume.json"));
    Extractor::new(Box::new(api), Box::new(pages), options, resume).unwrap()
}

fn changed(filename: &str, patch: Option<&str>) -> ChangedFile {
    ChangedFile {
        filename: filename.to_string(),
        patch: patch.map(str::to_string),
        status: Some("modified".to_string()),
    }
}

fn clipboard_output() -> (Arc<MemoryClipboard>, Output) {
    let clipboard = Arc::new(MemoryClipboard::default());
    let output = Output::Clipboard(clipboard.clone());
    (clipboard, output)
}

#[tokio::test]
async fn test_api_success_skips_page() {
    let dir = TempDir::new().unwrap();
    let api = FakeApi::with_files(vec![
        changed("a.txt", Some("@@ -1,2 +1,3 @@\n context\n+added\n-removed\n")),
        changed("logo.png", None),
    ]);
    let pages = FakePages::new(&[]);
    let loads = pages.loads.clone();
    let extractor = extractor(api, pages, options(), &dir);

    let outcome = extractor.extract(&PageAddress::new(PR_URL)).await.unwrap();
    match outcome {
        Outcome::Extracted { files, source, html } => {
            assert_eq!(source, DiffSource::Api);
            assert!(html.is_none());
            assert_eq!(files.len(), 1);
            assert_eq!(files[0].path, "a.txt");
            assert_eq!(files[0].lines[2].kind, LineKind::Deletion);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(extractor.state(), ExtractionState::Success);
    assert!(loads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_api_404_falls_back_to_page() {
    let dir = TempDir::new().unwrap();
    let extractor = extractor(
        FakeApi::failing(404),
        FakePages::new(&[(FILES_URL, FILES_VIEW)]),
        options(),
        &dir,
    );

    let outcome = extractor.extract(&PageAddress::new(FILES_URL)).await.unwrap();
    match outcome {
        Outcome::Extracted { files, source, .. } => {
            assert_eq!(source, DiffSource::Dom);
            assert_eq!(files.len(), 3);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_api_files_without_patches_fall_back_to_page() {
    let dir = TempDir::new().unwrap();
    let extractor = extractor(
        FakeApi::with_files(vec![changed("logo.png", None)]),
        FakePages::new(&[(FILES_URL, FILES_VIEW)]),
        options(),
        &dir,
    );

    let outcome = extractor.extract(&PageAddress::new(FILES_URL)).await.unwrap();
    assert!(matches!(
        outcome,
        Outcome::Extracted {
            source: DiffSource::Dom,
            ..
        }
    ));
}

#[tokio::test]
async fn test_unresolvable_address_goes_straight_to_page() {
    let dir = TempDir::new().unwrap();
    let api = FakeApi::with_files(vec![changed("a.txt", Some("@@ -1 +1 @@\n+x"))]);
    let calls = api.calls.clone();
    let saved = "file:///tmp/pr.html";
    let extractor = extractor(api, FakePages::new(&[(saved, FILES_VIEW)]), options(), &dir);

    let outcome = extractor.extract(&PageAddress::new(saved)).await.unwrap();
    assert!(matches!(outcome, Outcome::Extracted { source: DiffSource::Dom, .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_dom_only_mode_never_calls_api() {
    let dir = TempDir::new().unwrap();
    let api = FakeApi::with_files(vec![changed("a.txt", Some("@@ -1 +1 @@\n+x"))]);
    let calls = api.calls.clone();
    let mut options = options();
    options.mode = ExtractionMode::DomOnly;
    let extractor = extractor(api, FakePages::new(&[(FILES_URL, FILES_VIEW)]), options, &dir);

    let outcome = extractor.extract(&PageAddress::new(FILES_URL)).await.unwrap();
    assert!(matches!(outcome, Outcome::Extracted { source: DiffSource::Dom, .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_conversation_page_needs_navigation() {
    let dir = TempDir::new().unwrap();
    let extractor = extractor(
        FakeApi::failing(500),
        FakePages::new(&[(PR_URL, CONVERSATION)]),
        options(),
        &dir,
    );

    let outcome = extractor.extract(&PageAddress::new(PR_URL)).await.unwrap();
    match outcome {
        Outcome::NeedsNavigation { files_view } => assert_eq!(files_view.url, FILES_URL),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(extractor.state(), ExtractionState::NeedsNavigation);
}

#[tokio::test]
async fn test_empty_files_view_fails() {
    let dir = TempDir::new().unwrap();
    let extractor = extractor(
        FakeApi::failing(404),
        FakePages::new(&[(FILES_URL, CONVERSATION)]),
        options(),
        &dir,
    );
    let (clipboard, output) = clipboard_output();

    let result = extractor
        .trigger(&PageAddress::new(FILES_URL), &output)
        .await
        .unwrap();
    let error = result.unwrap_err();
    assert!(matches!(error, ExtractError::EmptyResult));
    assert_eq!(Status::from(&error).label(), "No diff");
    assert_eq!(extractor.state(), ExtractionState::Failed);
    assert!(clipboard.text.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_trigger_navigates_and_retries_once() {
    let dir = TempDir::new().unwrap();
    let record = dir.path().join("resume.json");
    let pages = FakePages::new(&[(PR_URL, CONVERSATION), (FILES_URL, FILES_VIEW)])
        .watching(record.clone());
    let loads = pages.loads.clone();
    let record_seen = pages.record_seen.clone();
    let extractor = extractor(FakeApi::failing(403), pages, options(), &dir);
    let (clipboard, output) = clipboard_output();

    let delivered = extractor
        .trigger(&PageAddress::new(PR_URL), &output)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(delivered.status, Status::Copied);
    assert_eq!(delivered.source, DiffSource::Dom);
    assert_eq!(delivered.files, 3);
    assert_eq!(delivered.page.identifier, "42");
    assert_eq!(delivered.page.title, "Greet the whole world");
    // The files view was loaded once and reused for the header.
    assert_eq!(*loads.lock().unwrap(), vec![PR_URL.to_string(), FILES_URL.to_string()]);
    // The record is on disk while the files view loads and gone afterwards.
    assert_eq!(*record_seen.lock().unwrap(), vec![false, true]);
    assert!(!record.exists());

    let text = clipboard.text.lock().unwrap().clone().unwrap();
    assert!(text.starts_with("PR Diff: Greet the whole world (#42)\n\n"));
    assert!(text.contains("[src/lib.rs]\n  pub fn greet() {\n- println!(\"hello\");\n"));
}

#[tokio::test]
async fn test_trigger_without_follow_reports_go_to_files() {
    let dir = TempDir::new().unwrap();
    let pages = FakePages::new(&[(PR_URL, CONVERSATION), (FILES_URL, FILES_VIEW)]);
    let loads = pages.loads.clone();
    let mut options = options();
    options.follow_navigation = false;
    let extractor = extractor(FakeApi::failing(404), pages, options, &dir);
    let (_, output) = clipboard_output();

    let error = extractor
        .trigger(&PageAddress::new(PR_URL), &output)
        .await
        .unwrap()
        .unwrap_err();
    match &error {
        ExtractError::NavigationRequired { files_url } => assert_eq!(files_url, FILES_URL),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(Status::from(&error), Status::GoToFiles);
    assert_eq!(loads.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_trigger_uses_api_summary_for_header() {
    let dir = TempDir::new().unwrap();
    let mut api = FakeApi::with_files(vec![changed(
        "src/auth.rs",
        Some("@@ -1,1 +1,2 @@\n use std::io;\n+fn login() {}"),
    )]);
    api.summary = Some(PrSummary {
        number: 42,
        title: "Add OAuth2 login flow".to_string(),
        body: Some("Adds the OAuth2 login flow.".to_string()),
    });
    let extractor = extractor(api, FakePages::new(&[]), options(), &dir);
    let (clipboard, output) = clipboard_output();

    extractor
        .trigger(&PageAddress::new(PR_URL), &output)
        .await
        .unwrap()
        .unwrap();

    let text = clipboard.text.lock().unwrap().clone().unwrap();
    assert_eq!(
        text,
        "PR Diff: Add OAuth2 login flow (#42)\n\n\
         Description:\nAdds the OAuth2 login flow.\n\n\
         [src/auth.rs]\n  use std::io;\n+ fn login() {}\n\n"
    );
}

#[tokio::test]
async fn test_header_defaults_when_nothing_resolves() {
    let dir = TempDir::new().unwrap();
    let api = FakeApi::with_files(vec![changed("a.txt", Some("@@ -1 +1 @@\n+hello there"))]);
    let extractor = extractor(api, FakePages::new(&[]), options(), &dir);

    let page = extractor.page_info(&PageAddress::new(PR_URL), None).await;
    assert_eq!(page.title, "Unknown PR");
    assert_eq!(page.identifier, "42");
    assert_eq!(page.owner_repo, Some(("org".to_string(), "repo".to_string())));
    assert!(page.description.is_none());
}

#[tokio::test]
async fn test_short_artifact_is_rejected() {
    let dir = TempDir::new().unwrap();
    let api = FakeApi::with_files(vec![changed("a", Some("@@ -1 +1 @@\n+x"))]);
    let mut options = options();
    options.min_output_chars = 500;
    let extractor = extractor(api, FakePages::new(&[]), options, &dir);
    let (clipboard, output) = clipboard_output();

    let error = extractor
        .trigger(&PageAddress::new(PR_URL), &output)
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(error, ExtractError::ArtifactTooShort { .. }));
    assert_eq!(Status::from(&error).label(), "Empty");
    assert!(clipboard.text.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_clipboard_unavailable_surfaces() {
    let dir = TempDir::new().unwrap();
    let api = FakeApi::with_files(vec![changed("a.txt", Some("@@ -1 +1 @@\n+hello there"))]);
    let extractor = extractor(api, FakePages::new(&[]), options(), &dir);
    let output = Output::Clipboard(Arc::new(MemoryClipboard {
        unavailable: true,
        ..Default::default()
    }));

    let error = extractor
        .trigger(&PageAddress::new(PR_URL), &output)
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(Status::from(&error), Status::NoClipboard);
}

#[tokio::test]
async fn test_concurrent_trigger_is_dropped() {
    let dir = TempDir::new().unwrap();
    let mut api = FakeApi::with_files(vec![changed("a.txt", Some("@@ -1 +1 @@\n+hello there"))]);
    api.delay = Duration::from_millis(50);
    let calls = api.calls.clone();
    let extractor = extractor(api, FakePages::new(&[]), options(), &dir);
    let (_, output) = clipboard_output();
    let address = PageAddress::new(PR_URL);

    let (first, second) = tokio::join!(
        extractor.trigger(&address, &output),
        extractor.trigger(&address, &output),
    );
    assert!(first.unwrap().is_ok());
    assert!(second.is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // The flag is released once the first trigger completes.
    assert!(extractor.trigger(&address, &output).await.is_some());
}

#[tokio::test]
async fn test_take_pending_resumes_matching_pr_once() {
    let dir = TempDir::new().unwrap();
    let extractor = extractor(FakeApi::failing(404), FakePages::new(&[]), options(), &dir);
    let conversation = PageAddress::new(PR_URL);
    assert!(extractor.take_pending(&conversation).is_none());

    extractor.navigate(&PageAddress::new(FILES_URL));
    let resumed = extractor.take_pending(&conversation).unwrap();
    assert_eq!(resumed.url, FILES_URL);
    assert!(extractor.take_pending(&conversation).is_none());
}

#[tokio::test]
async fn test_take_pending_ignores_record_of_other_pr() {
    let dir = TempDir::new().unwrap();
    let extractor = extractor(FakeApi::failing(404), FakePages::new(&[]), options(), &dir);
    extractor.navigate(&PageAddress::new(FILES_URL));

    let other = PageAddress::new("https://github.com/org/repo/pull/7");
    assert!(extractor.take_pending(&other).is_none());
    // Still there for the PR it belongs to.
    assert!(extractor.take_pending(&PageAddress::new(PR_URL)).is_some());
}

#[tokio::test]
async fn test_retry_needs_saved_resume_record() {
    let dir = TempDir::new().unwrap();
    // A directory where the record file should be makes every save fail.
    let record = dir.path().join("resume.json");
    std::fs::create_dir_all(record.join("blocked")).unwrap();
    let pages = FakePages::new(&[(PR_URL, CONVERSATION), (FILES_URL, FILES_VIEW)]);
    let loads = pages.loads.clone();
    let extractor = extractor(FakeApi::failing(404), pages, options(), &dir);
    let (clipboard, output) = clipboard_output();

    let error = extractor
        .trigger(&PageAddress::new(PR_URL), &output)
        .await
        .unwrap()
        .unwrap_err();

    assert!(matches!(error, ExtractError::NavigationRequired { .. }));
    assert_eq!(*loads.lock().unwrap(), vec![PR_URL.to_string()]);
    assert!(clipboard.text.lock().unwrap().is_none());
}
