#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use reqwest::header::HeaderMap;

use cover_fetcher::app::{ProgressEvent, ProgressLevel, ProgressSink};
use cover_fetcher::config::{CatalogSettings, DelayWindow, RetryPolicy, RunSettings};
use cover_fetcher::error::FetchError;
use cover_fetcher::fetcher::{CatalogHttp, FetchResult};
use cover_fetcher::store::{CoverStore, FsCoverStore};

pub const CATALOG: &str = "https://catalog.test";

#[derive(Debug, Clone)]
pub enum Reply {
    Body(Vec<u8>),
    Status(u16),
    Panic,
}

/// Scripted catalog. Unknown URLs answer 404.
#[derive(Default)]
pub struct MockCatalog {
    routes: HashMap<String, Reply>,
    calls: Mutex<Vec<String>>,
    active: AtomicUsize,
    peak: AtomicUsize,
    latency: Duration,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url: impl Into<String>, reply: Reply) -> Self {
        self.routes.insert(url.into(), reply);
        self
    }

    /// Serves a detail page for `identifier` plus its artwork bytes.
    pub fn with_cover(self, identifier: &str, title: &str, artwork: &[u8]) -> Self {
        let artwork_path = format!("/pics/cover/{}_b.jpg", identifier.to_lowercase());
        self.route(
            page_url(identifier),
            Reply::Body(page_html(title, &artwork_path).into_bytes()),
        )
        .route(format!("{CATALOG}{artwork_path}"), Reply::Body(artwork.to_vec()))
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|call| *call == url).count()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl CatalogHttp for MockCatalog {
    fn get(
        &self,
        url: &str,
        _headers: &HeaderMap,
        _timeout: Duration,
    ) -> Result<FetchResult, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        match self.routes.get(url).cloned() {
            Some(Reply::Body(body)) => Ok(FetchResult {
                status: 200,
                body,
                final_url: url.to_string(),
            }),
            Some(Reply::Status(status)) => Err(FetchError::Status {
                status,
                url: url.to_string(),
            }),
            Some(Reply::Panic) => panic!("mock catalog exploded on {url}"),
            None => Err(FetchError::Status {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}

pub fn page_url(identifier: &str) -> String {
    format!("{CATALOG}/{identifier}")
}

pub fn artwork_url(identifier: &str) -> String {
    format!("{CATALOG}/pics/cover/{}_b.jpg", identifier.to_lowercase())
}

pub fn page_html(title: &str, artwork: &str) -> String {
    format!(
        r#"<html><body><div class="container"><h3>{title}</h3>
        <div class="row movie"><div class="col-md-9 screencap">
        <a class="bigImage" href="{artwork}"><img src="{artwork}"></a>
        </div></div></div></body></html>"#
    )
}

/// Settings with every delay removed so tests run at full speed.
pub fn settings(root: &Path, concurrency: usize, max_attempts: u32) -> RunSettings {
    let mut settings = RunSettings::with_root(root);
    settings.concurrency = concurrency;
    settings.catalog = CatalogSettings::new(CATALOG, "cover-fetcher-tests", "en", None).unwrap();
    settings.retry =
        RetryPolicy::new(max_attempts, Duration::from_secs(1), DelayWindow::ZERO).unwrap();
    settings.throttle = DelayWindow::ZERO;
    settings.stagger = Duration::ZERO;
    settings
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn failures(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.level == ProgressLevel::Failure)
            .map(|event| event.message.clone())
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Panics on every per-item result, like `println!` on a closed pipe.
pub struct PanickingSink;

impl ProgressSink for PanickingSink {
    fn event(&self, event: ProgressEvent) {
        if event.level != ProgressLevel::Info {
            panic!("stdout closed");
        }
    }
}

/// Rejects every titled cover name the way Windows rejects names it cannot
/// represent; bare `{identifier}.jpg` names go through.
#[derive(Default)]
pub struct PickyStore {
    inner: FsCoverStore,
    rejected: Mutex<usize>,
}

impl PickyStore {
    pub fn rejected(&self) -> usize {
        *self.rejected.lock().unwrap()
    }
}

impl CoverStore for PickyStore {
    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn write(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        let name = path.file_name().and_then(|name| name.to_str()).unwrap_or("");
        if name.contains(' ') {
            *self.rejected.lock().unwrap() += 1;
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "Invalid argument"));
        }
        self.inner.write(path, content)
    }
}

/// Fails every write with a permission error.
#[derive(Default)]
pub struct ReadOnlyStore {
    pub attempts: Mutex<usize>,
}

impl CoverStore for ReadOnlyStore {
    fn exists(&self, _path: &Path) -> bool {
        false
    }

    fn write(&self, _path: &Path, _content: &[u8]) -> io::Result<()> {
        *self.attempts.lock().unwrap() += 1;
        Err(io::Error::from(io::ErrorKind::PermissionDenied))
    }
}

pub fn touch(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"").unwrap();
}

pub fn jpg_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| name.ends_with(".jpg"))
        .collect();
    names.sort();
    names
}
