use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::RunSettings;
use crate::dispatch::Dispatcher;
use crate::domain::{Identifier, WorkItem};
use crate::error::CoverError;
use crate::fetcher::{CatalogHttp, RetryingFetcher};
use crate::page::PageResolver;
use crate::report::{Aggregator, RunReport};
use crate::scanner;
use crate::store::CoverStore;
use crate::task::CoverTask;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub root: PathBuf,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub discovered: Vec<WorkItem>,
    pub already_satisfied: Vec<SatisfiedEntry>,
    pub report: RunReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct SatisfiedEntry {
    pub identifier: Identifier,
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressLevel {
    Info,
    Success,
    Failure,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub level: ProgressLevel,
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(ProgressLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(ProgressLevel::Success, message)
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(ProgressLevel::Failure, message)
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = Some(elapsed);
        self
    }

    fn new(level: ProgressLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            elapsed: None,
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn event(&self, event: ProgressEvent);
}

pub struct App<C, P, S> {
    settings: RunSettings,
    fetcher: Arc<RetryingFetcher<C>>,
    resolver: Arc<P>,
    store: Arc<S>,
}

impl<C, P, S> App<C, P, S>
where
    C: CatalogHttp + 'static,
    P: PageResolver + 'static,
    S: CoverStore + 'static,
{
    pub fn new(settings: RunSettings, http: C, resolver: P, store: S) -> Self {
        let fetcher = RetryingFetcher::new(http, settings.retry);
        Self {
            settings,
            fetcher: Arc::new(fetcher),
            resolver: Arc::new(resolver),
            store: Arc::new(store),
        }
    }

    pub fn http(&self) -> &C {
        self.fetcher.http()
    }

    pub fn run(
        &self,
        options: RunOptions,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<RunSummary, CoverError> {
        let started_at = Utc::now();
        let root = &self.settings.root;
        if !root.exists() {
            return Err(CoverError::PathNotFound(root.clone()));
        }

        sink.event(ProgressEvent::info(format!("scanning {}", root.display())));
        let scan = scanner::scan(root)?;
        for (identifier, directory) in &scan.satisfied {
            sink.event(ProgressEvent::info(format!(
                "{identifier}: cover already present in {}, skipped",
                directory.display()
            )));
        }
        sink.event(ProgressEvent::info(format!(
            "found {} video(s) needing a cover",
            scan.items.len()
        )));
        for item in &scan.items {
            sink.event(ProgressEvent::info(format!(
                "{} - {}",
                item.identifier,
                item.target_dir.display()
            )));
        }

        let aggregator = Arc::new(Aggregator::new());
        if !options.dry_run && !scan.items.is_empty() {
            info!(
                items = scan.items.len(),
                concurrency = self.settings.concurrency,
                "dispatching cover downloads"
            );
            let task = CoverTask {
                fetcher: Arc::clone(&self.fetcher),
                resolver: Arc::clone(&self.resolver),
                store: Arc::clone(&self.store),
                catalog: self.settings.catalog.clone(),
                max_title_len: self.settings.max_title_len,
                throttle: self.settings.throttle,
                aggregator: Arc::clone(&aggregator),
                sink: Arc::clone(&sink),
            };
            let dispatcher = Dispatcher::new(self.settings.concurrency, self.settings.stagger);
            dispatcher.run(scan.items.clone(), &aggregator, move |item, permit| {
                task.run(item, permit);
            })?;
        }

        let report = aggregator.snapshot();
        info!(
            succeeded = report.success_count,
            failed = report.failure_count,
            "run finished"
        );

        Ok(RunSummary {
            root: root.clone(),
            dry_run: options.dry_run,
            started_at,
            finished_at: Utc::now(),
            discovered: scan.items,
            already_satisfied: scan
                .satisfied
                .into_iter()
                .map(|(identifier, directory)| SatisfiedEntry {
                    identifier,
                    directory,
                })
                .collect(),
            report,
        })
    }
}
