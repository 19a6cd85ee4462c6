use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::config::{CatalogSettings, DelayWindow};
use crate::domain::{CoverOutcome, WorkItem};
use crate::error::TaskError;
use crate::fetcher::{CatalogHttp, RetryingFetcher};
use crate::page::PageResolver;
use crate::report::Aggregator;
use crate::sanitize::{cover_file_name, fallback_file_name};
use crate::store::{CoverStore, is_invalid_file_name};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskSuccess {
    Downloaded(PathBuf),
    FallbackName(PathBuf),
    AlreadyPresent(PathBuf),
}

pub struct CoverTask<C, P, S> {
    pub fetcher: Arc<RetryingFetcher<C>>,
    pub resolver: Arc<P>,
    pub store: Arc<S>,
    pub catalog: CatalogSettings,
    pub max_title_len: usize,
    pub throttle: DelayWindow,
    pub aggregator: Arc<Aggregator>,
    pub sink: Arc<dyn ProgressSink>,
}

impl<C, P, S> CoverTask<C, P, S>
where
    C: CatalogHttp,
    P: PageResolver,
    S: CoverStore,
{
    /// Runs the item to a terminal outcome, records it, and releases
    /// `permit` last. Never panics and never returns early without
    /// recording.
    pub fn run(&self, item: WorkItem, permit: OwnedSemaphorePermit) -> CoverOutcome {
        let started = Instant::now();
        let identifier = item.identifier.clone();
        self.notify(ProgressEvent::info(format!(
            "{identifier}: matching cover in {}",
            item.target_dir.display()
        )));

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.execute(&item)))
            .unwrap_or_else(|payload| {
                Err(TaskError::Unexpected(panic_message(payload.as_ref())))
            });

        let outcome = match &result {
            Ok(_) => CoverOutcome::success(identifier.clone()),
            Err(err) => {
                warn!(%identifier, kind = err.kind(), "cover download failed: {err}");
                CoverOutcome::failure(identifier.clone(), err.to_string())
            }
        };
        self.aggregator.record(outcome.clone());

        let event = match &result {
            Ok(TaskSuccess::Downloaded(path)) => ProgressEvent::success(format!(
                "{identifier}: cover downloaded to {}",
                path.display()
            )),
            Ok(TaskSuccess::FallbackName(path)) => ProgressEvent::success(format!(
                "{identifier}: cover downloaded with simplified name {}",
                path.display()
            )),
            Ok(TaskSuccess::AlreadyPresent(path)) => ProgressEvent::success(format!(
                "{identifier}: cover already exists at {}, skipped",
                path.display()
            )),
            Err(err) => ProgressEvent::failure(format!("{identifier}: {err}")),
        };
        self.notify(event.with_elapsed(started.elapsed()));

        if outcome.succeeded {
            let delay = self.throttle.sample();
            if !delay.is_zero() {
                debug!(%identifier, ?delay, "throttling");
                thread::sleep(delay);
            }
        }

        drop(permit);
        outcome
    }

    // A failing sink loses the event, never the outcome.
    fn notify(&self, event: ProgressEvent) {
        if panic::catch_unwind(AssertUnwindSafe(|| self.sink.event(event))).is_err() {
            warn!("progress sink panicked, event dropped");
        }
    }

    pub fn execute(&self, item: &WorkItem) -> Result<TaskSuccess, TaskError> {
        let identifier = &item.identifier;
        let page_url = self.catalog.page_url(identifier);
        let headers = self.catalog.request_headers(identifier);

        let page = self
            .fetcher
            .fetch(&page_url, &headers)
            .map_err(TaskError::PageFetchFailed)?;

        let cover = self.resolver.resolve(&page, &page_url).ok_or_else(|| {
            TaskError::MetadataNotFound(format!("no artwork URL or title on {page_url}"))
        })?;
        debug!(%identifier, artwork = %cover.artwork_url, title = %cover.title, "resolved page");

        let file_name = cover_file_name(identifier, &cover.title, self.max_title_len);
        let target = item.target_dir.join(file_name);
        if self.store.exists(&target) {
            return Ok(TaskSuccess::AlreadyPresent(target));
        }

        let artwork = self
            .fetcher
            .fetch(&cover.artwork_url, &headers)
            .map_err(TaskError::ArtworkFetchFailed)?;

        match self.store.write(&target, &artwork) {
            Ok(()) => Ok(TaskSuccess::Downloaded(target)),
            Err(err) if is_invalid_file_name(&err) => {
                let fallback = item.target_dir.join(fallback_file_name(identifier));
                if fallback == target {
                    return Err(write_failed(target, &err));
                }
                warn!(
                    %identifier,
                    "file name rejected ({err}), retrying as {}",
                    fallback.display()
                );
                match self.store.write(&fallback, &artwork) {
                    Ok(()) => Ok(TaskSuccess::FallbackName(fallback)),
                    Err(err) => Err(write_failed(fallback, &err)),
                }
            }
            Err(err) => Err(write_failed(target, &err)),
        }
    }
}

fn write_failed(path: PathBuf, err: &std::io::Error) -> TaskError {
    TaskError::WriteFailed {
        path,
        message: err.to_string(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "task panicked".to_string()
    }
}
