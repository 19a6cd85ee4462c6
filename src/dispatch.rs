use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Builder;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::domain::WorkItem;
use crate::error::CoverError;
use crate::report::Aggregator;

#[derive(Debug)]
pub struct Dispatcher {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    stagger: Duration,
}

impl Dispatcher {
    pub fn new(capacity: usize, stagger: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            stagger,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_use(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    pub fn run<F>(
        &self,
        items: Vec<WorkItem>,
        aggregator: &Aggregator,
        work: F,
    ) -> Result<(), CoverError>
    where
        F: Fn(WorkItem, OwnedSemaphorePermit) + Send + Sync + 'static,
    {
        let runtime = Builder::new_current_thread()
            .enable_time()
            .thread_name("cover-worker")
            .build()
            .map_err(|err| CoverError::Runtime(err.to_string()))?;
        runtime.block_on(self.dispatch(items, aggregator, work));
        Ok(())
    }

    /// The permit is acquired before the worker starts and moved into
    /// `work`, which records its own outcome. A panic escaping `work` is
    /// recorded here instead.
    pub async fn dispatch<F>(&self, items: Vec<WorkItem>, aggregator: &Aggregator, work: F)
    where
        F: Fn(WorkItem, OwnedSemaphorePermit) + Send + Sync + 'static,
    {
        let work = Arc::new(work);
        let mut workers = JoinSet::new();

        for item in items {
            let permit = match Arc::clone(&self.semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(err) => {
                    error!(identifier = %item.identifier, "no worker slot: {err}");
                    aggregator.record_failure(item.identifier, format!("unexpected error: {err}"));
                    continue;
                }
            };
            debug!(identifier = %item.identifier, in_use = self.in_use(), "dispatching");

            let work = Arc::clone(&work);
            workers.spawn_blocking(move || {
                let identifier = item.identifier.clone();
                panic::catch_unwind(AssertUnwindSafe(|| work(item, permit)))
                    .map_err(|_| identifier)
            });

            if !self.stagger.is_zero() {
                tokio::time::sleep(self.stagger).await;
            }
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(identifier)) => {
                    error!(%identifier, "worker panicked");
                    aggregator.record_failure(identifier, "unexpected error: worker panicked");
                }
                Err(err) => error!("worker did not finish: {err}"),
            }
        }
    }
}
