use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::domain::{CoverOutcome, Identifier};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub success_count: usize,
    pub failure_count: usize,
    pub failures: Vec<FailureEntry>,
}

impl RunReport {
    pub fn total(&self) -> usize {
        self.success_count + self.failure_count
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureEntry {
    pub identifier: Identifier,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct Aggregator {
    report: Mutex<RunReport>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.lock().success_count += 1;
    }

    pub fn record_failure(&self, identifier: Identifier, error: impl Into<String>) {
        let mut report = self.lock();
        report.failure_count += 1;
        report.failures.push(FailureEntry {
            identifier,
            error: error.into(),
        });
    }

    pub fn record(&self, outcome: CoverOutcome) {
        if outcome.succeeded {
            self.record_success();
        } else {
            let error = outcome
                .error
                .unwrap_or_else(|| "unknown error".to_string());
            self.record_failure(outcome.identifier, error);
        }
    }

    pub fn snapshot(&self) -> RunReport {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, RunReport> {
        self.report.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn id(value: &str) -> Identifier {
        value.parse().unwrap()
    }

    #[test]
    fn records_in_order() {
        let aggregator = Aggregator::new();
        aggregator.record(CoverOutcome::success(id("ABC-123")));
        aggregator.record(CoverOutcome::failure(id("ABC-124"), "404"));
        aggregator.record_failure(id("ABC-125"), "timeout");

        let report = aggregator.snapshot();
        assert_eq!(report.success_count, 1);
        assert_eq!(report.failure_count, 2);
        assert_eq!(report.failures.len(), report.failure_count);
        assert_eq!(report.failures[0].identifier, id("ABC-124"));
        assert_eq!(report.failures[1].error, "timeout");
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let aggregator = Aggregator::new();
        thread::scope(|scope| {
            for worker in 0..8 {
                let aggregator = &aggregator;
                scope.spawn(move || {
                    for n in 0..250 {
                        if (worker + n) % 3 == 0 {
                            aggregator.record_failure(id("ABC-123"), "failed");
                        } else {
                            aggregator.record_success();
                        }
                    }
                });
            }
        });

        let report = aggregator.snapshot();
        assert_eq!(report.total(), 2000);
        assert_eq!(report.failures.len(), report.failure_count);
    }
}
