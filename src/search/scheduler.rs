//! The iteration scheduler driving a search run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, error, info};

use crate::schema::{RunConfig, Sample};

use super::cancel::CancelToken;
use super::composer::compose_batch;
use super::error::SearchError;
use super::ops::{
    HistoryFn, MutateFn, OpResult, OperationError, OperationKind, Operations, RandomFn, StoreFn,
    TestFn,
};
use super::pool::{Reservation, WorkerPool};
use super::progress::{ProgressCallback, ProgressReporter};

/// How often a producer blocked on a full pool re-checks cancellation.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Outcome of a run that was not aborted by an operation failure.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Iterations handed to the worker pool.
    pub submitted: u64,
    /// The run stopped early because the cancel token fired. In-flight
    /// iterations may still be running when this is returned.
    pub cancelled: bool,
    /// Progress tracker, present when progress reporting was enabled. It
    /// keeps counting iterations that finish after a cancelled run returns.
    pub progress: Option<Arc<ProgressReporter>>,
}

/// Runs iterations of compose, test and store over a bounded worker pool.
pub struct Scheduler {
    config: RunConfig,
    progress_callback: Option<ProgressCallback>,
}

impl Scheduler {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            progress_callback: None,
        }
    }

    /// Receive progress updates. Only used when `show_progress` is set.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run the search, blocking until every iteration has completed or the
    /// cancel token fires.
    ///
    /// Cancellation is checked before each submission, including while
    /// waiting for a free worker. Once observed the run returns at once;
    /// iterations already submitted finish in the background.
    ///
    /// An operation error stops submission, waits for the iterations in
    /// flight, and is returned. Nothing already stored is undone.
    pub fn run(&self, ops: &Operations, cancel: &CancelToken) -> Result<RunSummary, SearchError> {
        if ops.random().is_none() {
            return Err(SearchError::MissingOperation(OperationKind::Random));
        }
        self.config.validate()?;
        let bound = BoundOps::bind(ops, &self.config).map_err(SearchError::MissingOperation)?;
        let bound = Arc::new(bound);

        let pool = WorkerPool::new(self.config.parallelism)?;
        let progress = self.config.show_progress.then(|| {
            let mut reporter = ProgressReporter::new(self.config.total_samples());
            if let Some(callback) = &self.progress_callback {
                reporter = reporter.with_callback(Arc::clone(callback));
            }
            Arc::new(reporter)
        });
        let abort = Arc::new(Abort::default());

        info!(
            "Search starting: {} iterations of {} mutated + {} random samples on {} workers",
            self.config.iterations,
            self.config.mutated_per_iter,
            self.config.random_per_iter,
            pool.size()
        );

        let mut submitted = 0;
        while submitted < self.config.iterations {
            let Some(reservation) = next_slot(&pool, cancel, &abort) else {
                break;
            };

            let iteration = submitted;
            let ops = Arc::clone(&bound);
            let progress = progress.clone();
            let abort = Arc::clone(&abort);
            let (mutated, random) = (self.config.mutated_per_iter, self.config.random_per_iter);

            reservation.spawn(move || {
                if abort.is_raised() {
                    return;
                }
                match run_iteration(iteration, mutated, random, &ops) {
                    Ok(tested) => {
                        if let Some(progress) = &progress {
                            progress.record(tested);
                        }
                    }
                    Err(err) => {
                        error!("Iteration {iteration} failed: {err}");
                        abort.raise(err);
                    }
                }
            });
            submitted += 1;
        }

        if !abort.is_raised() && cancel.is_cancelled() {
            info!(
                "Search cancelled after submitting {submitted} of {} iterations",
                self.config.iterations
            );
            return Ok(RunSummary {
                submitted,
                cancelled: true,
                progress,
            });
        }

        pool.drain();
        if let Some(err) = abort.take() {
            return Err(SearchError::Operation(err));
        }

        if let Some(progress) = &progress {
            progress.finish();
        }
        info!("Search finished: {submitted} iterations");

        Ok(RunSummary {
            submitted,
            cancelled: false,
            progress,
        })
    }
}

/// Run a search with `config`. See [`Scheduler::run`].
pub fn run_search(
    config: RunConfig,
    ops: &Operations,
    cancel: &CancelToken,
) -> Result<RunSummary, SearchError> {
    Scheduler::new(config).run(ops, cancel)
}

/// Wait for a free worker unless the run is cancelled or aborted first.
fn next_slot<'a>(
    pool: &'a WorkerPool,
    cancel: &CancelToken,
    abort: &Abort,
) -> Option<Reservation<'a>> {
    loop {
        if abort.is_raised() || cancel.is_cancelled() {
            return None;
        }
        if let Some(reservation) = pool.reserve_timeout(CANCEL_POLL_INTERVAL) {
            // The slot may have been freed by the iteration that cancelled.
            if abort.is_raised() || cancel.is_cancelled() {
                return None;
            }
            return Some(reservation);
        }
    }
}

/// One iteration: compose a batch, then test each sample and store it if
/// the evaluation is non-empty. Returns the number of samples tested.
fn run_iteration(
    iteration: u64,
    mutated: usize,
    random: usize,
    ops: &BoundOps,
) -> OpResult<usize> {
    let batch = match &ops.mutation {
        Some((history, mutate)) => compose_batch(
            mutated,
            random,
            || history(),
            |a, b| mutate(a, b),
            || (ops.random)(),
        )?,
        None => compose_batch(
            0,
            random,
            || Ok(Sample::empty()),
            |_, _| Ok(Sample::empty()),
            || (ops.random)(),
        )?,
    };
    debug!(
        "Iteration {iteration}: {} samples ({} mutated, {} random)",
        batch.len(),
        batch.mutated_count(),
        batch.random_count()
    );

    let mut stored = 0;
    for sample in &batch {
        let evaluation = (ops.test)(sample)?;
        if !evaluation.is_empty() {
            (ops.store)(sample, &evaluation)?;
            stored += 1;
        }
    }
    debug!("Iteration {iteration}: stored {stored}/{}", batch.len());

    Ok(batch.len())
}

/// Operations resolved for one run.
struct BoundOps {
    random: RandomFn,
    /// History and Mutate, bound only when the run mutates.
    mutation: Option<(HistoryFn, MutateFn)>,
    test: TestFn,
    store: StoreFn,
}

impl BoundOps {
    fn bind(ops: &Operations, config: &RunConfig) -> Result<Self, OperationKind> {
        if let Some(kind) = ops.missing_for(config) {
            return Err(kind);
        }
        let mutation = if config.mutated_per_iter > 0 {
            Some((
                ops.history().cloned().ok_or(OperationKind::History)?,
                ops.mutate().cloned().ok_or(OperationKind::Mutate)?,
            ))
        } else {
            None
        };
        Ok(Self {
            random: ops.random().cloned().ok_or(OperationKind::Random)?,
            mutation,
            test: ops.test().cloned().ok_or(OperationKind::Test)?,
            store: ops.store().cloned().ok_or(OperationKind::Store)?,
        })
    }
}

/// First operation failure of a run.
#[derive(Default)]
struct Abort {
    raised: AtomicBool,
    error: Mutex<Option<OperationError>>,
}

impl Abort {
    fn raise(&self, err: OperationError) {
        let mut slot = self.error.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(err);
        }
        self.raised.store(true, Ordering::Release);
    }

    fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    fn take(&self) -> Option<OperationError> {
        self.error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
