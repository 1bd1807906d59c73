//! Progress tracking for search runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Point-in-time view of a run's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Samples tested by completed iterations.
    pub processed: u64,
    /// Samples expected if the run is not cancelled.
    pub total: u64,
    /// Iterations whose task has completed.
    pub iterations_completed: u64,
    /// Set once the scheduler loop and the pool have both finished.
    pub finished: bool,
}

impl ProgressSnapshot {
    /// Completed share in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return if self.finished { 1.0 } else { 0.0 };
        }
        (self.processed as f64 / self.total as f64).min(1.0)
    }
}

/// Progress callback type.
pub type ProgressCallback = Arc<dyn Fn(&ProgressSnapshot) + Send + Sync>;

/// Counts samples processed, safe to update from every worker.
///
/// Purely observational: whether one is attached has no effect on what the
/// scheduler does.
pub struct ProgressReporter {
    total: u64,
    processed: AtomicU64,
    iterations: AtomicU64,
    finished: AtomicBool,
    callback: Option<ProgressCallback>,
}

impl ProgressReporter {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            processed: AtomicU64::new(0),
            iterations: AtomicU64::new(0),
            finished: AtomicBool::new(false),
            callback: None,
        }
    }

    /// Invoke `callback` after every update.
    pub fn with_callback(mut self, callback: ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Record one completed iteration that tested `samples` samples.
    pub fn record(&self, samples: usize) {
        self.processed.fetch_add(samples as u64, Ordering::Relaxed);
        self.iterations.fetch_add(1, Ordering::Relaxed);
        self.notify();
    }

    /// Mark the run finished.
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Release);
        self.notify();
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            processed: self.processed(),
            total: self.total,
            iterations_completed: self.iterations.load(Ordering::Relaxed),
            finished: self.is_finished(),
        }
    }

    fn notify(&self) {
        if let Some(callback) = &self.callback {
            callback(&self.snapshot());
        }
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

/// Callback that logs a line each time another `step_percent` of the run
/// completes, and once when it finishes.
pub fn log_progress(step_percent: u64) -> ProgressCallback {
    Arc::new(on_progress_step(step_percent, |bucket, progress| match bucket {
        Some(percent) => log::info!(
            "Progress {}%: {}/{} samples, {} iterations",
            percent,
            progress.processed,
            progress.total,
            progress.iterations_completed
        ),
        None => log::info!(
            "Finished: {}/{} samples in {} iterations",
            progress.processed,
            progress.total,
            progress.iterations_completed
        ),
    }))
}

/// Calls `emit` with `Some(bucket)` the first time progress reaches each
/// multiple of `step_percent`, and with `None` on the finishing update.
/// Updates arriving out of order never re-emit a lower bucket.
fn on_progress_step<F>(step_percent: u64, emit: F) -> impl Fn(&ProgressSnapshot) + Send + Sync
where
    F: Fn(Option<u64>, &ProgressSnapshot) + Send + Sync,
{
    let step = step_percent.clamp(1, 100);
    let last_emitted = AtomicU64::new(0);

    move |progress: &ProgressSnapshot| {
        if progress.finished {
            emit(None, progress);
            return;
        }

        let percent = (progress.fraction() * 100.0) as u64;
        let bucket = percent / step * step;
        if bucket > 0 && last_emitted.fetch_max(bucket, Ordering::Relaxed) < bucket {
            emit(Some(bucket), progress);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_concurrent_record() {
        let reporter = Arc::new(ProgressReporter::new(400));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let reporter = Arc::clone(&reporter);
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        reporter.record(5);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = reporter.snapshot();
        assert_eq!(snapshot.processed, 400);
        assert_eq!(snapshot.iterations_completed, 80);
        assert!(!snapshot.finished);
        assert_eq!(snapshot.fraction(), 1.0);
    }

    #[test]
    fn test_callback_sees_updates() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ProgressReporter::new(6).with_callback(Arc::new(move |p: &ProgressSnapshot| {
            sink.lock().unwrap().push((p.processed, p.finished));
        }));

        reporter.record(3);
        reporter.record(3);
        reporter.finish();

        assert_eq!(*seen.lock().unwrap(), vec![(3, false), (6, false), (6, true)]);
    }

    #[test]
    fn test_fraction_empty_run() {
        let reporter = ProgressReporter::new(0);
        assert_eq!(reporter.snapshot().fraction(), 0.0);
        reporter.finish();
        assert_eq!(reporter.snapshot().fraction(), 1.0);
    }

    fn snapshot(processed: u64, finished: bool) -> ProgressSnapshot {
        ProgressSnapshot {
            processed,
            total: 100,
            iterations_completed: processed / 10,
            finished,
        }
    }

    #[test]
    fn test_progress_steps_emitted_once_in_any_order() {
        let emitted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&emitted);
        let callback = on_progress_step(10, move |bucket, _| sink.lock().unwrap().push(bucket));

        for processed in [5, 50, 10, 55, 100, 30] {
            callback(&snapshot(processed, false));
        }
        callback(&snapshot(100, true));

        assert_eq!(*emitted.lock().unwrap(), vec![Some(50), Some(100), None]);
    }

    #[test]
    fn test_progress_step_clamped() {
        let emitted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&emitted);
        let callback = on_progress_step(0, move |bucket, _| sink.lock().unwrap().push(bucket));

        for processed in [1, 2, 2, 3] {
            callback(&snapshot(processed, false));
        }

        assert_eq!(*emitted.lock().unwrap(), vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn test_log_progress_smoke() {
        let callback = log_progress(10);
        for processed in [50, 10, 100] {
            callback(&snapshot(processed, false));
        }
        callback(&snapshot(100, true));
    }
}
