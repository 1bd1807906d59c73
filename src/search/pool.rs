//! Fixed-size worker pool with blocking submission.

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded};

/// Error type for worker pool construction.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Failed to build worker pool: {0}")]
    Build(#[from] rayon::ThreadPoolBuildError),
}

/// Runs tasks on `size` rayon threads, admitting at most `size` at a time.
///
/// Admission is tracked with a bounded channel of `size` slots: `submit`
/// sends a token before spawning and blocks while the channel is full, and
/// each task takes one token back out when it finishes. Holding every slot
/// therefore means no task is in flight, which is what `drain` relies on.
///
/// Dropping the pool does not wait. Tasks already submitted keep running
/// on the pool threads until they finish.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    slots: Sender<()>,
    released: Receiver<()>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool with `size` workers (at least one).
    pub fn new(size: usize) -> Result<Self, PoolError> {
        let size = size.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|i| format!("search-worker-{i}"))
            .build()?;
        let (slots, released) = bounded(size);

        Ok(Self {
            pool,
            slots,
            released,
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Tasks submitted and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Run `task` on a worker, blocking while all workers are busy.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.reserve().spawn(task);
    }

    /// Claim a slot, blocking while all workers are busy.
    pub fn reserve(&self) -> Reservation<'_> {
        // Both channel ends live in `self`, so neither send nor recv can
        // observe a disconnect.
        let _ = self.slots.send(());
        self.reservation()
    }

    /// Claim a slot, giving up after `timeout`.
    pub fn reserve_timeout(&self, timeout: Duration) -> Option<Reservation<'_>> {
        self.slots
            .send_timeout((), timeout)
            .ok()
            .map(|()| self.reservation())
    }

    fn reservation(&self) -> Reservation<'_> {
        Reservation {
            pool: self,
            slot: Slot(self.released.clone()),
        }
    }

    /// Block until every submitted task has finished.
    pub fn drain(&self) {
        for _ in 0..self.size {
            let _ = self.slots.send(());
        }
        for _ in 0..self.size {
            let _ = self.released.recv();
        }
    }
}

/// A claimed slot. Dropping it unused gives the slot back.
pub struct Reservation<'a> {
    pool: &'a WorkerPool,
    slot: Slot,
}

impl Reservation<'_> {
    /// Run `task` on a worker. Never blocks.
    pub fn spawn<F>(self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let slot = self.slot;
        self.pool.pool.spawn(move || {
            let _slot = slot;
            task();
        });
    }
}

/// Frees one submission slot when dropped.
struct Slot(Receiver<()>);

impl Drop for Slot {
    fn drop(&mut self) {
        let _ = self.0.try_recv();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_drain_waits_for_all_tasks() {
        let pool = WorkerPool::new(3).unwrap();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let done = Arc::clone(&done);
            pool.submit(move || {
                std::thread::sleep(Duration::from_millis(5));
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.drain();

        assert_eq!(done.load(Ordering::SeqCst), 10);
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn test_concurrency_bounded_by_size() {
        let pool = WorkerPool::new(2).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            pool.submit(move || {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(10));
                running.fetch_sub(1, Ordering::SeqCst);
            });
            assert!(pool.in_flight() <= 2);
        }
        pool.drain();

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(peak.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_drain_reusable() {
        let pool = WorkerPool::new(1).unwrap();
        pool.drain();

        let done = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&done);
        pool.submit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        pool.drain();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reservation_blocks_and_releases() {
        let pool = WorkerPool::new(1).unwrap();
        let held = pool.reserve();
        assert_eq!(pool.in_flight(), 1);
        assert!(pool.reserve_timeout(Duration::from_millis(10)).is_none());

        drop(held);
        assert_eq!(pool.in_flight(), 0);
        let again = pool.reserve_timeout(Duration::from_millis(10));
        assert!(again.is_some());
    }

    #[test]
    fn test_zero_size_clamped() {
        let pool = WorkerPool::new(0).unwrap();
        assert_eq!(pool.size(), 1);
    }
}
