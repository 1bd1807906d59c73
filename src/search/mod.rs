//! Search module - the iteration scheduler and its collaborators.
//!
//! # Overview
//!
//! A search run repeats one iteration many times over a bounded pool of
//! workers. Each iteration:
//!
//! 1. **Composes a batch** (`composer`): up to `mutated_per_iter` children
//!    bred from pairs drawn from History, then Random samples until the
//!    batch holds `random_per_iter + mutated_per_iter` entries.
//! 2. **Tests** every sample in batch order.
//! 3. **Stores** each sample whose evaluation is non-empty.
//! 4. **Reports progress** (`progress`) with the number of samples tested.
//!
//! What a sample is, and how it is generated, mutated, tested and stored,
//! is entirely up to the caller's [`Operations`]. [`ScriptOperations`]
//! binds them to external programs.
//!
//! # Example
//!
//! ```rust,no_run
//! use genetic_search::schema::{Evaluation, RunConfig, Sample};
//! use genetic_search::search::{CancelToken, Operations, run_search};
//!
//! let ops = Operations::new()
//!     .with_random(|| Ok(Sample::from("abc")))
//!     .with_history(|| Ok(Sample::empty()))
//!     .with_mutate(|a, _| Ok(a.clone()))
//!     .with_test(|s| Ok(Evaluation::from(s.len().to_string())))
//!     .with_store(|s, e| {
//!         println!("{:?} -> {:?}", s, e);
//!         Ok(())
//!     });
//!
//! let config = RunConfig {
//!     iterations: 10,
//!     random_per_iter: 3,
//!     mutated_per_iter: 2,
//!     ..Default::default()
//! };
//! let summary = run_search(config, &ops, &CancelToken::new()).unwrap();
//! println!("{} iterations", summary.submitted);
//! ```

mod cancel;
mod composer;
mod error;
mod ops;
mod pool;
mod progress;
mod scheduler;
mod script;

pub use cancel::CancelToken;
pub use composer::{Batch, compose_batch};
pub use error::SearchError;
pub use ops::{
    HistoryFn, MutateFn, OpResult, OperationError, OperationKind, Operations, RandomFn, StoreFn,
    TestFn,
};
pub use pool::{PoolError, Reservation, WorkerPool};
pub use progress::{ProgressCallback, ProgressReporter, ProgressSnapshot, log_progress};
pub use scheduler::{RunSummary, Scheduler, run_search};
pub use script::ScriptOperations;
