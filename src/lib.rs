//! Genetic search - orchestrates an iterative generate, mutate, test and
//! store loop over pluggable operations.
//!
//! Each iteration fills a batch of candidate samples, preferring children
//! bred from the top performers and topping up with fresh random samples,
//! then tests every sample and stores the ones with a result. Iterations run
//! concurrently on a fixed-size worker pool and can be cancelled
//! cooperatively.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Run configuration and the opaque sample/result payloads
//! - `search`: Batch composition, worker pool, scheduler, progress and the
//!   external-program binding
//!
//! # Example
//!
//! ```rust,no_run
//! use genetic_search::{
//!     schema::{ScriptPaths, SearchConfig},
//!     search::{CancelToken, Scheduler, ScriptOperations},
//! };
//!
//! let config = SearchConfig {
//!     iterations: 100,
//!     total_per_iter: 5,
//!     mutated_per_iter: 2,
//!     scripts: ScriptPaths::default(),
//!     ..Default::default()
//! };
//!
//! let ops = ScriptOperations::new(config.scripts.clone()).into_operations();
//! let scheduler = Scheduler::new(config.run_config().unwrap());
//! let summary = scheduler.run(&ops, &CancelToken::new()).unwrap();
//!
//! println!("Submitted {} iterations", summary.submitted);
//! ```

pub mod schema;
pub mod search;

// Re-export commonly used types
pub use schema::{Evaluation, RunConfig, Sample, SearchConfig};
pub use search::{CancelToken, Operations, RunSummary, Scheduler, SearchError, run_search};
