//! Run configuration for the search scheduler and its script bindings.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Settings fixed for the lifetime of one scheduler run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of iterations (batches) to run.
    #[serde(default = "default_iterations")]
    pub iterations: u64,
    /// Samples per batch drawn from the Random operation.
    #[serde(default)]
    pub random_per_iter: usize,
    /// Samples per batch the composer tries to derive by mutation.
    #[serde(default = "default_mutated_per_iter")]
    pub mutated_per_iter: usize,
    /// Maximum number of iterations executing at once.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Track samples processed.
    #[serde(default)]
    pub show_progress: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            random_per_iter: 0,
            mutated_per_iter: default_mutated_per_iter(),
            parallelism: default_parallelism(),
            show_progress: false,
        }
    }
}

fn default_iterations() -> u64 {
    1_000_000
}
fn default_total_per_iter() -> usize {
    5
}
fn default_mutated_per_iter() -> usize {
    5
}
fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl RunConfig {
    /// Target size of every batch.
    #[inline]
    pub fn samples_per_iter(&self) -> usize {
        self.random_per_iter.saturating_add(self.mutated_per_iter)
    }

    /// Number of samples a run processes when it is not cancelled,
    /// saturating at `u64::MAX`.
    #[inline]
    pub fn total_samples(&self) -> u64 {
        self.iterations
            .saturating_mul(u64::try_from(self.samples_per_iter()).unwrap_or(u64::MAX))
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parallelism == 0 {
            return Err(ConfigError::ZeroParallelism);
        }
        Ok(())
    }
}

/// Paths of the programs backing each search operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptPaths {
    /// Prints a freshly generated sample.
    #[serde(default = "default_random_script")]
    pub random: PathBuf,
    /// Prints a sample picked from the top performers.
    #[serde(default = "default_history_script")]
    pub history: PathBuf,
    /// Takes two samples as arguments and prints a mutated child.
    #[serde(default = "default_mutate_script")]
    pub mutate: PathBuf,
    /// Takes a sample as argument and prints its result.
    #[serde(default = "default_test_script")]
    pub test: PathBuf,
    /// Takes a sample and its result as arguments and persists them.
    #[serde(default = "default_store_script")]
    pub store: PathBuf,
}

impl Default for ScriptPaths {
    fn default() -> Self {
        Self {
            random: default_random_script(),
            history: default_history_script(),
            mutate: default_mutate_script(),
            test: default_test_script(),
            store: default_store_script(),
        }
    }
}

fn default_random_script() -> PathBuf {
    PathBuf::from("random.sh")
}
fn default_history_script() -> PathBuf {
    PathBuf::from("history.sh")
}
fn default_mutate_script() -> PathBuf {
    PathBuf::from("mutate.sh")
}
fn default_test_script() -> PathBuf {
    PathBuf::from("test.sh")
}
fn default_store_script() -> PathBuf {
    PathBuf::from("store.sh")
}

/// Top-level configuration of a script-driven search, as read from JSON
/// or assembled from command line flags.
///
/// Unlike [`RunConfig`] the batch is described by its total size and the
/// mutated share of it; the random share is whatever is left.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of iterations to run.
    #[serde(default = "default_iterations")]
    pub iterations: u64,
    /// Total samples per iteration (random + mutated).
    #[serde(default = "default_total_per_iter")]
    pub total_per_iter: usize,
    /// Mutated samples to try to generate per iteration.
    #[serde(default = "default_mutated_per_iter")]
    pub mutated_per_iter: usize,
    /// Worker threads.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Log progress while running.
    #[serde(default)]
    pub show_progress: bool,
    /// Operation programs.
    #[serde(default)]
    pub scripts: ScriptPaths,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            total_per_iter: default_total_per_iter(),
            mutated_per_iter: default_mutated_per_iter(),
            parallelism: default_parallelism(),
            show_progress: false,
            scripts: ScriptPaths::default(),
        }
    }
}

impl SearchConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Split the batch into its random and mutated shares and validate.
    pub fn run_config(&self) -> Result<RunConfig, ConfigError> {
        if self.total_per_iter < self.mutated_per_iter {
            return Err(ConfigError::MutatedExceedsTotal {
                total: self.total_per_iter,
                mutated: self.mutated_per_iter,
            });
        }

        let config = RunConfig {
            iterations: self.iterations,
            random_per_iter: self.total_per_iter - self.mutated_per_iter,
            mutated_per_iter: self.mutated_per_iter,
            parallelism: self.parallelism,
            show_progress: self.show_progress,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Parallelism must be at least 1")]
    ZeroParallelism,
    #[error(
        "Total samples per iteration ({total}) must be equal to or larger than mutated ({mutated})"
    )]
    MutatedExceedsTotal { total: usize, mutated: usize },
    #[error("Failed to read config: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
