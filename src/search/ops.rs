//! The five pluggable operations a search run is driven by.

use std::fmt;
use std::io;
use std::process::ExitStatus;
use std::sync::Arc;

use crate::schema::{Evaluation, RunConfig, Sample};

/// Result of a single operation call.
pub type OpResult<T> = Result<T, OperationError>;

/// Produces a fresh candidate. Empty means "no sample this call".
pub type RandomFn = Arc<dyn Fn() -> OpResult<Sample> + Send + Sync>;
/// Draws from the caller's pool of top performers. Empty means the pool is
/// currently empty.
pub type HistoryFn = Arc<dyn Fn() -> OpResult<Sample> + Send + Sync>;
/// Derives a child from two parents. Empty means mutation declined.
pub type MutateFn = Arc<dyn Fn(&Sample, &Sample) -> OpResult<Sample> + Send + Sync>;
/// Evaluates a sample. Empty means nothing to store.
pub type TestFn = Arc<dyn Fn(&Sample) -> OpResult<Evaluation> + Send + Sync>;
/// Persists a sample together with its evaluation.
pub type StoreFn = Arc<dyn Fn(&Sample, &Evaluation) -> OpResult<()> + Send + Sync>;

/// Identifies one of the search operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Random,
    History,
    Mutate,
    Test,
    Store,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::History => "history",
            Self::Mutate => "mutate",
            Self::Test => "test",
            Self::Store => "store",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of an external operation. Never retried; fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("{kind} operation could not start `{program}`: {source}")]
    Spawn {
        kind: OperationKind,
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{kind} operation `{program}` exited with {status}: {stderr}")]
    Failed {
        kind: OperationKind,
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("{kind} operation failed: {message}")]
    Other {
        kind: OperationKind,
        message: String,
    },
}

impl OperationError {
    /// Failure described by a plain message.
    pub fn new(kind: OperationKind, message: impl Into<String>) -> Self {
        Self::Other {
            kind,
            message: message.into(),
        }
    }

    /// The operation that failed.
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Spawn { kind, .. } | Self::Failed { kind, .. } | Self::Other { kind, .. } => {
                *kind
            }
        }
    }
}

/// The set of operations handed to the scheduler.
///
/// Every operation may be called from up to `parallelism` worker threads
/// at once, which the `Send + Sync` bounds make explicit. Any state shared
/// between them (such as the pool of top performers read by History and
/// written by Store) is owned by the caller.
#[derive(Clone, Default)]
pub struct Operations {
    random: Option<RandomFn>,
    history: Option<HistoryFn>,
    mutate: Option<MutateFn>,
    test: Option<TestFn>,
    store: Option<StoreFn>,
}

impl Operations {
    /// An empty set. Random must be supplied before running.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_random<F>(mut self, f: F) -> Self
    where
        F: Fn() -> OpResult<Sample> + Send + Sync + 'static,
    {
        self.random = Some(Arc::new(f));
        self
    }

    pub fn with_history<F>(mut self, f: F) -> Self
    where
        F: Fn() -> OpResult<Sample> + Send + Sync + 'static,
    {
        self.history = Some(Arc::new(f));
        self
    }

    pub fn with_mutate<F>(mut self, f: F) -> Self
    where
        F: Fn(&Sample, &Sample) -> OpResult<Sample> + Send + Sync + 'static,
    {
        self.mutate = Some(Arc::new(f));
        self
    }

    pub fn with_test<F>(mut self, f: F) -> Self
    where
        F: Fn(&Sample) -> OpResult<Evaluation> + Send + Sync + 'static,
    {
        self.test = Some(Arc::new(f));
        self
    }

    pub fn with_store<F>(mut self, f: F) -> Self
    where
        F: Fn(&Sample, &Evaluation) -> OpResult<()> + Send + Sync + 'static,
    {
        self.store = Some(Arc::new(f));
        self
    }

    pub fn random(&self) -> Option<&RandomFn> {
        self.random.as_ref()
    }

    pub fn history(&self) -> Option<&HistoryFn> {
        self.history.as_ref()
    }

    pub fn mutate(&self) -> Option<&MutateFn> {
        self.mutate.as_ref()
    }

    pub fn test(&self) -> Option<&TestFn> {
        self.test.as_ref()
    }

    pub fn store(&self) -> Option<&StoreFn> {
        self.store.as_ref()
    }

    /// First operation `config` needs that is not set.
    ///
    /// Random is always checked first. History and Mutate are only needed
    /// when the configuration asks for mutated samples.
    pub fn missing_for(&self, config: &RunConfig) -> Option<OperationKind> {
        if self.random.is_none() {
            return Some(OperationKind::Random);
        }
        if config.mutated_per_iter > 0 {
            if self.history.is_none() {
                return Some(OperationKind::History);
            }
            if self.mutate.is_none() {
                return Some(OperationKind::Mutate);
            }
        }
        if self.test.is_none() {
            return Some(OperationKind::Test);
        }
        if self.store.is_none() {
            return Some(OperationKind::Store);
        }
        None
    }
}

impl fmt::Debug for Operations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operations")
            .field("random", &self.random.is_some())
            .field("history", &self.history.is_some())
            .field("mutate", &self.mutate.is_some())
            .field("test", &self.test.is_some())
            .field("store", &self.store.is_some())
            .finish()
    }
}
