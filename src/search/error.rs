//! Run-level errors.

use crate::schema::ConfigError;

use super::ops::{OperationError, OperationKind};
use super::pool::PoolError;

/// Reasons a search run can fail.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Required {0} operation is not set")]
    MissingOperation(OperationKind),
    #[error("Invalid run configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("Search aborted: {0}")]
    Operation(#[from] OperationError),
}
