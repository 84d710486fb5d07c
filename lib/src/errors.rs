//! Error type shared by every dataset, store and session in this crate.

use oxigraph::store::StorageError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Which of the two per-thread scope stacks an operation touched.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ScopeKind {
    Active,
    Default,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKind::Active => write!(f, "Active"),
            ScopeKind::Default => write!(f, "Default"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DatasetError {
    /// A reset was issued with no matching set on the calling thread.
    #[error("Unable to reset the {scope} Graph since no previous {scope} Graphs exist")]
    ScopeUnderflow { scope: ScopeKind },

    /// A mutation was attempted on a read-only dataset.
    #[error("{0}")]
    Immutable(&'static str),

    /// A command in the current explicit transaction failed; only a discard can follow.
    #[error("Unable to commit since one or more commands executed in the current transaction failed")]
    CannotCommit,

    #[error("You cannot merge an RDF graph with itself")]
    SelfMerge,

    /// The update execution budget was exceeded between two commands.
    #[error("Update execution exceeded its time budget ({elapsed:?} > {budget:?})")]
    Timeout { elapsed: Duration, budget: Duration },

    /// An auto-committed update failed and rolling it back failed as well.
    #[error("{source}; discarding its changes also failed: {discard}")]
    DiscardFailed {
        source: Box<DatasetError>,
        discard: Box<DatasetError>,
    },

    #[error("Failed to acquire {0}: lock poisoned")]
    LockPoisoned(&'static str),

    /// Errors raised by an oxigraph backed store.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Failures raised by a command supplied by the query/update evaluator.
    #[error(transparent)]
    Command(#[from] anyhow::Error),
}

impl DatasetError {
    /// Usage errors are fatal to the current operation and never a backing store fault.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            DatasetError::ScopeUnderflow { .. }
                | DatasetError::Immutable(_)
                | DatasetError::CannotCommit
                | DatasetError::SelfMerge
        )
    }
}

pub type Result<T> = std::result::Result<T, DatasetError>;
