//! The dataset-level action log behind flush (commit) and discard (rollback).
//!
//! Graph-level mutations are applied to live state immediately and recorded
//! here as [`PersistenceAction`]s. Committing or rolling back starts with
//! [`TransactionLog::take`], which moves the recorded actions and the
//! modifiable-graph cache out of the log in one step, so the log is empty by
//! construction whichever way the transaction ends.

use crate::errors::{DatasetError, Result};
use crate::graph::TransactionalGraph;
use log::{debug, error, info, warn};
use oxigraph::model::GraphName;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ActionKind {
    Added,
    Modified,
    Deleted,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Added => write!(f, "added"),
            ActionKind::Modified => write!(f, "modified"),
            ActionKind::Deleted => write!(f, "deleted"),
        }
    }
}

/// One recorded graph-level mutation.
#[derive(Clone)]
pub struct PersistenceAction {
    pub graph: Arc<dyn TransactionalGraph>,
    pub kind: ActionKind,
}

impl PersistenceAction {
    pub fn new(graph: Arc<dyn TransactionalGraph>, kind: ActionKind) -> Self {
        Self { graph, kind }
    }

    pub fn name(&self) -> GraphName {
        self.graph.name()
    }
}

impl fmt::Debug for PersistenceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceAction")
            .field("graph", &self.name())
            .field("kind", &self.kind)
            .finish()
    }
}

/// Structural operations a rollback needs from the backing store, plus its
/// commit and rollback finalization.
pub trait TransactionHooks {
    fn graph_exists(&self, name: &GraphName) -> Result<bool>;

    /// Structurally removes a graph, returning true when it existed.
    fn remove_graph_structurally(&self, name: &GraphName) -> Result<bool>;

    /// Makes a new empty graph exist under `name`.
    fn restore_empty_graph(&self, name: &GraphName) -> Result<()>;

    fn flush_internal(&self) -> Result<()> {
        Ok(())
    }

    fn discard_internal(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct LogState {
    actions: Vec<PersistenceAction>,
    cache: HashMap<GraphName, Arc<dyn TransactionalGraph>>,
}

/// Ordered action log plus the modifiable-graph cache of the open transaction.
#[derive(Default)]
pub struct TransactionLog {
    state: Mutex<LogState>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, LogState>> {
        self.state
            .lock()
            .map_err(|_| DatasetError::LockPoisoned("transaction log"))
    }

    pub fn record(&self, graph: Arc<dyn TransactionalGraph>, kind: ActionKind) -> Result<()> {
        debug!("Recording {} action for graph {}", kind, graph.name());
        self.lock_state()?
            .actions
            .push(PersistenceAction::new(graph, kind));
        Ok(())
    }

    pub fn cached(&self, name: &GraphName) -> Result<Option<Arc<dyn TransactionalGraph>>> {
        Ok(self.lock_state()?.cache.get(name).cloned())
    }

    pub fn cache(&self, handle: Arc<dyn TransactionalGraph>) -> Result<()> {
        self.lock_state()?.cache.insert(handle.name(), handle);
        Ok(())
    }

    /// A copy of the recorded actions, oldest first.
    pub fn actions(&self) -> Result<Vec<PersistenceAction>> {
        Ok(self.lock_state()?.actions.clone())
    }

    pub fn is_empty(&self) -> Result<bool> {
        let state = self.lock_state()?;
        Ok(state.actions.is_empty() && state.cache.is_empty())
    }

    /// Drops the cached handle for `name`, returning it. Its recorded actions stay in the log.
    pub fn evict(&self, name: &GraphName) -> Result<Option<Arc<dyn TransactionalGraph>>> {
        Ok(self.lock_state()?.cache.remove(name))
    }

    /// Moves the open transaction out, leaving the log and cache empty.
    pub fn take(&self) -> Result<PendingTransaction> {
        let state = std::mem::take(&mut *self.lock_state()?);
        Ok(PendingTransaction {
            actions: state.actions,
            cache: state.cache,
        })
    }

    /// Puts unprocessed actions back in front of anything recorded since they were taken.
    fn restore(&self, actions: Vec<PersistenceAction>, cache: HashMap<GraphName, Arc<dyn TransactionalGraph>>) -> Result<()> {
        let mut state = self.lock_state()?;
        let newer = std::mem::replace(&mut state.actions, actions);
        state.actions.extend(newer);
        for (name, handle) in cache {
            state.cache.entry(name).or_insert(handle);
        }
        Ok(())
    }
}

/// A transaction taken out of a [`TransactionLog`], consumed by commit or rollback.
pub struct PendingTransaction {
    actions: Vec<PersistenceAction>,
    cache: HashMap<GraphName, Arc<dyn TransactionalGraph>>,
}

impl PendingTransaction {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.cache.is_empty()
    }

    /// Flushes `Added`/`Modified` handles and discards `Deleted` ones, in
    /// recording order, then flushes cached handles and finalizes the store.
    ///
    /// If a handle fails, the actions not yet processed go back into `log` so
    /// a following rollback still sees them.
    pub fn commit(self, log: &TransactionLog, hooks: &dyn TransactionHooks) -> Result<()> {
        let total = self.actions.len();
        let mut actions = self.actions.into_iter();
        while let Some(action) = actions.next() {
            let outcome = match action.kind {
                ActionKind::Added | ActionKind::Modified => action.graph.flush(),
                ActionKind::Deleted => action.graph.discard(),
            };
            if let Err(e) = outcome {
                error!("Flush failed on {} graph {}: {}", action.kind, action.name(), e);
                let mut remaining = vec![action];
                remaining.extend(actions);
                log.restore(remaining, self.cache)?;
                return Err(e);
            }
        }
        for handle in self.cache.values() {
            handle.flush()?;
        }
        hooks.flush_internal()?;
        if total > 0 {
            info!("Committed {} graph actions", total);
        }
        Ok(())
    }

    /// Compensates the recorded actions newest first, discards cached handles and
    /// runs the store's discard hook.
    ///
    /// A `Deleted` graph comes back empty: its previous content is not restored.
    pub fn rollback(self, hooks: &dyn TransactionHooks) -> Result<()> {
        let total = self.actions.len();
        for action in self.actions.iter().rev() {
            let name = action.name();
            match action.kind {
                ActionKind::Added => {
                    if hooks.graph_exists(&name)? {
                        hooks.remove_graph_structurally(&name)?;
                    }
                }
                ActionKind::Deleted => {
                    warn!("Restoring deleted graph {} without its previous content", name);
                    hooks.restore_empty_graph(&name)?;
                }
                ActionKind::Modified => action.graph.discard()?,
            }
        }
        for handle in self.cache.values() {
            handle.discard()?;
        }
        hooks.discard_internal()?;
        if total > 0 {
            info!("Rolled back {} graph actions", total);
        }
        Ok(())
    }
}
