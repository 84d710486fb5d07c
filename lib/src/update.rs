//! Transaction driver for update evaluators.
//!
//! An [`UpdateSession`] runs evaluator-supplied commands against a dataset
//! under the dataset's writer lock and decides what a failure means: in
//! auto-commit mode the batch is discarded, in explicit mode the session
//! refuses to commit until the caller discards.

use crate::dataset::{Dataset, DatasetLock};
use crate::errors::{DatasetError, Result};
use crate::graph::Graph;
use crate::options::CommitMode;
use log::{debug, error, info, warn};
use oxigraph::model::GraphName;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// One update command, as handed over by the evaluator.
pub type UpdateCommand<'a, D> = Box<dyn FnOnce(&D) -> Result<()> + 'a>;

pub struct UpdateSession<D: Dataset> {
    dataset: D,
    mode: CommitMode,
    timeout: Option<Duration>,
    can_commit: AtomicBool,
    local_lock: DatasetLock,
}

impl<D: Dataset> UpdateSession<D> {
    /// Opens a session, creating and flushing an empty unnamed graph if the
    /// dataset lacks one.
    pub fn new(dataset: D, mode: CommitMode) -> Result<Self> {
        if !dataset.has_graph(&GraphName::DefaultGraph)? {
            debug!("Adding the missing unnamed graph before running updates");
            dataset.add_graph(Graph::new())?;
            dataset.flush()?;
        }
        Ok(Self {
            dataset,
            mode,
            timeout: None,
            can_commit: AtomicBool::new(true),
            local_lock: Arc::new(RwLock::new(())),
        })
    }

    /// Bounds the time a batch may take; checked between commands.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    pub fn commit_mode(&self) -> CommitMode {
        self.mode
    }

    pub fn can_commit(&self) -> bool {
        self.can_commit.load(Ordering::SeqCst)
    }

    /// Commits outstanding changes; fails while a failed command is pending discard.
    pub fn flush(&self) -> Result<()> {
        if !self.can_commit() {
            warn!("Refusing to commit a transaction with failed commands");
            return Err(DatasetError::CannotCommit);
        }
        self.dataset.flush()
    }

    /// Rolls back outstanding changes and clears the cannot-commit mark.
    pub fn discard(&self) -> Result<()> {
        self.dataset.discard()?;
        self.can_commit.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Runs a single command.
    pub fn execute<F>(&self, command: F) -> Result<Duration>
    where
        F: FnOnce(&D) -> Result<()>,
    {
        self.run(std::iter::once(command))
    }

    /// Runs commands in order as one unit, returning the time they took.
    pub fn execute_batch<'a>(&self, commands: Vec<UpdateCommand<'a, D>>) -> Result<Duration> {
        self.run(commands)
    }

    fn run<F, I>(&self, commands: I) -> Result<Duration>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce(&D) -> Result<()>,
    {
        let lock = self
            .dataset
            .lock()
            .unwrap_or_else(|| self.local_lock.clone());
        let _guard = lock
            .write()
            .map_err(|_| DatasetError::LockPoisoned("dataset write lock"))?;

        let auto = self.mode.is_auto();
        let start = Instant::now();
        let outcome = self.run_guarded(commands, auto, start);
        match outcome {
            Ok(()) => {
                let elapsed = start.elapsed();
                debug!("Update completed in {:?}", elapsed);
                Ok(elapsed)
            }
            Err(e) => {
                if auto {
                    info!("Update failed, discarding its changes: {}", e);
                    if let Err(discard_err) = self.dataset.discard() {
                        error!("Discard after a failed update also failed: {}", discard_err);
                        return Err(DatasetError::DiscardFailed {
                            source: Box::new(e),
                            discard: Box::new(discard_err),
                        });
                    }
                } else {
                    warn!("Update failed, transaction can no longer commit: {}", e);
                    self.can_commit.store(false, Ordering::SeqCst);
                }
                Err(e)
            }
        }
    }

    fn run_guarded<F, I>(&self, commands: I, auto: bool, start: Instant) -> Result<()>
    where
        I: IntoIterator<Item = F>,
        F: FnOnce(&D) -> Result<()>,
    {
        if auto {
            self.flush()?;
        }
        for command in commands {
            command(&self.dataset)?;
            self.check_timeout(start)?;
        }
        if auto {
            self.flush()?;
        }
        Ok(())
    }

    fn check_timeout(&self, start: Instant) -> Result<()> {
        match self.timeout {
            Some(budget) if start.elapsed() > budget => Err(DatasetError::Timeout {
                elapsed: start.elapsed(),
                budget,
            }),
            _ => Ok(()),
        }
    }
}
