//! Per-thread active/default graph scope stacks.
//!
//! Every dataset owns one [`ScopeRegistry`]. The registry is an explicit map from
//! the calling thread to that thread's pair of stacks, created lazily from a
//! dataset-supplied initializer the first time a thread pushes a frame. A thread
//! only ever reads or writes its own entry, so concurrent queries over one
//! dataset cannot disturb each other's set/reset pairing.

use crate::errors::{DatasetError, Result, ScopeKind};
use log::warn;
use oxigraph::model::GraphName;
use std::collections::HashMap;
use std::sync::Mutex;
use std::thread::ThreadId;

/// One pushed scope: the graph names it selects plus whatever the dataset
/// materialized for them.
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeFrame<T> {
    pub names: Vec<GraphName>,
    pub target: T,
}

impl<T> ScopeFrame<T> {
    pub fn new(names: Vec<GraphName>, target: T) -> Self {
        Self { names, target }
    }
}

impl ScopeFrame<()> {
    pub fn names(names: Vec<GraphName>) -> Self {
        Self::new(names, ())
    }
}

/// The active and default stacks of a single thread.
#[derive(Debug, Clone)]
pub struct ScopeStacks<T> {
    active: Vec<ScopeFrame<T>>,
    default: Vec<ScopeFrame<T>>,
    base_default_depth: usize,
}

impl<T: Clone> ScopeStacks<T> {
    fn new(seed: Vec<ScopeFrame<T>>) -> Self {
        let base_default_depth = seed.len();
        Self {
            active: Vec::new(),
            default: seed,
            base_default_depth,
        }
    }

    pub fn active(&self) -> Option<&ScopeFrame<T>> {
        self.active.last()
    }

    pub fn default(&self) -> Option<&ScopeFrame<T>> {
        self.default.last()
    }

    pub fn active_depth(&self) -> usize {
        self.active.len()
    }

    /// Depth of the default stack above its seeded frames.
    pub fn default_depth(&self) -> usize {
        self.default.len() - self.base_default_depth
    }

    fn is_pristine(&self) -> bool {
        self.active.is_empty() && self.default.len() == self.base_default_depth
    }
}

type SeedFn<T> = dyn Fn() -> Vec<ScopeFrame<T>> + Send + Sync;

/// Thread-keyed store of lazily created [`ScopeStacks`].
pub struct ScopeRegistry<T> {
    states: Mutex<HashMap<ThreadId, ScopeStacks<T>>>,
    seed: Box<SeedFn<T>>,
}

impl<T: Clone> ScopeRegistry<T> {
    /// `seed` produces the initial default stack of every thread.
    pub fn new(seed: impl Fn() -> Vec<ScopeFrame<T>> + Send + Sync + 'static) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            seed: Box::new(seed),
        }
    }

    fn lock_states(&self) -> Result<std::sync::MutexGuard<'_, HashMap<ThreadId, ScopeStacks<T>>>> {
        self.states
            .lock()
            .map_err(|_| DatasetError::LockPoisoned("scope registry"))
    }

    /// Reads the calling thread's stacks without creating an entry for it.
    pub fn peek<R>(&self, f: impl FnOnce(&ScopeStacks<T>) -> R) -> Result<R> {
        let key = std::thread::current().id();
        let states = self.lock_states()?;
        match states.get(&key) {
            Some(stacks) => Ok(f(stacks)),
            None => Ok(f(&ScopeStacks::new((self.seed)()))),
        }
    }

    /// Mutates the calling thread's stacks, dropping the entry once it is back to
    /// its initial shape.
    fn update<R>(&self, f: impl FnOnce(&mut ScopeStacks<T>) -> R) -> Result<R> {
        let key = std::thread::current().id();
        let mut states = self.lock_states()?;
        let stacks = states
            .entry(key)
            .or_insert_with(|| ScopeStacks::new((self.seed)()));
        let out = f(stacks);
        if stacks.is_pristine() {
            states.remove(&key);
        }
        Ok(out)
    }

    pub fn push_active(&self, frame: ScopeFrame<T>) -> Result<()> {
        self.update(|s| s.active.push(frame))
    }

    pub fn push_default(&self, frame: ScopeFrame<T>) -> Result<()> {
        self.update(|s| s.default.push(frame))
    }

    pub fn pop_active(&self) -> Result<ScopeFrame<T>> {
        self.update(|s| s.active.pop())?.ok_or_else(|| {
            warn!("ResetActiveGraph called without a matching SetActiveGraph");
            DatasetError::ScopeUnderflow {
                scope: ScopeKind::Active,
            }
        })
    }

    /// Pops the default stack; the seeded frames can never be popped.
    pub fn pop_default(&self) -> Result<ScopeFrame<T>> {
        self.update(|s| {
            if s.default.len() > s.base_default_depth {
                s.default.pop()
            } else {
                None
            }
        })?
        .ok_or_else(|| {
            warn!("ResetDefaultGraph called without a matching SetDefaultGraph");
            DatasetError::ScopeUnderflow {
                scope: ScopeKind::Default,
            }
        })
    }

    pub fn active(&self) -> Result<Option<ScopeFrame<T>>> {
        self.peek(|s| s.active().cloned())
    }

    pub fn default(&self) -> Result<Option<ScopeFrame<T>>> {
        self.peek(|s| s.default().cloned())
    }

    /// Number of threads currently holding non-initial scope state.
    pub fn tracked_threads(&self) -> Result<usize> {
        Ok(self.lock_states()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::model::NamedNode;
    use std::sync::Arc;

    fn name(iri: &str) -> GraphName {
        GraphName::NamedNode(NamedNode::new(iri).unwrap())
    }

    #[test]
    fn balanced_pushes_restore_the_initial_state() {
        let registry: ScopeRegistry<()> = ScopeRegistry::new(Vec::new);
        for i in 0..3 {
            registry
                .push_active(ScopeFrame::names(vec![name(&format!("http://ex/g{i}"))]))
                .unwrap();
        }
        assert_eq!(registry.peek(|s| s.active_depth()).unwrap(), 3);
        assert_eq!(registry.tracked_threads().unwrap(), 1);
        for _ in 0..3 {
            registry.pop_active().unwrap();
        }
        assert_eq!(registry.active().unwrap(), None);
        assert_eq!(registry.tracked_threads().unwrap(), 0);
        let err = registry.pop_active().unwrap_err();
        assert!(matches!(
            err,
            DatasetError::ScopeUnderflow {
                scope: ScopeKind::Active
            }
        ));
    }

    #[test]
    fn seeded_default_frame_cannot_be_popped() {
        let seed = name("http://ex/default");
        let registry: ScopeRegistry<()> =
            ScopeRegistry::new(move || vec![ScopeFrame::names(vec![seed.clone()])]);
        assert_eq!(
            registry.default().unwrap().unwrap().names,
            vec![name("http://ex/default")]
        );
        registry
            .push_default(ScopeFrame::names(vec![name("http://ex/other")]))
            .unwrap();
        assert_eq!(registry.peek(|s| s.default_depth()).unwrap(), 1);
        registry.pop_default().unwrap();
        assert!(registry.pop_default().is_err());
        assert_eq!(
            registry.default().unwrap().unwrap().names,
            vec![name("http://ex/default")]
        );
    }

    #[test]
    fn threads_do_not_see_each_others_frames() {
        let registry: Arc<ScopeRegistry<()>> = Arc::new(ScopeRegistry::new(Vec::new));
        registry
            .push_active(ScopeFrame::names(vec![name("http://ex/main")]))
            .unwrap();

        let other = registry.clone();
        let seen = std::thread::spawn(move || {
            let before = other.active().unwrap();
            other
                .push_active(ScopeFrame::names(vec![name("http://ex/worker")]))
                .unwrap();
            let during = other.active().unwrap().map(|f| f.names);
            other.pop_active().unwrap();
            (before, during)
        })
        .join()
        .unwrap();

        assert_eq!(seen.0, None);
        assert_eq!(seen.1, Some(vec![name("http://ex/worker")]));
        assert_eq!(
            registry.active().unwrap().unwrap().names,
            vec![name("http://ex/main")]
        );
        registry.pop_active().unwrap();
    }
}
