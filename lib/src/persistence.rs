//! Per-graph change buffering: the "graph handle's own flush and discard".
//!
//! [`PersistentGraph`] applies every change to the graph it wraps right away and
//! remembers it. Flushing hands the remembered changes to a [`TriplePersister`];
//! discarding replays them backwards against the wrapped graph.

use crate::errors::{DatasetError, Result};
use crate::graph::{GraphView, MutableGraph, TransactionalGraph};
use log::{debug, info};
use oxigraph::model::{GraphName, NamedNode, NamedOrBlankNode, QuadRef, Term, Triple};
use oxigraph::store::Store;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// One buffered triple change.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TripleAction {
    pub triple: Triple,
    pub is_delete: bool,
}

/// Writes flushed triple changes somewhere durable.
pub trait TriplePersister: Send + Sync {
    fn persist_inserted(&self, graph: &GraphName, triples: &[Triple]) -> Result<()>;

    fn persist_deleted(&self, graph: &GraphName, triples: &[Triple]) -> Result<()>;
}

/// Buffers the changes made to a wrapped [`MutableGraph`] until flush or discard.
pub struct PersistentGraph<G: MutableGraph> {
    inner: G,
    actions: Mutex<Vec<TripleAction>>,
    always_queue: bool,
    persister: Option<Arc<dyn TriplePersister>>,
}

impl<G: MutableGraph> PersistentGraph<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            actions: Mutex::new(Vec::new()),
            always_queue: false,
            persister: None,
        }
    }

    /// Queue every assert/retract even when it does not change the wrapped graph.
    pub fn always_queue(mut self, always_queue: bool) -> Self {
        self.always_queue = always_queue;
        self
    }

    pub fn with_persister(mut self, persister: Arc<dyn TriplePersister>) -> Self {
        self.persister = Some(persister);
        self
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    /// A copy of the buffered changes, oldest first.
    pub fn actions(&self) -> Result<Vec<TripleAction>> {
        Ok(self.lock_actions()?.clone())
    }

    fn lock_actions(&self) -> Result<std::sync::MutexGuard<'_, Vec<TripleAction>>> {
        self.actions
            .lock()
            .map_err(|_| DatasetError::LockPoisoned("graph action log"))
    }

    fn persist_run(&self, persister: &dyn TriplePersister, run: &[Triple], is_delete: bool) -> Result<()> {
        let name = self.inner.name();
        if is_delete {
            persister.persist_deleted(&name, run)
        } else {
            persister.persist_inserted(&name, run)
        }
    }
}

impl<G: MutableGraph> GraphView for PersistentGraph<G> {
    fn name(&self) -> GraphName {
        self.inner.name()
    }

    fn triples(&self) -> Result<Vec<Triple>> {
        self.inner.triples()
    }

    fn contains(&self, triple: &Triple) -> Result<bool> {
        self.inner.contains(triple)
    }

    fn triples_with_subject(&self, subject: &NamedOrBlankNode) -> Result<Vec<Triple>> {
        self.inner.triples_with_subject(subject)
    }

    fn triples_with_predicate(&self, predicate: &NamedNode) -> Result<Vec<Triple>> {
        self.inner.triples_with_predicate(predicate)
    }

    fn triples_with_object(&self, object: &Term) -> Result<Vec<Triple>> {
        self.inner.triples_with_object(object)
    }

    fn triples_with_subject_predicate(
        &self,
        subject: &NamedOrBlankNode,
        predicate: &NamedNode,
    ) -> Result<Vec<Triple>> {
        self.inner.triples_with_subject_predicate(subject, predicate)
    }

    fn triples_with_subject_object(
        &self,
        subject: &NamedOrBlankNode,
        object: &Term,
    ) -> Result<Vec<Triple>> {
        self.inner.triples_with_subject_object(subject, object)
    }

    fn triples_with_predicate_object(
        &self,
        predicate: &NamedNode,
        object: &Term,
    ) -> Result<Vec<Triple>> {
        self.inner.triples_with_predicate_object(predicate, object)
    }

    fn len(&self) -> Result<usize> {
        self.inner.len()
    }
}

impl<G: MutableGraph> MutableGraph for PersistentGraph<G> {
    fn assert(&self, triple: Triple) -> Result<bool> {
        let mut actions = self.lock_actions()?;
        if self.always_queue || !self.inner.contains(&triple)? {
            self.inner.assert(triple.clone())?;
            actions.push(TripleAction {
                triple,
                is_delete: false,
            });
            return Ok(true);
        }
        Ok(false)
    }

    fn retract(&self, triple: &Triple) -> Result<bool> {
        let mut actions = self.lock_actions()?;
        if self.always_queue || self.inner.contains(triple)? {
            self.inner.retract(triple)?;
            actions.push(TripleAction {
                triple: triple.clone(),
                is_delete: true,
            });
            return Ok(true);
        }
        Ok(false)
    }

    fn clear(&self) -> Result<()> {
        let mut actions = self.lock_actions()?;
        for triple in self.inner.triples()? {
            actions.push(TripleAction {
                triple,
                is_delete: true,
            });
        }
        self.inner.clear()
    }
}

impl<G: MutableGraph> TransactionalGraph for PersistentGraph<G> {
    fn flush(&self) -> Result<()> {
        let mut actions = self.lock_actions()?;
        if actions.is_empty() {
            return Ok(());
        }
        if let Some(persister) = &self.persister {
            // hand over maximal runs of same-kind actions, in order
            let mut run: Vec<Triple> = Vec::new();
            let mut is_delete = actions[0].is_delete;
            for action in actions.iter() {
                if action.is_delete != is_delete {
                    self.persist_run(persister.as_ref(), &run, is_delete)?;
                    run.clear();
                    is_delete = action.is_delete;
                }
                run.push(action.triple.clone());
            }
            if !run.is_empty() {
                self.persist_run(persister.as_ref(), &run, is_delete)?;
            }
        }
        debug!(
            "Flushed {} buffered changes for graph {}",
            actions.len(),
            self.inner.name()
        );
        actions.clear();
        Ok(())
    }

    fn discard(&self) -> Result<()> {
        let mut actions = self.lock_actions()?;
        for action in actions.iter().rev() {
            if action.is_delete {
                self.inner.assert(action.triple.clone())?;
            } else {
                self.inner.retract(&action.triple)?;
            }
        }
        debug!(
            "Discarded {} buffered changes for graph {}",
            actions.len(),
            self.inner.name()
        );
        actions.clear();
        Ok(())
    }

    fn pending(&self) -> Result<usize> {
        Ok(self.lock_actions()?.len())
    }
}

/// Persists flushed changes into an oxigraph [`Store`] acting as the backing store.
///
/// Structural graph removals are only scheduled. A scheduled drop runs right
/// before the first write to the same graph during a flush, so a graph that was
/// removed and re-added in one transaction ends up with exactly its new content.
pub struct StorePersister {
    store: Store,
    pending_drops: Mutex<HashSet<GraphName>>,
}

impl StorePersister {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            pending_drops: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn schedule_drop(&self, name: &GraphName) -> Result<()> {
        self.lock_drops()?.insert(name.clone());
        Ok(())
    }

    pub fn has_pending_drop(&self, name: &GraphName) -> Result<bool> {
        Ok(self.lock_drops()?.contains(name))
    }

    /// Applies every drop that no flushed write has consumed yet.
    pub fn finish(&self) -> Result<()> {
        let drops: Vec<GraphName> = self.lock_drops()?.drain().collect();
        for name in &drops {
            self.drop_graph(name)?;
        }
        if !drops.is_empty() {
            info!("Dropped {} graphs from the backing store", drops.len());
        }
        Ok(())
    }

    /// Forgets scheduled drops without touching the backing store.
    pub fn abandon(&self) -> Result<()> {
        self.lock_drops()?.clear();
        Ok(())
    }

    fn lock_drops(&self) -> Result<std::sync::MutexGuard<'_, HashSet<GraphName>>> {
        self.pending_drops
            .lock()
            .map_err(|_| DatasetError::LockPoisoned("scheduled graph drops"))
    }

    fn apply_pending_drop(&self, name: &GraphName) -> Result<()> {
        let scheduled = self.lock_drops()?.remove(name);
        if scheduled {
            self.drop_graph(name)?;
        }
        Ok(())
    }

    fn drop_graph(&self, name: &GraphName) -> Result<()> {
        match name {
            GraphName::DefaultGraph => self.store.clear_graph(name.as_ref())?,
            GraphName::NamedNode(n) => {
                self.store.remove_named_graph(n.as_ref())?;
            }
            GraphName::BlankNode(b) => {
                self.store.remove_named_graph(b.as_ref())?;
            }
        }
        debug!("Dropped graph {} from the backing store", name);
        Ok(())
    }
}

impl TriplePersister for StorePersister {
    fn persist_inserted(&self, graph: &GraphName, triples: &[Triple]) -> Result<()> {
        self.apply_pending_drop(graph)?;
        for t in triples {
            self.store.insert(QuadRef::new(
                t.subject.as_ref(),
                t.predicate.as_ref(),
                t.object.as_ref(),
                graph.as_ref(),
            ))?;
        }
        Ok(())
    }

    fn persist_deleted(&self, graph: &GraphName, triples: &[Triple]) -> Result<()> {
        self.apply_pending_drop(graph)?;
        for t in triples {
            self.store.remove(QuadRef::new(
                t.subject.as_ref(),
                t.predicate.as_ref(),
                t.object.as_ref(),
                graph.as_ref(),
            ))?;
        }
        Ok(())
    }
}
