//! The quad-oriented dataset: a flat quad store with lazy per-graph views.
//!
//! Nothing is materialized here. Scope frames only carry graph names, and every
//! read fans out over the names in scope and concatenates the per-graph
//! answers, so a triple asserted in two in-scope graphs is reported twice.

use crate::dataset::{Dataset, DatasetLock};
use crate::errors::Result;
use crate::graph::{Graph, GraphView, MutableGraph, SharedGraph, TransactionalGraph, UnionView};
use crate::options::DefaultGraphMode;
use crate::persistence::PersistentGraph;
use crate::scope::{ScopeFrame, ScopeRegistry};
use crate::transaction::{ActionKind, TransactionHooks, TransactionLog};
use log::debug;
use oxigraph::model::{GraphName, NamedNode, NamedOrBlankNode, Term, Triple};
use std::sync::{Arc, RwLock};

/// Per-graph storage operations of a quad store. Every lookup is confined to
/// the quads of one graph and returns their triples.
pub trait QuadStore: TransactionHooks + Send + Sync + 'static {
    fn add_quad(&self, graph: &GraphName, triple: &Triple) -> Result<bool>;

    fn remove_quad(&self, graph: &GraphName, triple: &Triple) -> Result<bool>;

    fn contains_quad(&self, graph: &GraphName, triple: &Triple) -> Result<bool>;

    fn quads(&self, graph: &GraphName) -> Result<Vec<Triple>>;

    fn quads_with_subject(&self, graph: &GraphName, subject: &NamedOrBlankNode) -> Result<Vec<Triple>>;

    fn quads_with_predicate(&self, graph: &GraphName, predicate: &NamedNode) -> Result<Vec<Triple>>;

    fn quads_with_object(&self, graph: &GraphName, object: &Term) -> Result<Vec<Triple>>;

    fn quads_with_subject_predicate(
        &self,
        graph: &GraphName,
        subject: &NamedOrBlankNode,
        predicate: &NamedNode,
    ) -> Result<Vec<Triple>>;

    fn quads_with_subject_object(
        &self,
        graph: &GraphName,
        subject: &NamedOrBlankNode,
        object: &Term,
    ) -> Result<Vec<Triple>>;

    fn quads_with_predicate_object(
        &self,
        graph: &GraphName,
        predicate: &NamedNode,
        object: &Term,
    ) -> Result<Vec<Triple>>;

    fn has_graph_internal(&self, graph: &GraphName) -> Result<bool>;

    fn graph_names(&self) -> Result<Vec<GraphName>>;

    /// Removes every quad of a graph and the graph itself. The unnamed graph
    /// is only emptied.
    fn remove_graph_internal(&self, graph: &GraphName) -> Result<bool>;

    /// Removes every quad of a graph, leaving it in place.
    fn clear_graph_internal(&self, graph: &GraphName) -> Result<()>;

    /// Makes `graph` exist even without any quads.
    fn register_graph(&self, graph: &GraphName) -> Result<()>;

    fn quad_count(&self, graph: &GraphName) -> Result<usize> {
        Ok(self.quads(graph)?.len())
    }
}

/// A graph-shaped pass-through to the quads of one graph.
///
/// Later quad mutations are visible through a view obtained earlier.
pub struct QuadGraphView<S: QuadStore> {
    store: Arc<S>,
    name: GraphName,
}

impl<S: QuadStore> QuadGraphView<S> {
    pub fn new(store: Arc<S>, name: GraphName) -> Self {
        Self { store, name }
    }
}

impl<S: QuadStore> GraphView for QuadGraphView<S> {
    fn name(&self) -> GraphName {
        self.name.clone()
    }

    fn triples(&self) -> Result<Vec<Triple>> {
        self.store.quads(&self.name)
    }

    fn contains(&self, triple: &Triple) -> Result<bool> {
        self.store.contains_quad(&self.name, triple)
    }

    fn triples_with_subject(&self, subject: &NamedOrBlankNode) -> Result<Vec<Triple>> {
        self.store.quads_with_subject(&self.name, subject)
    }

    fn triples_with_predicate(&self, predicate: &NamedNode) -> Result<Vec<Triple>> {
        self.store.quads_with_predicate(&self.name, predicate)
    }

    fn triples_with_object(&self, object: &Term) -> Result<Vec<Triple>> {
        self.store.quads_with_object(&self.name, object)
    }

    fn triples_with_subject_predicate(
        &self,
        subject: &NamedOrBlankNode,
        predicate: &NamedNode,
    ) -> Result<Vec<Triple>> {
        self.store
            .quads_with_subject_predicate(&self.name, subject, predicate)
    }

    fn triples_with_subject_object(
        &self,
        subject: &NamedOrBlankNode,
        object: &Term,
    ) -> Result<Vec<Triple>> {
        self.store.quads_with_subject_object(&self.name, subject, object)
    }

    fn triples_with_predicate_object(
        &self,
        predicate: &NamedNode,
        object: &Term,
    ) -> Result<Vec<Triple>> {
        self.store
            .quads_with_predicate_object(&self.name, predicate, object)
    }

    fn len(&self) -> Result<usize> {
        self.store.quad_count(&self.name)
    }
}

impl<S: QuadStore> MutableGraph for QuadGraphView<S> {
    fn assert(&self, triple: Triple) -> Result<bool> {
        self.store.add_quad(&self.name, &triple)
    }

    fn retract(&self, triple: &Triple) -> Result<bool> {
        self.store.remove_quad(&self.name, triple)
    }

    fn clear(&self) -> Result<()> {
        self.store.clear_graph_internal(&self.name)
    }
}

pub struct QuadDataset<S: QuadStore> {
    store: Arc<S>,
    mode: DefaultGraphMode,
    scopes: ScopeRegistry<()>,
    log: TransactionLog,
    lock: Option<DatasetLock>,
    always_queue: bool,
}

impl<S: QuadStore> QuadDataset<S> {
    pub fn new(store: S, mode: DefaultGraphMode) -> Self {
        let seed_mode = mode.clone();
        let scopes = ScopeRegistry::new(move || match seed_mode.fixed_name() {
            Some(name) => vec![ScopeFrame::names(vec![name.clone()])],
            None => Vec::new(),
        });
        Self {
            store: Arc::new(store),
            mode,
            scopes,
            log: TransactionLog::new(),
            lock: None,
            always_queue: false,
        }
    }

    pub fn thread_safe(mut self, thread_safe: bool) -> Self {
        self.lock = thread_safe.then(|| Arc::new(RwLock::new(())));
        self
    }

    /// Modifiable graph handles log every change, even redundant ones.
    pub fn always_queue(mut self, always_queue: bool) -> Self {
        self.always_queue = always_queue;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn transaction_log(&self) -> &TransactionLog {
        &self.log
    }

    /// True for the unnamed graph and the designated default graph.
    pub fn is_default_graph(&self, name: &GraphName) -> bool {
        self.mode.is_default_graph(name)
    }

    pub fn add_quad(&self, graph: &GraphName, triple: &Triple) -> Result<bool> {
        self.store.add_quad(graph, triple)
    }

    pub fn remove_quad(&self, graph: &GraphName, triple: &Triple) -> Result<bool> {
        self.store.remove_quad(graph, triple)
    }

    pub fn contains_quad(&self, graph: &GraphName, triple: &Triple) -> Result<bool> {
        self.store.contains_quad(graph, triple)
    }

    fn view(&self, name: &GraphName) -> Arc<QuadGraphView<S>> {
        Arc::new(QuadGraphView::new(self.store.clone(), name.clone()))
    }

    fn handle(&self, name: &GraphName) -> Arc<PersistentGraph<QuadGraphView<S>>> {
        Arc::new(
            PersistentGraph::new(QuadGraphView::new(self.store.clone(), name.clone()))
                .always_queue(self.always_queue),
        )
    }

    fn union_of(&self, name: GraphName, names: &[GraphName]) -> Arc<dyn GraphView> {
        match names {
            [single] => self.view(single) as Arc<dyn GraphView>,
            _ => {
                let members = names
                    .iter()
                    .map(|n| self.view(n) as Arc<dyn GraphView>)
                    .collect();
                Arc::new(UnionView::new(name, members)) as Arc<dyn GraphView>
            }
        }
    }
}

impl<S: QuadStore> Dataset for QuadDataset<S> {
    fn set_active_graphs(&self, names: &[GraphName]) -> Result<()> {
        let names = match names {
            [GraphName::DefaultGraph] => self.default_graph_names()?,
            _ => names.to_vec(),
        };
        debug!("Setting active graphs {:?}", names);
        self.scopes.push_active(ScopeFrame::names(names))
    }

    fn reset_active_graph(&self) -> Result<()> {
        self.scopes.pop_active().map(|_| ())
    }

    fn set_default_graphs(&self, names: &[GraphName]) -> Result<()> {
        debug!("Setting default graphs {:?}", names);
        self.scopes.push_default(ScopeFrame::names(names.to_vec()))
    }

    fn reset_default_graph(&self) -> Result<()> {
        self.scopes.pop_default().map(|_| ())
    }

    fn active_graph_names(&self) -> Result<Vec<GraphName>> {
        match self.scopes.active()? {
            Some(frame) => Ok(frame.names),
            None => self.default_graph_names(),
        }
    }

    fn default_graph_names(&self) -> Result<Vec<GraphName>> {
        match self.scopes.default()? {
            Some(frame) => Ok(frame.names),
            None if self.mode.is_union() => self.store.graph_names(),
            None => Ok(Vec::new()),
        }
    }

    fn uses_union_default_graph(&self) -> bool {
        self.mode.is_union()
    }

    fn has_graph(&self, name: &GraphName) -> Result<bool> {
        if name.is_default_graph() && !self.default_graph_names()?.is_empty() {
            return Ok(true);
        }
        self.store.has_graph_internal(name)
    }

    fn graphs(&self) -> Result<Vec<Arc<dyn GraphView>>> {
        Ok(self
            .store
            .graph_names()?
            .iter()
            .map(|n| self.view(n) as Arc<dyn GraphView>)
            .collect())
    }

    fn graph_names(&self) -> Result<Vec<GraphName>> {
        self.store.graph_names()
    }

    fn graph(&self, name: &GraphName) -> Result<Option<Arc<dyn GraphView>>> {
        if name.is_default_graph() {
            let names = self.default_graph_names()?;
            if !names.is_empty() {
                return Ok(Some(self.union_of(GraphName::DefaultGraph, &names)));
            }
        }
        if !self.store.has_graph_internal(name)? {
            return Ok(None);
        }
        Ok(Some(self.view(name) as Arc<dyn GraphView>))
    }

    fn scope_view(&self) -> Result<Arc<dyn GraphView>> {
        let names = self.active_graph_names()?;
        Ok(self.union_of(GraphName::DefaultGraph, &names))
    }

    /// Adds the triples one quad at a time; the result is true when any quad was new.
    fn add_graph(&self, graph: Graph) -> Result<bool> {
        let name = graph.name().clone();
        let triples = GraphView::triples(&graph)?;
        if self.store.has_graph_internal(&name)? {
            let existing = self.get_modifiable_graph(&name)?;
            return existing.assert_all(triples);
        }
        let mut added = false;
        for triple in &triples {
            added = self.store.add_quad(&name, triple)? || added;
        }
        self.store.register_graph(&name)?;
        self.log.record(self.handle(&name), ActionKind::Added)?;
        Ok(added)
    }

    fn remove_graph(&self, name: &GraphName) -> Result<bool> {
        if self.is_default_graph(name) {
            if !self.store.has_graph_internal(name)? {
                return Ok(false);
            }
            self.get_modifiable_graph(name)?.clear()?;
            return Ok(true);
        }
        if !self.store.has_graph_internal(name)? {
            return Ok(false);
        }
        if let Some(cached) = self.log.evict(name)? {
            cached.discard()?;
        }
        // the view is lazy, so keep a detached copy of the graph as it stood
        let snapshot = Graph::from_triples(name.clone(), self.store.quads(name)?);
        self.log.record(
            Arc::new(PersistentGraph::new(SharedGraph::new(snapshot))),
            ActionKind::Deleted,
        )?;
        self.store.remove_graph_internal(name)
    }

    fn get_modifiable_graph(&self, name: &GraphName) -> Result<Arc<dyn TransactionalGraph>> {
        let handle = match self.log.cached(name)? {
            Some(handle) => handle,
            None => {
                if !self.store.has_graph_internal(name)? {
                    self.store.register_graph(name)?;
                }
                let handle: Arc<dyn TransactionalGraph> = self.handle(name);
                self.log.cache(handle.clone())?;
                handle
            }
        };
        self.log.record(handle.clone(), ActionKind::Modified)?;
        Ok(handle)
    }

    fn flush(&self) -> Result<()> {
        self.log.take()?.commit(&self.log, &*self.store)
    }

    fn discard(&self) -> Result<()> {
        self.log.take()?.rollback(&*self.store)
    }

    fn lock(&self) -> Option<DatasetLock> {
        self.lock.clone()
    }
}
