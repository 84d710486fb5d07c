//! In-memory backing stores for both dataset flavors.

use crate::errors::{DatasetError, Result};
use crate::graph::{Graph, GraphView, MutableGraph, SharedGraph};
use crate::graph_dataset::GraphStore;
use crate::persistence::{PersistentGraph, StorePersister, TriplePersister};
use crate::quad_dataset::QuadStore;
use crate::transaction::TransactionHooks;
use log::{debug, info};
use oxigraph::model::{
    GraphName, GraphNameRef, NamedNode, NamedOrBlankNode, NamedOrBlankNodeRef, Quad, QuadRef,
    Term, Triple,
};
use oxigraph::store::Store;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub type MemoryGraphHandle = PersistentGraph<SharedGraph>;

/// Named graphs held in memory, optionally written through to an oxigraph
/// [`Store`] on flush.
///
/// The unnamed graph always exists.
pub struct MemoryGraphStore {
    graphs: RwLock<HashMap<GraphName, Arc<MemoryGraphHandle>>>,
    persister: Option<Arc<StorePersister>>,
    always_queue: bool,
}

impl Default for MemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::empty(None, false)
    }

    /// Loads the current content of `store` and persists flushed changes back into it.
    pub fn with_backing(store: Store) -> Result<Self> {
        Self::open(Some(store), false)
    }

    pub fn open(backing: Option<Store>, always_queue: bool) -> Result<Self> {
        let Some(store) = backing else {
            return Ok(Self::empty(None, always_queue));
        };
        let mut loaded: HashMap<GraphName, Graph> = HashMap::new();
        for quad in store.iter() {
            let Quad {
                subject,
                predicate,
                object,
                graph_name,
            } = quad?;
            loaded
                .entry(graph_name.clone())
                .or_insert_with(|| Graph::named(graph_name))
                .assert(Triple::new(subject, predicate, object));
        }
        for name in store.named_graphs() {
            let name = graph_name_of(name?);
            loaded
                .entry(name.clone())
                .or_insert_with(|| Graph::named(name));
        }
        info!("Loaded {} graphs from the backing store", loaded.len());

        let this = Self::empty(Some(Arc::new(StorePersister::new(store))), always_queue);
        {
            let mut graphs = this.write_graphs()?;
            for (name, graph) in loaded {
                graphs.insert(name, Arc::new(this.wrap(SharedGraph::new(graph))));
            }
        }
        Ok(this)
    }

    fn empty(persister: Option<Arc<StorePersister>>, always_queue: bool) -> Self {
        let this = Self {
            graphs: RwLock::new(HashMap::new()),
            persister,
            always_queue,
        };
        let unnamed = Arc::new(this.wrap(SharedGraph::default()));
        let graphs = HashMap::from([(GraphName::DefaultGraph, unnamed)]);
        Self {
            graphs: RwLock::new(graphs),
            ..this
        }
    }

    /// The backing store flushed changes are written to, if any.
    pub fn backing_store(&self) -> Option<&Store> {
        self.persister.as_deref().map(StorePersister::store)
    }

    fn wrap(&self, graph: SharedGraph) -> MemoryGraphHandle {
        let handle = PersistentGraph::new(graph).always_queue(self.always_queue);
        match &self.persister {
            Some(p) => handle.with_persister(p.clone() as Arc<dyn TriplePersister>),
            None => handle,
        }
    }

    fn read_graphs(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<GraphName, Arc<MemoryGraphHandle>>>> {
        self.graphs
            .read()
            .map_err(|_| DatasetError::LockPoisoned("graph store read lock"))
    }

    fn write_graphs(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<GraphName, Arc<MemoryGraphHandle>>>> {
        self.graphs
            .write()
            .map_err(|_| DatasetError::LockPoisoned("graph store write lock"))
    }
}

impl GraphStore for MemoryGraphStore {
    type Handle = MemoryGraphHandle;

    fn add_graph_internal(&self, graph: Graph) -> Result<Arc<MemoryGraphHandle>> {
        let name = graph.name().clone();
        let handle = Arc::new(self.wrap(SharedGraph::new(Graph::named(name.clone()))));
        // asserted through the handle so the content is flushed like any other change
        handle.assert_all(GraphView::triples(&graph)?)?;
        debug!("Added graph {} with {} triples", name, graph.len());
        self.write_graphs()?.insert(name, handle.clone());
        Ok(handle)
    }

    fn remove_graph_internal(&self, name: &GraphName) -> Result<bool> {
        if name.is_default_graph() {
            let unnamed = self.read_graphs()?.get(name).cloned();
            if let Some(unnamed) = unnamed {
                unnamed.clear()?;
            }
            return Ok(true);
        }
        let removed = self.write_graphs()?.remove(name).is_some();
        if removed {
            if let Some(persister) = &self.persister {
                persister.schedule_drop(name)?;
            }
            debug!("Removed graph {}", name);
        }
        Ok(removed)
    }

    fn has_graph_internal(&self, name: &GraphName) -> Result<bool> {
        Ok(self.read_graphs()?.contains_key(name))
    }

    fn graph_names(&self) -> Result<Vec<GraphName>> {
        Ok(self.read_graphs()?.keys().cloned().collect())
    }

    fn graph_internal(&self, name: &GraphName) -> Result<Option<Arc<MemoryGraphHandle>>> {
        Ok(self.read_graphs()?.get(name).cloned())
    }

    fn modifiable_graph_internal(&self, name: &GraphName) -> Result<Arc<MemoryGraphHandle>> {
        let mut graphs = self.write_graphs()?;
        let handle = graphs
            .entry(name.clone())
            .or_insert_with(|| Arc::new(self.wrap(SharedGraph::new(Graph::named(name.clone())))));
        Ok(handle.clone())
    }

    fn graph_handles(&self) -> Result<Vec<Arc<MemoryGraphHandle>>> {
        Ok(self.read_graphs()?.values().cloned().collect())
    }
}

impl TransactionHooks for MemoryGraphStore {
    fn graph_exists(&self, name: &GraphName) -> Result<bool> {
        self.has_graph_internal(name)
    }

    fn remove_graph_structurally(&self, name: &GraphName) -> Result<bool> {
        self.remove_graph_internal(name)
    }

    fn restore_empty_graph(&self, name: &GraphName) -> Result<()> {
        self.add_graph_internal(Graph::named(name.clone())).map(|_| ())
    }

    fn flush_internal(&self) -> Result<()> {
        match &self.persister {
            Some(persister) => persister.finish(),
            None => Ok(()),
        }
    }

    fn discard_internal(&self) -> Result<()> {
        match &self.persister {
            Some(persister) => persister.abandon(),
            None => Ok(()),
        }
    }
}

/// A quad store kept in an in-memory oxigraph [`Store`].
///
/// Empty named graphs are tracked by the store itself, so a graph re-added
/// without triples still exists.
#[derive(Clone)]
pub struct MemoryQuadStore {
    store: Store,
}

impl MemoryQuadStore {
    pub fn new() -> Result<Self> {
        Ok(Self {
            store: Store::new()?,
        })
    }

    /// Uses `store` as is; its content is visible immediately.
    pub fn from_store(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    fn triples_for(
        &self,
        graph: &GraphName,
        subject: Option<&NamedOrBlankNode>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
    ) -> Result<Vec<Triple>> {
        let mut triples = Vec::new();
        for quad in self.store.quads_for_pattern(
            subject.map(NamedOrBlankNode::as_ref),
            predicate.map(NamedNode::as_ref),
            object.map(Term::as_ref),
            Some(graph.as_ref()),
        ) {
            let quad = quad?;
            triples.push(Triple::new(quad.subject, quad.predicate, quad.object));
        }
        Ok(triples)
    }

    fn quad_ref<'a>(graph: &'a GraphName, triple: &'a Triple) -> QuadRef<'a> {
        QuadRef::new(
            triple.subject.as_ref(),
            triple.predicate.as_ref(),
            triple.object.as_ref(),
            graph.as_ref(),
        )
    }
}

fn graph_name_of(node: NamedOrBlankNode) -> GraphName {
    match node {
        NamedOrBlankNode::NamedNode(n) => GraphName::NamedNode(n),
        NamedOrBlankNode::BlankNode(b) => GraphName::BlankNode(b),
    }
}

fn named_graph_ref(graph: &GraphName) -> Option<NamedOrBlankNodeRef<'_>> {
    match graph.as_ref() {
        GraphNameRef::NamedNode(n) => Some(n.into()),
        GraphNameRef::BlankNode(b) => Some(b.into()),
        GraphNameRef::DefaultGraph => None,
    }
}

impl QuadStore for MemoryQuadStore {
    fn add_quad(&self, graph: &GraphName, triple: &Triple) -> Result<bool> {
        let quad = Self::quad_ref(graph, triple);
        if self.store.contains(quad)? {
            return Ok(false);
        }
        self.store.insert(quad)?;
        Ok(true)
    }

    fn remove_quad(&self, graph: &GraphName, triple: &Triple) -> Result<bool> {
        let quad = Self::quad_ref(graph, triple);
        if !self.store.contains(quad)? {
            return Ok(false);
        }
        self.store.remove(quad)?;
        Ok(true)
    }

    fn contains_quad(&self, graph: &GraphName, triple: &Triple) -> Result<bool> {
        Ok(self.store.contains(Self::quad_ref(graph, triple))?)
    }

    fn quads(&self, graph: &GraphName) -> Result<Vec<Triple>> {
        self.triples_for(graph, None, None, None)
    }

    fn quads_with_subject(&self, graph: &GraphName, subject: &NamedOrBlankNode) -> Result<Vec<Triple>> {
        self.triples_for(graph, Some(subject), None, None)
    }

    fn quads_with_predicate(&self, graph: &GraphName, predicate: &NamedNode) -> Result<Vec<Triple>> {
        self.triples_for(graph, None, Some(predicate), None)
    }

    fn quads_with_object(&self, graph: &GraphName, object: &Term) -> Result<Vec<Triple>> {
        self.triples_for(graph, None, None, Some(object))
    }

    fn quads_with_subject_predicate(
        &self,
        graph: &GraphName,
        subject: &NamedOrBlankNode,
        predicate: &NamedNode,
    ) -> Result<Vec<Triple>> {
        self.triples_for(graph, Some(subject), Some(predicate), None)
    }

    fn quads_with_subject_object(
        &self,
        graph: &GraphName,
        subject: &NamedOrBlankNode,
        object: &Term,
    ) -> Result<Vec<Triple>> {
        self.triples_for(graph, Some(subject), None, Some(object))
    }

    fn quads_with_predicate_object(
        &self,
        graph: &GraphName,
        predicate: &NamedNode,
        object: &Term,
    ) -> Result<Vec<Triple>> {
        self.triples_for(graph, None, Some(predicate), Some(object))
    }

    fn has_graph_internal(&self, graph: &GraphName) -> Result<bool> {
        match named_graph_ref(graph) {
            Some(name) => Ok(self.store.contains_named_graph(name)?),
            None => Ok(true),
        }
    }

    fn graph_names(&self) -> Result<Vec<GraphName>> {
        let mut names = vec![GraphName::DefaultGraph];
        for name in self.store.named_graphs() {
            names.push(graph_name_of(name?));
        }
        Ok(names)
    }

    fn remove_graph_internal(&self, graph: &GraphName) -> Result<bool> {
        match named_graph_ref(graph) {
            Some(name) => {
                let existed = self.store.contains_named_graph(name)?;
                self.store.remove_named_graph(name)?;
                debug!("Removed graph {} from the quad store", graph);
                Ok(existed)
            }
            None => {
                self.store.clear_graph(GraphNameRef::DefaultGraph)?;
                Ok(true)
            }
        }
    }

    fn clear_graph_internal(&self, graph: &GraphName) -> Result<()> {
        Ok(self.store.clear_graph(graph.as_ref())?)
    }

    fn register_graph(&self, graph: &GraphName) -> Result<()> {
        if let Some(name) = named_graph_ref(graph) {
            self.store.insert_named_graph(name)?;
        }
        Ok(())
    }

    fn quad_count(&self, graph: &GraphName) -> Result<usize> {
        Ok(self.triples_for(graph, None, None, None)?.len())
    }
}

impl TransactionHooks for MemoryQuadStore {
    fn graph_exists(&self, name: &GraphName) -> Result<bool> {
        self.has_graph_internal(name)
    }

    fn remove_graph_structurally(&self, name: &GraphName) -> Result<bool> {
        self.remove_graph_internal(name)
    }

    fn restore_empty_graph(&self, name: &GraphName) -> Result<()> {
        self.register_graph(name)
    }
}
