//! The graph-oriented dataset: whole named graphs held by a [`GraphStore`].
//!
//! Scope frames carry a materialized target. A single name is resolved lazily
//! against the store on every read, so a frame pushed for a graph that does not
//! exist yet reads as empty rather than failing. Several names are merged into a
//! fresh graph when the frame is pushed.

use crate::dataset::{Dataset, DatasetLock};
use crate::errors::Result;
use crate::graph::{Graph, GraphView, MutableGraph, TransactionalGraph, UnionView};
use crate::options::DefaultGraphMode;
use crate::scope::{ScopeFrame, ScopeRegistry};
use crate::transaction::{ActionKind, TransactionHooks, TransactionLog};
use log::debug;
use oxigraph::model::GraphName;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Storage operations a graph-oriented dataset needs from its backing store.
///
/// Implementors also supply the rollback hooks of [`TransactionHooks`].
pub trait GraphStore: TransactionHooks + Send + Sync + 'static {
    /// The handle type stored graphs are kept in.
    type Handle: TransactionalGraph + 'static;

    /// Structurally adds a graph under its own name, replacing any graph of
    /// that name, and returns the stored handle.
    fn add_graph_internal(&self, graph: Graph) -> Result<Arc<Self::Handle>>;

    /// Structurally removes a graph, returning true when it existed.
    fn remove_graph_internal(&self, name: &GraphName) -> Result<bool>;

    fn has_graph_internal(&self, name: &GraphName) -> Result<bool>;

    fn graph_names(&self) -> Result<Vec<GraphName>>;

    fn graph_internal(&self, name: &GraphName) -> Result<Option<Arc<Self::Handle>>>;

    /// The stored handle for `name`, creating an empty graph if none exists.
    fn modifiable_graph_internal(&self, name: &GraphName) -> Result<Arc<Self::Handle>>;

    fn graph_handles(&self) -> Result<Vec<Arc<Self::Handle>>>;

    /// Whole-dataset scan used when no scope is set: every stored graph,
    /// concatenated without deduplication.
    fn scan_view(&self) -> Result<Arc<dyn GraphView>> {
        let members = self
            .graph_handles()?
            .into_iter()
            .map(|h| h as Arc<dyn GraphView>)
            .collect();
        Ok(Arc::new(UnionView::new(GraphName::DefaultGraph, members)))
    }
}

/// What a graph dataset scope frame reads from.
#[derive(Clone)]
pub enum FrameTarget {
    /// The whole-dataset scan.
    Dataset,
    /// One graph, looked up on every read.
    Named(GraphName),
    /// A graph materialized when the frame was pushed.
    Graph(Arc<dyn GraphView>),
    Empty,
}

impl fmt::Debug for FrameTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameTarget::Dataset => write!(f, "Dataset"),
            FrameTarget::Named(name) => write!(f, "Named({})", name),
            FrameTarget::Graph(g) => write!(f, "Graph({})", g.name()),
            FrameTarget::Empty => write!(f, "Empty"),
        }
    }
}

pub struct GraphDataset<S: GraphStore> {
    store: Arc<S>,
    mode: DefaultGraphMode,
    scopes: ScopeRegistry<FrameTarget>,
    log: TransactionLog,
    lock: Option<DatasetLock>,
}

impl<S: GraphStore> GraphDataset<S> {
    pub fn new(store: S, mode: DefaultGraphMode) -> Self {
        let seed_mode = mode.clone();
        let scopes = ScopeRegistry::new(move || match seed_mode.fixed_name() {
            Some(name) => vec![ScopeFrame::new(
                vec![name.clone()],
                FrameTarget::Named(name.clone()),
            )],
            None => Vec::new(),
        });
        Self {
            store: Arc::new(store),
            mode,
            scopes,
            log: TransactionLog::new(),
            lock: None,
        }
    }

    /// Exposes a reader-writer lock for update consumers to synchronize on.
    pub fn thread_safe(mut self, thread_safe: bool) -> Self {
        self.lock = thread_safe.then(|| Arc::new(RwLock::new(())));
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn default_graph_mode(&self) -> &DefaultGraphMode {
        &self.mode
    }

    pub fn transaction_log(&self) -> &TransactionLog {
        &self.log
    }

    fn resolve(&self, target: &FrameTarget) -> Result<Arc<dyn GraphView>> {
        Ok(match target {
            FrameTarget::Dataset => self.store.scan_view()?,
            FrameTarget::Named(name) => match self.store.graph_internal(name)? {
                Some(handle) => handle as Arc<dyn GraphView>,
                None => Arc::new(Graph::named(name.clone())) as Arc<dyn GraphView>,
            },
            FrameTarget::Graph(graph) => graph.clone(),
            FrameTarget::Empty => Arc::new(Graph::new()),
        })
    }

    fn frame_for(&self, names: &[GraphName]) -> Result<ScopeFrame<FrameTarget>> {
        let target = match names {
            [] => FrameTarget::Empty,
            [name] => FrameTarget::Named(name.clone()),
            _ => {
                let mut merged = Graph::new();
                for name in names {
                    if let Some(handle) = self.store.graph_internal(name)? {
                        merged.merge(&*handle, false)?;
                    }
                }
                debug!("Merged {} graphs into a scope of {} triples", names.len(), merged.len());
                FrameTarget::Graph(Arc::new(merged))
            }
        };
        Ok(ScopeFrame::new(names.to_vec(), target))
    }
}

impl<S: GraphStore> Dataset for GraphDataset<S> {
    fn set_active_graphs(&self, names: &[GraphName]) -> Result<()> {
        let frame = match names {
            [GraphName::DefaultGraph] => match self.scopes.default()? {
                Some(frame) => frame,
                None => ScopeFrame::new(self.default_graph_names()?, FrameTarget::Dataset),
            },
            _ => self.frame_for(names)?,
        };
        debug!("Setting active graph {:?}", frame.target);
        self.scopes.push_active(frame)
    }

    fn reset_active_graph(&self) -> Result<()> {
        self.scopes.pop_active().map(|_| ())
    }

    fn set_default_graphs(&self, names: &[GraphName]) -> Result<()> {
        let frame = self.frame_for(names)?;
        debug!("Setting default graph {:?}", frame.target);
        self.scopes.push_default(frame)
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
        if name.is_default_graph() && self.scopes.default()?.is_some() {
            return Ok(true);
        }
        self.store.has_graph_internal(name)
    }

    fn graphs(&self) -> Result<Vec<Arc<dyn GraphView>>> {
        Ok(self
            .store
            .graph_handles()?
            .into_iter()
            .map(|h| h as Arc<dyn GraphView>)
            .collect())
    }

    fn graph_names(&self) -> Result<Vec<GraphName>> {
        self.store.graph_names()
    }

    fn graph(&self, name: &GraphName) -> Result<Option<Arc<dyn GraphView>>> {
        if name.is_default_graph() {
            if let Some(frame) = self.scopes.default()? {
                return self.resolve(&frame.target).map(Some);
            }
        }
        Ok(self
            .store
            .graph_internal(name)?
            .map(|h| h as Arc<dyn GraphView>))
    }

    fn scope_view(&self) -> Result<Arc<dyn GraphView>> {
        let frame = match self.scopes.active()? {
            Some(frame) => Some(frame),
            None => self.scopes.default()?,
        };
        match frame {
            Some(frame) => self.resolve(&frame.target),
            None => self.store.scan_view(),
        }
    }

    fn add_graph(&self, graph: Graph) -> Result<bool> {
        let name = graph.name().clone();
        if self.store.has_graph_internal(&name)? {
            let existing = self.store.modifiable_graph_internal(&name)?;
            self.log.record(existing.clone(), ActionKind::Modified)?;
            existing.merge(&graph, false)?;
        } else {
            let added = self.store.add_graph_internal(graph)?;
            self.log.record(added, ActionKind::Added)?;
        }
        Ok(true)
    }

    fn remove_graph(&self, name: &GraphName) -> Result<bool> {
        if self.mode.is_default_graph(name) {
            if !self.store.has_graph_internal(name)? {
                return Ok(false);
            }
            self.get_modifiable_graph(name)?.clear()?;
            return Ok(true);
        }
        match self.store.graph_internal(name)? {
            Some(existing) => {
                // earlier edits die with the graph; a later get_modifiable_graph starts fresh
                existing.discard()?;
                self.log.evict(name)?;
                self.log.record(existing, ActionKind::Deleted)?;
                self.store.remove_graph_internal(name)
            }
            None => Ok(false),
        }
    }

    fn get_modifiable_graph(&self, name: &GraphName) -> Result<Arc<dyn TransactionalGraph>> {
        let handle = match self.log.cached(name)? {
            Some(handle) => handle,
            None => {
                let handle: Arc<dyn TransactionalGraph> =
                    self.store.modifiable_graph_internal(name)?;
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
