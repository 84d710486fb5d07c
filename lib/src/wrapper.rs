//! Dataset decorators.

use crate::dataset::{Dataset, DatasetLock};
use crate::errors::{DatasetError, Result};
use crate::graph::{Graph, GraphView, TransactionalGraph};
use log::debug;
use oxigraph::model::GraphName;
use std::sync::Arc;

/// Forwards every call to an inner dataset, including its lock, so that a
/// chain of decorators shares exactly one lock.
pub struct WrapperDataset<D: Dataset> {
    inner: D,
}

impl<D: Dataset> WrapperDataset<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn into_inner(self) -> D {
        self.inner
    }
}

impl<D: Dataset> Dataset for WrapperDataset<D> {
    fn set_active_graphs(&self, names: &[GraphName]) -> Result<()> {
        self.inner.set_active_graphs(names)
    }

    fn reset_active_graph(&self) -> Result<()> {
        self.inner.reset_active_graph()
    }

    fn set_default_graphs(&self, names: &[GraphName]) -> Result<()> {
        self.inner.set_default_graphs(names)
    }

    fn reset_default_graph(&self) -> Result<()> {
        self.inner.reset_default_graph()
    }

    fn active_graph_names(&self) -> Result<Vec<GraphName>> {
        self.inner.active_graph_names()
    }

    fn default_graph_names(&self) -> Result<Vec<GraphName>> {
        self.inner.default_graph_names()
    }

    fn uses_union_default_graph(&self) -> bool {
        self.inner.uses_union_default_graph()
    }

    fn has_graph(&self, name: &GraphName) -> Result<bool> {
        self.inner.has_graph(name)
    }

    fn graphs(&self) -> Result<Vec<Arc<dyn GraphView>>> {
        self.inner.graphs()
    }

    fn graph_names(&self) -> Result<Vec<GraphName>> {
        self.inner.graph_names()
    }

    fn graph(&self, name: &GraphName) -> Result<Option<Arc<dyn GraphView>>> {
        self.inner.graph(name)
    }

    fn scope_view(&self) -> Result<Arc<dyn GraphView>> {
        self.inner.scope_view()
    }

    fn add_graph(&self, graph: Graph) -> Result<bool> {
        self.inner.add_graph(graph)
    }

    fn remove_graph(&self, name: &GraphName) -> Result<bool> {
        self.inner.remove_graph(name)
    }

    fn get_modifiable_graph(&self, name: &GraphName) -> Result<Arc<dyn TransactionalGraph>> {
        self.inner.get_modifiable_graph(name)
    }

    fn flush(&self) -> Result<()> {
        self.inner.flush()
    }

    fn discard(&self) -> Result<()> {
        self.inner.discard()
    }

    fn lock(&self) -> Option<DatasetLock> {
        self.inner.lock()
    }
}

const IMMUTABLE: &str = "This dataset is immutable";

/// A read-only view of a dataset: reads and scope calls are forwarded,
/// mutations fail and flush/discard do nothing.
pub struct ImmutableDataset<D: Dataset> {
    inner: D,
}

impl<D: Dataset> ImmutableDataset<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

impl<D: Dataset> Dataset for ImmutableDataset<D> {
    fn set_active_graphs(&self, names: &[GraphName]) -> Result<()> {
        self.inner.set_active_graphs(names)
    }

    fn reset_active_graph(&self) -> Result<()> {
        self.inner.reset_active_graph()
    }

    fn set_default_graphs(&self, names: &[GraphName]) -> Result<()> {
        self.inner.set_default_graphs(names)
    }

    fn reset_default_graph(&self) -> Result<()> {
        self.inner.reset_default_graph()
    }

    fn active_graph_names(&self) -> Result<Vec<GraphName>> {
        self.inner.active_graph_names()
    }

    fn default_graph_names(&self) -> Result<Vec<GraphName>> {
        self.inner.default_graph_names()
    }

    fn uses_union_default_graph(&self) -> bool {
        self.inner.uses_union_default_graph()
    }

    fn has_graph(&self, name: &GraphName) -> Result<bool> {
        self.inner.has_graph(name)
    }

    fn graphs(&self) -> Result<Vec<Arc<dyn GraphView>>> {
        self.inner.graphs()
    }

    fn graph_names(&self) -> Result<Vec<GraphName>> {
        self.inner.graph_names()
    }

    fn graph(&self, name: &GraphName) -> Result<Option<Arc<dyn GraphView>>> {
        self.inner.graph(name)
    }

    fn scope_view(&self) -> Result<Arc<dyn GraphView>> {
        self.inner.scope_view()
    }

    fn add_graph(&self, _graph: Graph) -> Result<bool> {
        Err(DatasetError::Immutable(IMMUTABLE))
    }

    fn remove_graph(&self, _name: &GraphName) -> Result<bool> {
        Err(DatasetError::Immutable(IMMUTABLE))
    }

    fn get_modifiable_graph(&self, _name: &GraphName) -> Result<Arc<dyn TransactionalGraph>> {
        Err(DatasetError::Immutable(IMMUTABLE))
    }

    fn flush(&self) -> Result<()> {
        debug!("Ignoring flush on an immutable dataset");
        Ok(())
    }

    fn discard(&self) -> Result<()> {
        debug!("Ignoring discard on an immutable dataset");
        Ok(())
    }

    fn lock(&self) -> Option<DatasetLock> {
        self.inner.lock()
    }
}
