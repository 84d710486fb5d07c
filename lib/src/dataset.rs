//! The read, write, scope and lock contract shared by every dataset flavor.

use crate::errors::Result;
use crate::graph::{Graph, GraphView, TransactionalGraph, TriplePattern};
use oxigraph::model::{GraphName, NamedNode, NamedOrBlankNode, Term, Triple};
use std::sync::{Arc, RwLock};

/// The optional reader-writer lock a thread-safe dataset exposes.
///
/// Update consumers hold the write side across a mutating call sequence; readers
/// take the read side. Decorators hand out the lock of the dataset they wrap.
pub type DatasetLock = Arc<RwLock<()>>;

/// A collection of named graphs with per-thread graph scoping and
/// flush/discard transactions.
///
/// Triple enumerations are scope-aware: they read the active scope if one is
/// set on the calling thread, else the default scope, else the whole dataset.
pub trait Dataset: Send + Sync {
    /// Pushes an active scope. One name selects that graph; several select
    /// their merge; none selects nothing. The unnamed graph alone selects the
    /// current default scope.
    fn set_active_graphs(&self, names: &[GraphName]) -> Result<()>;

    /// Pops the active scope pushed last on this thread.
    fn reset_active_graph(&self) -> Result<()>;

    fn set_default_graphs(&self, names: &[GraphName]) -> Result<()>;

    fn reset_default_graph(&self) -> Result<()>;

    /// Names of the active scope, falling back to the default scope.
    fn active_graph_names(&self) -> Result<Vec<GraphName>>;

    /// Names of the default scope; in union mode with no default scope set, every graph name.
    fn default_graph_names(&self) -> Result<Vec<GraphName>>;

    fn uses_union_default_graph(&self) -> bool;

    fn has_graph(&self, name: &GraphName) -> Result<bool>;

    fn graphs(&self) -> Result<Vec<Arc<dyn GraphView>>>;

    fn graph_names(&self) -> Result<Vec<GraphName>>;

    /// A read view of one graph, `None` when no such graph exists.
    fn graph(&self, name: &GraphName) -> Result<Option<Arc<dyn GraphView>>>;

    /// The triples currently in scope for the calling thread.
    fn scope_view(&self) -> Result<Arc<dyn GraphView>>;

    /// Adds a graph, merging into an existing graph of the same name.
    fn add_graph(&self, graph: Graph) -> Result<bool>;

    /// Removes a graph. The unnamed and the designated default graph are
    /// cleared in place; an unknown name returns false.
    fn remove_graph(&self, name: &GraphName) -> Result<bool>;

    /// A mutable handle whose edits are visible immediately and persisted no
    /// later than the next [`flush`](Dataset::flush). Absent graphs are created.
    fn get_modifiable_graph(&self, name: &GraphName) -> Result<Arc<dyn TransactionalGraph>>;

    fn flush(&self) -> Result<()>;

    fn discard(&self) -> Result<()>;

    fn lock(&self) -> Option<DatasetLock> {
        None
    }

    fn set_active_graph(&self, name: &GraphName) -> Result<()> {
        self.set_active_graphs(std::slice::from_ref(name))
    }

    fn set_default_graph(&self, name: &GraphName) -> Result<()> {
        self.set_default_graphs(std::slice::from_ref(name))
    }

    fn graph_count(&self) -> Result<usize> {
        Ok(self.graph_names()?.len())
    }

    fn triples(&self) -> Result<Vec<Triple>> {
        self.scope_view()?.triples()
    }

    fn has_triples(&self) -> Result<bool> {
        Ok(!self.scope_view()?.is_empty()?)
    }

    fn contains_triple(&self, triple: &Triple) -> Result<bool> {
        self.scope_view()?.contains(triple)
    }

    fn triples_with_subject(&self, subject: &NamedOrBlankNode) -> Result<Vec<Triple>> {
        self.scope_view()?.triples_with_subject(subject)
    }

    fn triples_with_predicate(&self, predicate: &NamedNode) -> Result<Vec<Triple>> {
        self.scope_view()?.triples_with_predicate(predicate)
    }

    fn triples_with_object(&self, object: &Term) -> Result<Vec<Triple>> {
        self.scope_view()?.triples_with_object(object)
    }

    fn triples_with_subject_predicate(
        &self,
        subject: &NamedOrBlankNode,
        predicate: &NamedNode,
    ) -> Result<Vec<Triple>> {
        self.scope_view()?
            .triples_with_subject_predicate(subject, predicate)
    }

    fn triples_with_subject_object(
        &self,
        subject: &NamedOrBlankNode,
        object: &Term,
    ) -> Result<Vec<Triple>> {
        self.scope_view()?.triples_with_subject_object(subject, object)
    }

    fn triples_with_predicate_object(
        &self,
        predicate: &NamedNode,
        object: &Term,
    ) -> Result<Vec<Triple>> {
        self.scope_view()?
            .triples_with_predicate_object(predicate, object)
    }

    fn triples_matching(&self, pattern: &TriplePattern) -> Result<Vec<Triple>> {
        self.scope_view()?.triples_matching(pattern)
    }
}

impl<D: Dataset + ?Sized> Dataset for Arc<D> {
    fn set_active_graphs(&self, names: &[GraphName]) -> Result<()> {
        (**self).set_active_graphs(names)
    }

    fn reset_active_graph(&self) -> Result<()> {
        (**self).reset_active_graph()
    }

    fn set_default_graphs(&self, names: &[GraphName]) -> Result<()> {
        (**self).set_default_graphs(names)
    }

    fn reset_default_graph(&self) -> Result<()> {
        (**self).reset_default_graph()
    }

    fn active_graph_names(&self) -> Result<Vec<GraphName>> {
        (**self).active_graph_names()
    }

    fn default_graph_names(&self) -> Result<Vec<GraphName>> {
        (**self).default_graph_names()
    }

    fn uses_union_default_graph(&self) -> bool {
        (**self).uses_union_default_graph()
    }

    fn has_graph(&self, name: &GraphName) -> Result<bool> {
        (**self).has_graph(name)
    }

    fn graphs(&self) -> Result<Vec<Arc<dyn GraphView>>> {
        (**self).graphs()
    }

    fn graph_names(&self) -> Result<Vec<GraphName>> {
        (**self).graph_names()
    }

    fn graph(&self, name: &GraphName) -> Result<Option<Arc<dyn GraphView>>> {
        (**self).graph(name)
    }

    fn scope_view(&self) -> Result<Arc<dyn GraphView>> {
        (**self).scope_view()
    }

    fn add_graph(&self, graph: Graph) -> Result<bool> {
        (**self).add_graph(graph)
    }

    fn remove_graph(&self, name: &GraphName) -> Result<bool> {
        (**self).remove_graph(name)
    }

    fn get_modifiable_graph(&self, name: &GraphName) -> Result<Arc<dyn TransactionalGraph>> {
        (**self).get_modifiable_graph(name)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn discard(&self) -> Result<()> {
        (**self).discard()
    }

    fn lock(&self) -> Option<DatasetLock> {
        (**self).lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph_dataset::GraphDataset;
    use crate::memory::MemoryGraphStore;
    use crate::options::DefaultGraphMode;

    fn nn(iri: &str) -> NamedNode {
        NamedNode::new(iri).unwrap()
    }

    fn triple(s: &str, o: &str) -> Triple {
        Triple::new(nn(s), nn("http://ex/p"), nn(o))
    }

    fn shared() -> Arc<dyn Dataset> {
        let dataset = GraphDataset::new(MemoryGraphStore::new(), DefaultGraphMode::Union)
            .thread_safe(true);
        dataset
            .add_graph(Graph::from_triples(
                GraphName::NamedNode(nn("http://ex/g")),
                [triple("http://ex/a", "http://ex/1"), triple("http://ex/b", "http://ex/2")],
            ))
            .unwrap();
        Arc::new(dataset)
    }

    #[test]
    fn provided_lookups_go_through_the_scope_view() {
        let dataset = shared();
        // the unnamed graph plus g
        assert_eq!(dataset.graph_count().unwrap(), 2);
        assert!(dataset.has_triples().unwrap());

        let pattern = TriplePattern::new(Some(nn("http://ex/a").into()), None, None);
        assert_eq!(
            dataset.triples_matching(&pattern).unwrap(),
            vec![triple("http://ex/a", "http://ex/1")]
        );
        assert_eq!(
            dataset
                .triples_with_object(&nn("http://ex/2").into())
                .unwrap(),
            vec![triple("http://ex/b", "http://ex/2")]
        );
    }

    #[test]
    fn arc_forwards_to_the_shared_dataset() {
        let dataset = shared();
        let alias = Arc::new(dataset.clone());
        assert!(alias.lock().is_some());
        assert!(Arc::ptr_eq(&alias.lock().unwrap(), &dataset.lock().unwrap()));

        alias.set_active_graph(&GraphName::DefaultGraph).unwrap();
        assert_eq!(dataset.triples().unwrap().len(), 2);
        alias.reset_active_graph().unwrap();
        assert!(dataset.reset_active_graph().is_err());
    }
}
