use anyhow::Result;
use oxigraph::model::{GraphName, NamedNode, Quad, Triple};
use oxigraph::store::Store;
use sparql_dataset::{
    open_dataset, open_dataset_with_backing, Dataset, DatasetConfig, DefaultGraphMode, Graph,
    GraphDataset, MemoryGraphStore, MemoryQuadStore, QuadDataset,
    StorageKind,
};
use std::sync::Arc;

fn nn(iri: &str) -> NamedNode {
    NamedNode::new(iri).unwrap()
}

fn g(name: &str) -> GraphName {
    GraphName::NamedNode(nn(&format!("http://example.com/{}", name)))
}

fn t(subject: &str) -> Triple {
    Triple::new(
        nn(&format!("http://example.com/{}", subject)),
        nn("http://example.com/p"),
        nn("http://example.com/o"),
    )
}

fn quad(graph: &str, subject: &str) -> Quad {
    t(subject).in_graph(g(graph))
}

fn backed(store: &Store) -> Result<Arc<dyn Dataset>> {
    Ok(open_dataset_with_backing(&DatasetConfig::default(), store.clone())?)
}

fn quad_config() -> DatasetConfig {
    DatasetConfig::builder()
        .storage(StorageKind::Quad)
        .build()
        .unwrap()
}

#[test]
fn flushed_changes_reach_the_backing_store() -> Result<()> {
    let store = Store::new()?;
    let dataset = backed(&store)?;

    dataset.add_graph(Graph::from_triples(g("g1"), [t("a")]))?;
    assert!(dataset.has_graph(&g("g1"))?);
    assert!(!store.contains(&quad("g1", "a"))?);
    dataset.flush()?;
    assert!(store.contains(&quad("g1", "a"))?);
    dataset.discard()?;
    assert!(dataset.has_graph(&g("g1"))?);
    assert!(store.contains(&quad("g1", "a"))?);

    // a fresh dataset over the same store sees the committed graph
    let reopened = backed(&store)?;
    assert!(reopened.has_graph(&g("g1"))?);
    reopened.set_active_graph(&g("g1"))?;
    assert_eq!(reopened.triples()?, vec![t("a")]);
    reopened.reset_active_graph()?;
    Ok(())
}

#[test]
fn modifications_are_persisted_on_flush() -> Result<()> {
    let store = Store::new()?;
    let dataset = backed(&store)?;
    dataset.add_graph(Graph::from_triples(g("g1"), [t("a")]))?;
    dataset.flush()?;

    let graph = dataset.get_modifiable_graph(&g("g1"))?;
    assert!(graph.assert(t("b"))?);
    assert!(graph.retract(&t("a"))?);
    assert!(store.contains(&quad("g1", "a"))?);
    assert!(!store.contains(&quad("g1", "b"))?);

    dataset.flush()?;
    assert!(!store.contains(&quad("g1", "a"))?);
    assert!(store.contains(&quad("g1", "b"))?);
    Ok(())
}

#[test]
fn removed_graphs_are_dropped_on_flush() -> Result<()> {
    let store = Store::new()?;
    let dataset = backed(&store)?;
    dataset.add_graph(Graph::from_triples(g("g1"), [t("a")]))?;
    dataset.flush()?;

    assert!(dataset.remove_graph(&g("g1"))?);
    assert!(!dataset.has_graph(&g("g1"))?);
    assert!(store.contains(&quad("g1", "a"))?);
    dataset.flush()?;
    assert!(!store.contains(&quad("g1", "a"))?);
    assert!(!dataset.remove_graph(&g("g1"))?);
    Ok(())
}

#[test]
fn discarding_an_addition_removes_the_graph() -> Result<()> {
    let store = Store::new()?;
    let dataset = backed(&store)?;
    dataset.add_graph(Graph::from_triples(g("g3"), [t("c")]))?;
    assert!(dataset.has_graph(&g("g3"))?);

    dataset.discard()?;
    assert!(!dataset.has_graph(&g("g3"))?);
    assert!(!dataset.graph_names()?.contains(&g("g3")));
    assert!(!dataset.contains_triple(&t("c"))?);
    assert!(!store.contains(&quad("g3", "c"))?);
    Ok(())
}

#[test]
fn discarding_a_removal_restores_an_empty_graph() -> Result<()> {
    let store = Store::new()?;
    let dataset = backed(&store)?;
    dataset.add_graph(Graph::from_triples(g("g1"), [t("a")]))?;
    dataset.flush()?;

    dataset.remove_graph(&g("g1"))?;
    dataset.discard()?;
    assert!(dataset.has_graph(&g("g1"))?);
    assert!(dataset.graph(&g("g1"))?.unwrap().is_empty()?);
    // the scheduled drop was abandoned, so the committed content survives in the store
    assert!(store.contains(&quad("g1", "a"))?);
    Ok(())
}

#[test]
fn discarding_a_modification_undoes_it() -> Result<()> {
    let dataset = open_dataset(&DatasetConfig::default())?;
    dataset.add_graph(Graph::from_triples(g("g1"), [t("a")]))?;
    dataset.flush()?;

    let graph = dataset.get_modifiable_graph(&g("g1"))?;
    graph.assert(t("b"))?;
    graph.retract(&t("a"))?;
    assert_eq!(graph.pending()?, 2);
    dataset.discard()?;

    let graph = dataset.graph(&g("g1"))?.unwrap();
    assert_eq!(graph.triples()?, vec![t("a")]);
    Ok(())
}

#[test]
fn clearing_the_unnamed_graph_keeps_it() -> Result<()> {
    let dataset = open_dataset(&DatasetConfig::default())?;
    dataset.add_graph(Graph::from_triples(GraphName::DefaultGraph, [t("a")]))?;
    dataset.flush()?;

    assert!(dataset.remove_graph(&GraphName::DefaultGraph)?);
    assert!(dataset.has_graph(&GraphName::DefaultGraph)?);
    assert!(dataset.graph(&GraphName::DefaultGraph)?.unwrap().is_empty()?);

    dataset.discard()?;
    assert_eq!(
        dataset.graph(&GraphName::DefaultGraph)?.unwrap().triples()?,
        vec![t("a")]
    );
    Ok(())
}

#[test]
fn quad_flavor_rolls_back_additions_and_removals() -> Result<()> {
    let dataset = open_dataset(&quad_config())?;
    dataset.add_graph(Graph::from_triples(g("g1"), [t("a")]))?;
    dataset.flush()?;

    dataset.add_graph(Graph::from_triples(g("g2"), [t("b")]))?;
    dataset.remove_graph(&g("g1"))?;
    assert!(!dataset.has_graph(&g("g1"))?);
    dataset.discard()?;

    assert!(!dataset.has_graph(&g("g2"))?);
    assert!(dataset.has_graph(&g("g1"))?);
    assert!(dataset.graph(&g("g1"))?.unwrap().is_empty()?);
    Ok(())
}

#[test]
fn quad_flavor_rolls_back_modifications() -> Result<()> {
    let dataset = QuadDataset::new(MemoryQuadStore::new()?, DefaultGraphMode::Union);
    dataset.add_graph(Graph::from_triples(g("g1"), [t("a")]))?;
    dataset.flush()?;

    let graph = dataset.get_modifiable_graph(&g("g1"))?;
    graph.assert(t("b"))?;
    assert!(dataset.contains_quad(&g("g1"), &t("b"))?);
    dataset.discard()?;
    assert!(!dataset.contains_quad(&g("g1"), &t("b"))?);
    assert!(dataset.contains_quad(&g("g1"), &t("a"))?);
    assert!(dataset.transaction_log().is_empty()?);
    Ok(())
}

#[test]
fn quad_flavor_fans_out_without_deduplicating() -> Result<()> {
    let dataset = QuadDataset::new(MemoryQuadStore::new()?, DefaultGraphMode::Union);
    dataset.add_graph(Graph::from_triples(g("g1"), [t("a")]))?;
    dataset.add_graph(Graph::from_triples(g("g2"), [t("a")]))?;
    dataset.flush()?;

    dataset.set_active_graphs(&[g("g1"), g("g2")])?;
    assert_eq!(dataset.triples()?.len(), 2);
    assert_eq!(
        dataset
            .triples_with_subject(&nn("http://example.com/a").into())?
            .len(),
        2
    );
    dataset.reset_active_graph()?;

    // the union default graph fans out the same way
    assert_eq!(dataset.triples()?.len(), 2);
    Ok(())
}

#[test]
fn graph_flavor_scan_visits_every_graph() -> Result<()> {
    let dataset = GraphDataset::new(MemoryGraphStore::new(), DefaultGraphMode::Union);
    dataset.add_graph(Graph::from_triples(g("g1"), [t("a")]))?;
    dataset.add_graph(Graph::from_triples(g("g2"), [t("a")]))?;
    dataset.flush()?;

    assert_eq!(dataset.triples()?.len(), 2);
    // an explicit multi-graph scope is merged into one graph
    dataset.set_active_graphs(&[g("g1"), g("g2")])?;
    assert_eq!(dataset.triples()?.len(), 1);
    dataset.reset_active_graph()?;
    Ok(())
}

#[test]
fn adding_to_an_existing_graph_merges() -> Result<()> {
    let dataset = GraphDataset::new(MemoryGraphStore::new(), DefaultGraphMode::Union);
    dataset.add_graph(Graph::from_triples(g("g1"), [t("a")]))?;
    dataset.flush()?;
    dataset.add_graph(Graph::from_triples(g("g1"), [t("b")]))?;
    assert_eq!(dataset.graph(&g("g1"))?.unwrap().len()?, 2);

    dataset.discard()?;
    assert_eq!(dataset.graph(&g("g1"))?.unwrap().triples()?, vec![t("a")]);
    assert!(dataset.transaction_log().is_empty()?);
    Ok(())
}

// g1 = {a} committed, then a pending edit, a removal and a fresh edit of g1
fn remove_then_edit(dataset: &dyn Dataset) -> Result<()> {
    dataset.add_graph(Graph::from_triples(g("g1"), [t("a")]))?;
    dataset.flush()?;

    assert!(dataset.get_modifiable_graph(&g("g1"))?.assert(t("b"))?);
    assert!(dataset.remove_graph(&g("g1"))?);
    assert!(!dataset.has_graph(&g("g1"))?);

    let fresh = dataset.get_modifiable_graph(&g("g1"))?;
    assert!(fresh.assert(t("y"))?);
    assert!(dataset.has_graph(&g("g1"))?);
    assert_eq!(dataset.graph(&g("g1"))?.unwrap().triples()?, vec![t("y")]);
    assert!(dataset.contains_triple(&t("y"))?);
    Ok(())
}

#[test]
fn graph_recreated_after_removal_is_live() -> Result<()> {
    for config in [DatasetConfig::default(), quad_config()] {
        let store = Store::new()?;
        let dataset = open_dataset_with_backing(&config, store.clone())?;
        remove_then_edit(&*dataset)?;

        dataset.flush()?;
        assert_eq!(dataset.graph(&g("g1"))?.unwrap().triples()?, vec![t("y")]);
        assert!(store.contains(&quad("g1", "y"))?);
        assert!(!store.contains(&quad("g1", "a"))?);
        assert!(!store.contains(&quad("g1", "b"))?);
    }
    Ok(())
}

#[test]
fn discarding_a_recreated_graph_leaves_it_empty() -> Result<()> {
    for config in [DatasetConfig::default(), quad_config()] {
        let dataset = open_dataset(&config)?;
        remove_then_edit(&*dataset)?;

        dataset.discard()?;
        assert!(dataset.has_graph(&g("g1"))?);
        assert!(dataset.graph(&g("g1"))?.unwrap().is_empty()?);
    }
    Ok(())
}

#[test]
fn quad_graph_views_see_later_writes() -> Result<()> {
    let dataset = QuadDataset::new(MemoryQuadStore::new()?, DefaultGraphMode::Union);
    dataset.add_graph(Graph::from_triples(g("g1"), [t("a")]))?;
    let view = dataset.graph(&g("g1"))?.unwrap();
    assert_eq!(view.len()?, 1);

    assert!(dataset.add_quad(&g("g1"), &t("b"))?);
    assert_eq!(view.len()?, 2);
    assert!(view.contains(&t("b"))?);
    assert!(dataset.remove_quad(&g("g1"), &t("a"))?);
    assert_eq!(view.triples()?, vec![t("b")]);
    Ok(())
}

#[test]
fn removing_the_fixed_default_graph_clears_it() -> Result<()> {
    let dataset = QuadDataset::new(MemoryQuadStore::new()?, DefaultGraphMode::Fixed(g("g1")));
    dataset.add_graph(Graph::from_triples(g("g1"), [t("a"), t("b")]))?;
    dataset.flush()?;
    assert!(dataset.is_default_graph(&g("g1")));

    assert!(dataset.remove_graph(&g("g1"))?);
    assert!(dataset.graph_names()?.contains(&g("g1")));
    assert!(dataset.graph(&g("g1"))?.unwrap().is_empty()?);
    assert!(dataset.triples()?.is_empty());

    dataset.discard()?;
    assert_eq!(dataset.graph(&g("g1"))?.unwrap().len()?, 2);
    Ok(())
}
