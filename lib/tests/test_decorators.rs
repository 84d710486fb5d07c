use anyhow::Result;
use oxigraph::model::{GraphName, NamedNode, Triple};
use sparql_dataset::{
    Dataset, DatasetError, DefaultGraphMode, Graph, GraphDataset, ImmutableDataset,
    MemoryGraphStore, WrapperDataset,
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

fn base() -> Result<Arc<GraphDataset<MemoryGraphStore>>> {
    let dataset =
        GraphDataset::new(MemoryGraphStore::new(), DefaultGraphMode::Union).thread_safe(true);
    dataset.add_graph(Graph::from_triples(g("g1"), [t("a")]))?;
    dataset.flush()?;
    Ok(Arc::new(dataset))
}

#[test]
fn decorator_chain_shares_one_lock() -> Result<()> {
    let inner = base()?;
    let chain = WrapperDataset::new(ImmutableDataset::new(WrapperDataset::new(inner.clone())));
    let ours = chain.lock().unwrap();
    let theirs = inner.lock().unwrap();
    assert!(Arc::ptr_eq(&ours, &theirs));

    let unlocked = WrapperDataset::new(GraphDataset::new(
        MemoryGraphStore::new(),
        DefaultGraphMode::Union,
    ));
    assert!(unlocked.lock().is_none());
    Ok(())
}

#[test]
fn wrapper_forwards_mutations() -> Result<()> {
    let inner = base()?;
    let wrapper = WrapperDataset::new(inner.clone());
    wrapper.add_graph(Graph::from_triples(g("g2"), [t("b")]))?;
    wrapper.flush()?;
    assert!(inner.has_graph(&g("g2"))?);
    assert_eq!(wrapper.graph_count()?, inner.graph_count()?);
    Ok(())
}

#[test]
fn immutable_dataset_rejects_mutations() -> Result<()> {
    let inner = base()?;
    let frozen = ImmutableDataset::new(inner.clone());

    let err = frozen.add_graph(Graph::named(g("g2"))).unwrap_err();
    assert!(matches!(err, DatasetError::Immutable(_)));
    assert_eq!(err.to_string(), "This dataset is immutable");
    assert!(matches!(
        frozen.remove_graph(&g("g1")),
        Err(DatasetError::Immutable(_))
    ));
    assert!(matches!(
        frozen.get_modifiable_graph(&g("g1")),
        Err(DatasetError::Immutable(_))
    ));
    assert!(inner.has_graph(&g("g1"))?);
    assert!(!inner.has_graph(&g("g2"))?);
    Ok(())
}

#[test]
fn immutable_flush_and_discard_do_nothing() -> Result<()> {
    let inner = base()?;
    inner.add_graph(Graph::from_triples(g("g2"), [t("b")]))?;

    let frozen = ImmutableDataset::new(inner.clone());
    frozen.flush()?;
    frozen.discard()?;
    // the pending addition is still waiting on the inner dataset
    assert!(!inner.transaction_log().is_empty()?);
    inner.discard()?;
    assert!(!inner.has_graph(&g("g2"))?);
    Ok(())
}

#[test]
fn immutable_dataset_still_reads_and_scopes() -> Result<()> {
    let frozen = ImmutableDataset::new(base()?);
    frozen.set_active_graph(&g("g1"))?;
    assert_eq!(frozen.triples()?, vec![t("a")]);
    assert_eq!(frozen.active_graph_names()?, vec![g("g1")]);
    frozen.reset_active_graph()?;
    assert!(frozen.reset_active_graph().is_err());
    Ok(())
}
