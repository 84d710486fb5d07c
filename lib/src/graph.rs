//! The graph container and the "graph-like" access traits every dataset speaks.
//!
//! A [`Graph`] is a named, indexed set of triples. The [`GraphView`] trait is the
//! read contract shared by materialized graphs, shared in-memory graphs, lazy
//! quad-store views and union views, so the query side never needs to know which
//! one it was handed. [`MutableGraph`] adds assert/retract/clear, and
//! [`TransactionalGraph`] adds the per-graph flush/discard used by the dataset
//! action log.

use crate::errors::{DatasetError, Result};
use log::debug;
use oxigraph::model::{
    BlankNode, Graph as IndexedGraph, GraphName, NamedNode, NamedOrBlankNode, Term, Triple,
    TripleRef,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// The eight lookup shapes of a triple pattern, named by which positions are bound.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PatternShape {
    None,
    S,
    P,
    O,
    SP,
    SO,
    PO,
    SPO,
}

/// A triple pattern where `None` marks an unbound position.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
pub struct TriplePattern {
    pub subject: Option<NamedOrBlankNode>,
    pub predicate: Option<NamedNode>,
    pub object: Option<Term>,
}

impl TriplePattern {
    pub fn new(
        subject: Option<NamedOrBlankNode>,
        predicate: Option<NamedNode>,
        object: Option<Term>,
    ) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    pub fn any() -> Self {
        Self::default()
    }

    pub fn shape(&self) -> PatternShape {
        match (&self.subject, &self.predicate, &self.object) {
            (None, None, None) => PatternShape::None,
            (Some(_), None, None) => PatternShape::S,
            (None, Some(_), None) => PatternShape::P,
            (None, None, Some(_)) => PatternShape::O,
            (Some(_), Some(_), None) => PatternShape::SP,
            (Some(_), None, Some(_)) => PatternShape::SO,
            (None, Some(_), Some(_)) => PatternShape::PO,
            (Some(_), Some(_), Some(_)) => PatternShape::SPO,
        }
    }

    pub fn matches(&self, triple: &Triple) -> bool {
        self.subject.as_ref().map_or(true, |s| *s == triple.subject)
            && self.predicate.as_ref().map_or(true, |p| *p == triple.predicate)
            && self.object.as_ref().map_or(true, |o| *o == triple.object)
    }
}

/// Read access to something shaped like a graph.
///
/// Enumerations return snapshots taken at call time; an implementor that is a
/// view over live storage re-reads that storage on every call.
pub trait GraphView: Send + Sync {
    fn name(&self) -> GraphName;

    fn triples(&self) -> Result<Vec<Triple>>;

    fn contains(&self, triple: &Triple) -> Result<bool>;

    fn triples_with_subject(&self, subject: &NamedOrBlankNode) -> Result<Vec<Triple>>;

    fn triples_with_predicate(&self, predicate: &NamedNode) -> Result<Vec<Triple>>;

    fn triples_with_object(&self, object: &Term) -> Result<Vec<Triple>>;

    fn triples_with_subject_predicate(
        &self,
        subject: &NamedOrBlankNode,
        predicate: &NamedNode,
    ) -> Result<Vec<Triple>>;

    fn triples_with_subject_object(
        &self,
        subject: &NamedOrBlankNode,
        object: &Term,
    ) -> Result<Vec<Triple>>;

    fn triples_with_predicate_object(
        &self,
        predicate: &NamedNode,
        object: &Term,
    ) -> Result<Vec<Triple>>;

    fn len(&self) -> Result<usize> {
        Ok(self.triples()?.len())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Dispatches a pattern to the lookup matching its shape.
    fn triples_matching(&self, pattern: &TriplePattern) -> Result<Vec<Triple>> {
        match (&pattern.subject, &pattern.predicate, &pattern.object) {
            (None, None, None) => self.triples(),
            (Some(s), None, None) => self.triples_with_subject(s),
            (None, Some(p), None) => self.triples_with_predicate(p),
            (None, None, Some(o)) => self.triples_with_object(o),
            (Some(s), Some(p), None) => self.triples_with_subject_predicate(s, p),
            (Some(s), None, Some(o)) => self.triples_with_subject_object(s, o),
            (None, Some(p), Some(o)) => self.triples_with_predicate_object(p, o),
            (Some(s), Some(p), Some(o)) => {
                let triple = Triple::new(s.clone(), p.clone(), o.clone());
                Ok(if self.contains(&triple)? {
                    vec![triple]
                } else {
                    vec![]
                })
            }
        }
    }
}

/// A graph whose triples can be changed in place.
pub trait MutableGraph: GraphView {
    /// Adds a triple, returning true when it was not already present.
    fn assert(&self, triple: Triple) -> Result<bool>;

    /// Removes a triple, returning true when it was present.
    fn retract(&self, triple: &Triple) -> Result<bool>;

    fn clear(&self) -> Result<()>;

    fn assert_all(&self, triples: Vec<Triple>) -> Result<bool> {
        let mut asserted = false;
        for triple in triples {
            asserted = self.assert(triple)? || asserted;
        }
        Ok(asserted)
    }

    fn retract_all(&self, triples: &[Triple]) -> Result<bool> {
        let mut retracted = false;
        for triple in triples {
            retracted = self.retract(triple)? || retracted;
        }
        Ok(retracted)
    }

    /// Merges another graph into this one; see [`merged_triples`] for blank node handling.
    fn merge(&self, other: &dyn GraphView, allow_duplicate_names: bool) -> Result<()> {
        let this = self as *const _ as *const ();
        let that = other as *const _ as *const ();
        if std::ptr::eq(this, that) {
            return Err(DatasetError::SelfMerge);
        }
        let incoming = merged_triples(other.triples()?, self.is_empty()?, allow_duplicate_names);
        self.assert_all(incoming)?;
        Ok(())
    }
}

/// A mutable graph that buffers its changes until they are flushed or discarded.
pub trait TransactionalGraph: MutableGraph {
    /// Persists buffered changes.
    fn flush(&self) -> Result<()>;

    /// Reverts buffered changes.
    fn discard(&self) -> Result<()>;

    /// Number of buffered changes not yet flushed or discarded.
    fn pending(&self) -> Result<usize>;
}

/// Rewrites the blank nodes of `triples` for a merge.
///
/// Merging into an empty target copies labels verbatim. Otherwise each distinct
/// source blank node is replaced by one fresh node, unless `allow_duplicate_names`
/// is set, in which case labels are copied as-is and may coincide with existing ones.
pub fn merged_triples(
    triples: Vec<Triple>,
    target_is_empty: bool,
    allow_duplicate_names: bool,
) -> Vec<Triple> {
    if target_is_empty || allow_duplicate_names {
        return triples;
    }
    let mut mapping: HashMap<BlankNode, BlankNode> = HashMap::new();
    triples
        .into_iter()
        .map(|t| {
            let subject = match t.subject {
                NamedOrBlankNode::BlankNode(b) => {
                    NamedOrBlankNode::BlankNode(fresh_blank_node(b, &mut mapping))
                }
                other => other,
            };
            let object = match t.object {
                Term::BlankNode(b) => Term::BlankNode(fresh_blank_node(b, &mut mapping)),
                other => other,
            };
            Triple::new(subject, t.predicate, object)
        })
        .collect()
}

fn fresh_blank_node(node: BlankNode, mapping: &mut HashMap<BlankNode, BlankNode>) -> BlankNode {
    mapping.entry(node).or_default().clone()
}

/// A named, indexed set of triples.
#[derive(Debug, Clone)]
pub struct Graph {
    name: GraphName,
    triples: IndexedGraph,
}

impl Default for Graph {
    fn default() -> Self {
        Self::named(GraphName::DefaultGraph)
    }
}

impl Graph {
    /// Creates an empty unnamed graph.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<GraphName>) -> Self {
        Self {
            name: name.into(),
            triples: IndexedGraph::new(),
        }
    }

    pub fn from_triples(name: impl Into<GraphName>, triples: impl IntoIterator<Item = Triple>) -> Self {
        let mut graph = Self::named(name);
        for triple in triples {
            graph.assert(triple);
        }
        graph
    }

    pub fn name(&self) -> &GraphName {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<GraphName>) {
        self.name = name.into();
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = TripleRef<'_>> + '_ {
        self.triples.iter()
    }

    pub fn assert(&mut self, triple: Triple) -> bool {
        self.triples.insert(triple.as_ref())
    }

    pub fn assert_all(&mut self, triples: impl IntoIterator<Item = Triple>) -> bool {
        let mut asserted = false;
        for triple in triples {
            asserted = self.assert(triple) || asserted;
        }
        asserted
    }

    pub fn retract(&mut self, triple: &Triple) -> bool {
        self.triples.remove(triple.as_ref())
    }

    pub fn retract_all<'a>(&mut self, triples: impl IntoIterator<Item = &'a Triple>) -> bool {
        let mut retracted = false;
        for triple in triples {
            retracted = self.retract(triple) || retracted;
        }
        retracted
    }

    pub fn clear(&mut self) {
        self.triples.clear();
    }

    /// Merges the triples of `other` into this graph, keeping this graph's name.
    pub fn merge(&mut self, other: &dyn GraphView, allow_duplicate_names: bool) -> Result<()> {
        let incoming = merged_triples(other.triples()?, self.is_empty(), allow_duplicate_names);
        debug!("Merging {} triples into graph {}", incoming.len(), self.name);
        self.assert_all(incoming);
        Ok(())
    }

    fn collect<'a>(iter: impl Iterator<Item = TripleRef<'a>>) -> Vec<Triple> {
        iter.map(TripleRef::into_owned).collect()
    }
}

impl GraphView for Graph {
    fn name(&self) -> GraphName {
        self.name.clone()
    }

    fn triples(&self) -> Result<Vec<Triple>> {
        Ok(Self::collect(self.triples.iter()))
    }

    fn contains(&self, triple: &Triple) -> Result<bool> {
        Ok(self.triples.contains(triple.as_ref()))
    }

    fn triples_with_subject(&self, subject: &NamedOrBlankNode) -> Result<Vec<Triple>> {
        Ok(Self::collect(self.triples.triples_for_subject(subject.as_ref())))
    }

    fn triples_with_predicate(&self, predicate: &NamedNode) -> Result<Vec<Triple>> {
        Ok(Self::collect(
            self.triples.triples_for_predicate(predicate.as_ref()),
        ))
    }

    fn triples_with_object(&self, object: &Term) -> Result<Vec<Triple>> {
        Ok(Self::collect(self.triples.triples_for_object(object.as_ref())))
    }

    fn triples_with_subject_predicate(
        &self,
        subject: &NamedOrBlankNode,
        predicate: &NamedNode,
    ) -> Result<Vec<Triple>> {
        Ok(self
            .triples
            .objects_for_subject_predicate(subject.as_ref(), predicate.as_ref())
            .map(|o| Triple::new(subject.clone(), predicate.clone(), o.into_owned()))
            .collect())
    }

    fn triples_with_subject_object(
        &self,
        subject: &NamedOrBlankNode,
        object: &Term,
    ) -> Result<Vec<Triple>> {
        Ok(self
            .triples
            .predicates_for_subject_object(subject.as_ref(), object.as_ref())
            .map(|p| Triple::new(subject.clone(), p.into_owned(), object.clone()))
            .collect())
    }

    fn triples_with_predicate_object(
        &self,
        predicate: &NamedNode,
        object: &Term,
    ) -> Result<Vec<Triple>> {
        Ok(self
            .triples
            .subjects_for_predicate_object(predicate.as_ref(), object.as_ref())
            .map(|s| Triple::new(s.into_owned(), predicate.clone(), object.clone()))
            .collect())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.triples.len())
    }
}

/// A [`Graph`] behind a lock so it can be shared by a dataset and the handles it hands out.
#[derive(Debug, Default)]
pub struct SharedGraph {
    graph: RwLock<Graph>,
}

impl SharedGraph {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph: RwLock::new(graph),
        }
    }

    /// Runs `f` against the wrapped graph under the read lock.
    pub fn read<T>(&self, f: impl FnOnce(&Graph) -> T) -> Result<T> {
        let graph = self
            .graph
            .read()
            .map_err(|_| DatasetError::LockPoisoned("graph read lock"))?;
        Ok(f(&graph))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Graph) -> T) -> Result<T> {
        let mut graph = self
            .graph
            .write()
            .map_err(|_| DatasetError::LockPoisoned("graph write lock"))?;
        Ok(f(&mut graph))
    }

    /// Copies the current content out as a detached graph.
    pub fn snapshot(&self) -> Result<Graph> {
        self.read(|g| g.clone())
    }
}

impl GraphView for SharedGraph {
    fn name(&self) -> GraphName {
        self.read(|g| g.name().clone())
            .unwrap_or(GraphName::DefaultGraph)
    }

    fn triples(&self) -> Result<Vec<Triple>> {
        self.read(|g| GraphView::triples(g))?
    }

    fn contains(&self, triple: &Triple) -> Result<bool> {
        self.read(|g| g.contains(triple))
    }

    fn triples_with_subject(&self, subject: &NamedOrBlankNode) -> Result<Vec<Triple>> {
        self.read(|g| g.triples_with_subject(subject))?
    }

    fn triples_with_predicate(&self, predicate: &NamedNode) -> Result<Vec<Triple>> {
        self.read(|g| g.triples_with_predicate(predicate))?
    }

    fn triples_with_object(&self, object: &Term) -> Result<Vec<Triple>> {
        self.read(|g| g.triples_with_object(object))?
    }

    fn triples_with_subject_predicate(
        &self,
        subject: &NamedOrBlankNode,
        predicate: &NamedNode,
    ) -> Result<Vec<Triple>> {
        self.read(|g| g.triples_with_subject_predicate(subject, predicate))?
    }

    fn triples_with_subject_object(
        &self,
        subject: &NamedOrBlankNode,
        object: &Term,
    ) -> Result<Vec<Triple>> {
        self.read(|g| g.triples_with_subject_object(subject, object))?
    }

    fn triples_with_predicate_object(
        &self,
        predicate: &NamedNode,
        object: &Term,
    ) -> Result<Vec<Triple>> {
        self.read(|g| g.triples_with_predicate_object(predicate, object))?
    }

    fn len(&self) -> Result<usize> {
        self.read(|g| g.len())
    }
}

impl MutableGraph for SharedGraph {
    fn assert(&self, triple: Triple) -> Result<bool> {
        self.write(|g| g.assert(triple))
    }

    fn retract(&self, triple: &Triple) -> Result<bool> {
        self.write(|g| g.retract(triple))
    }

    fn clear(&self) -> Result<()> {
        self.write(|g| g.clear())
    }
}

/// A read-through union of several graph views.
///
/// Nothing is copied: every call fans out to the members and concatenates their
/// answers, so a triple present in two members is reported twice.
pub struct UnionView {
    name: GraphName,
    members: Vec<Arc<dyn GraphView>>,
}

impl UnionView {
    pub fn new(name: GraphName, members: Vec<Arc<dyn GraphView>>) -> Self {
        Self { name, members }
    }

    pub fn members(&self) -> &[Arc<dyn GraphView>] {
        &self.members
    }

    fn concat(&self, f: impl Fn(&dyn GraphView) -> Result<Vec<Triple>>) -> Result<Vec<Triple>> {
        let mut out = Vec::new();
        for member in &self.members {
            out.extend(f(member.as_ref())?);
        }
        Ok(out)
    }
}

impl GraphView for UnionView {
    fn name(&self) -> GraphName {
        self.name.clone()
    }

    fn triples(&self) -> Result<Vec<Triple>> {
        self.concat(|g| g.triples())
    }

    fn contains(&self, triple: &Triple) -> Result<bool> {
        for member in &self.members {
            if member.contains(triple)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn triples_with_subject(&self, subject: &NamedOrBlankNode) -> Result<Vec<Triple>> {
        self.concat(|g| g.triples_with_subject(subject))
    }

    fn triples_with_predicate(&self, predicate: &NamedNode) -> Result<Vec<Triple>> {
        self.concat(|g| g.triples_with_predicate(predicate))
    }

    fn triples_with_object(&self, object: &Term) -> Result<Vec<Triple>> {
        self.concat(|g| g.triples_with_object(object))
    }

    fn triples_with_subject_predicate(
        &self,
        subject: &NamedOrBlankNode,
        predicate: &NamedNode,
    ) -> Result<Vec<Triple>> {
        self.concat(|g| g.triples_with_subject_predicate(subject, predicate))
    }

    fn triples_with_subject_object(
        &self,
        subject: &NamedOrBlankNode,
        object: &Term,
    ) -> Result<Vec<Triple>> {
        self.concat(|g| g.triples_with_subject_object(subject, object))
    }

    fn triples_with_predicate_object(
        &self,
        predicate: &NamedNode,
        object: &Term,
    ) -> Result<Vec<Triple>> {
        self.concat(|g| g.triples_with_predicate_object(predicate, object))
    }

    fn len(&self) -> Result<usize> {
        let mut total = 0;
        for member in &self.members {
            total += member.len()?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxigraph::model::Literal;

    fn nn(iri: &str) -> NamedNode {
        NamedNode::new(iri).unwrap()
    }

    fn triple(s: &str, p: &str, o: &str) -> Triple {
        Triple::new(nn(s), nn(p), nn(o))
    }

    fn sample() -> Graph {
        Graph::from_triples(
            nn("http://example.com/g"),
            vec![
                triple("http://ex/a", "http://ex/p", "http://ex/b"),
                triple("http://ex/a", "http://ex/q", "http://ex/c"),
                triple("http://ex/d", "http://ex/p", "http://ex/b"),
            ],
        )
    }

    #[test]
    fn pattern_shapes_cover_all_eight_cases() {
        let s: Option<NamedOrBlankNode> = Some(nn("http://ex/a").into());
        let p = Some(nn("http://ex/p"));
        let o: Option<Term> = Some(nn("http://ex/b").into());
        assert_eq!(TriplePattern::any().shape(), PatternShape::None);
        assert_eq!(TriplePattern::new(s.clone(), None, None).shape(), PatternShape::S);
        assert_eq!(TriplePattern::new(None, p.clone(), None).shape(), PatternShape::P);
        assert_eq!(TriplePattern::new(None, None, o.clone()).shape(), PatternShape::O);
        assert_eq!(TriplePattern::new(s.clone(), p.clone(), None).shape(), PatternShape::SP);
        assert_eq!(TriplePattern::new(s.clone(), None, o.clone()).shape(), PatternShape::SO);
        assert_eq!(TriplePattern::new(None, p.clone(), o.clone()).shape(), PatternShape::PO);
        assert_eq!(TriplePattern::new(s, p, o).shape(), PatternShape::SPO);
    }

    #[test]
    fn lookups_agree_with_pattern_filter() {
        let g = sample();
        let all = GraphView::triples(&g).unwrap();
        let a: NamedOrBlankNode = nn("http://ex/a").into();
        let p = nn("http://ex/p");
        let b: Term = nn("http://ex/b").into();
        let patterns = vec![
            TriplePattern::any(),
            TriplePattern::new(Some(a.clone()), None, None),
            TriplePattern::new(None, Some(p.clone()), None),
            TriplePattern::new(None, None, Some(b.clone())),
            TriplePattern::new(Some(a.clone()), Some(p.clone()), None),
            TriplePattern::new(Some(a.clone()), None, Some(b.clone())),
            TriplePattern::new(None, Some(p.clone()), Some(b.clone())),
            TriplePattern::new(Some(a), Some(p), Some(b)),
        ];
        for pattern in patterns {
            let mut expected: Vec<Triple> =
                all.iter().filter(|t| pattern.matches(t)).cloned().collect();
            let mut found = g.triples_matching(&pattern).unwrap();
            expected.sort_by_key(|t| t.to_string());
            found.sort_by_key(|t| t.to_string());
            assert_eq!(found, expected, "pattern {:?}", pattern.shape());
        }
    }

    #[test]
    fn assert_and_retract_report_changes() {
        let mut g = Graph::new();
        let t = triple("http://ex/a", "http://ex/p", "http://ex/b");
        assert!(g.assert(t.clone()));
        assert!(!g.assert(t.clone()));
        assert_eq!(g.len(), 1);
        assert!(g.retract(&t));
        assert!(!g.retract(&t));
        assert!(g.is_empty());
    }

    #[test]
    fn merge_into_empty_graph_keeps_blank_nodes() {
        let b = BlankNode::new("b1").unwrap();
        let source = Graph::from_triples(
            GraphName::DefaultGraph,
            vec![Triple::new(b.clone(), nn("http://ex/p"), Literal::new_simple_literal("x"))],
        );
        let mut target = Graph::named(nn("http://ex/target"));
        target.merge(&source, false).unwrap();
        assert_eq!(target.len(), 1);
        assert_eq!(target.name(), &GraphName::NamedNode(nn("http://ex/target")));
        let t = GraphView::triples(&target).unwrap().pop().unwrap();
        assert_eq!(t.subject, NamedOrBlankNode::BlankNode(b));
    }

    #[test]
    fn merge_into_non_empty_graph_relabels_blank_nodes() {
        let b = BlankNode::new("b1").unwrap();
        let bt = Triple::new(b.clone(), nn("http://ex/p"), nn("http://ex/o"));
        let source = Graph::from_triples(GraphName::DefaultGraph, vec![bt.clone()]);

        let mut target = Graph::from_triples(GraphName::DefaultGraph, vec![bt.clone()]);
        target.merge(&source, false).unwrap();
        assert_eq!(target.len(), 2, "merged blank node must not collide");

        let mut shared = Graph::from_triples(GraphName::DefaultGraph, vec![bt.clone()]);
        shared.merge(&source, true).unwrap();
        assert_eq!(shared.len(), 1, "duplicate labels are allowed to coincide");
    }

    #[test]
    fn shared_graph_rejects_self_merge() {
        let shared = SharedGraph::new(sample());
        let err = MutableGraph::merge(&shared, &shared, false).unwrap_err();
        assert!(matches!(err, DatasetError::SelfMerge));
    }

    #[test]
    fn union_view_concatenates_members() {
        let g1: Arc<dyn GraphView> = Arc::new(sample());
        let g2: Arc<dyn GraphView> = Arc::new(sample());
        let union = UnionView::new(GraphName::DefaultGraph, vec![g1, g2]);
        assert_eq!(union.triples().unwrap().len(), 6);
        assert_eq!(union.len().unwrap(), 6);
        assert!(union
            .contains(&triple("http://ex/d", "http://ex/p", "http://ex/b"))
            .unwrap());
    }
}
