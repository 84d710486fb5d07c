use anyhow::{anyhow, Result};

use std::io::BufReader;
use std::path::Path;

use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::{BlankNode, GraphName, NamedNode, Triple};

use log::debug;

use crate::graph::Graph;

/// Reserved spelling of the unnamed graph in configuration files and helpers.
pub const DEFAULT_GRAPH_LABEL: &str = "default";

/// Initializes logging from the `SPARQL_DATASET_LOG` environment variable.
///
/// When set, `RUST_LOG` is overwritten with its value so the usual
/// `env_logger::try_init()` picks it up. Must run before the logger is built.
pub fn init_logging() {
    if let Ok(log_level) = std::env::var("SPARQL_DATASET_LOG") {
        std::env::set_var("RUST_LOG", log_level);
    }
}

/// Parses a graph name: `default`, a `_:label` blank node, or an IRI with or
/// without angle brackets.
pub fn parse_graph_name(value: &str) -> Result<GraphName> {
    let value = value.trim();
    if value.eq_ignore_ascii_case(DEFAULT_GRAPH_LABEL) {
        return Ok(GraphName::DefaultGraph);
    }
    if let Some(label) = value.strip_prefix("_:") {
        let node = BlankNode::new(label).map_err(|e| anyhow!("Invalid blank node {value}: {e}"))?;
        return Ok(GraphName::BlankNode(node));
    }
    let iri = value
        .strip_prefix('<')
        .and_then(|v| v.strip_suffix('>'))
        .unwrap_or(value);
    let node = NamedNode::new(iri).map_err(|e| anyhow!("Invalid graph IRI {value}: {e}"))?;
    Ok(GraphName::NamedNode(node))
}

/// Inverse of [`parse_graph_name`]: bare IRI, `_:label`, or `default`.
pub fn format_graph_name(name: &GraphName) -> String {
    match name {
        GraphName::NamedNode(n) => n.as_str().to_string(),
        GraphName::BlankNode(b) => format!("_:{}", b.as_str()),
        GraphName::DefaultGraph => DEFAULT_GRAPH_LABEL.to_string(),
    }
}

/// Reads an RDF file into a [`Graph`] under `name`, guessing the syntax from the extension.
pub fn read_graph_file(file: &Path, name: GraphName) -> Result<Graph> {
    debug!("Reading graph {} from {}", name, file.display());
    let format = file
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| match ext {
            "ttl" | "n3" => Some(RdfFormat::Turtle),
            "nt" => Some(RdfFormat::NTriples),
            "xml" | "rdf" => Some(RdfFormat::RdfXml),
            _ => None,
        })
        .unwrap_or(RdfFormat::Turtle);
    let reader = BufReader::new(std::fs::File::open(file)?);
    let mut graph = Graph::named(name);
    for quad in RdfParser::from_format(format).for_reader(reader) {
        let quad = quad?;
        graph.assert(Triple::new(quad.subject, quad.predicate, quad.object));
    }
    Ok(graph)
}
