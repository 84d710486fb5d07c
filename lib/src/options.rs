//! Shared option types that replace boolean flag parameters in the Rust API.

use crate::util::{format_graph_name, parse_graph_name};
use oxigraph::model::GraphName;
use serde::{Deserialize, Serialize};

/// Which storage model backs a dataset.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Whole named graphs held as materialized containers.
    #[default]
    Graph,
    /// A flat quad store with lazy per-graph views.
    Quad,
}

/// What "no explicit scope" means for reads.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DefaultGraphMode {
    /// Every graph in the dataset.
    #[default]
    Union,
    /// One designated graph, which need not exist yet.
    Fixed(
        #[serde(
            serialize_with = "graph_name_ser",
            deserialize_with = "graph_name_de"
        )]
        GraphName,
    ),
}

impl DefaultGraphMode {
    pub fn is_union(&self) -> bool {
        matches!(self, DefaultGraphMode::Union)
    }

    /// The designated default graph, if not in union mode.
    pub fn fixed_name(&self) -> Option<&GraphName> {
        match self {
            DefaultGraphMode::Union => None,
            DefaultGraphMode::Fixed(name) => Some(name),
        }
    }

    /// True for the unnamed graph and for the designated default graph.
    ///
    /// Removing such a graph clears it in place instead of deleting it.
    pub fn is_default_graph(&self, name: &GraphName) -> bool {
        name.is_default_graph() || self.fixed_name() == Some(name)
    }
}

impl From<bool> for DefaultGraphMode {
    /// `true` selects union mode, `false` fixes the default graph to the unnamed graph.
    fn from(value: bool) -> Self {
        if value {
            DefaultGraphMode::Union
        } else {
            DefaultGraphMode::Fixed(GraphName::DefaultGraph)
        }
    }
}

/// Whether an update session commits after every command or waits for an explicit flush.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommitMode {
    #[default]
    Auto,
    Explicit,
}

impl CommitMode {
    pub fn is_auto(self) -> bool {
        matches!(self, CommitMode::Auto)
    }
}

impl From<bool> for CommitMode {
    fn from(value: bool) -> Self {
        if value {
            CommitMode::Auto
        } else {
            CommitMode::Explicit
        }
    }
}

impl From<CommitMode> for bool {
    fn from(value: CommitMode) -> Self {
        value.is_auto()
    }
}

fn graph_name_ser<S>(name: &GraphName, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format_graph_name(name))
}

fn graph_name_de<'de, D>(deserializer: D) -> Result<GraphName, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    parse_graph_name(&value).map_err(serde::de::Error::custom)
}
