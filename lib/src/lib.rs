//! Graph- and quad-oriented RDF datasets for query and update evaluators.
//!
//! A dataset answers triple-pattern lookups through a per-thread active/default
//! graph scope, and buffers graph-level mutations in an action log until they are
//! flushed (committed) or discarded (rolled back).
//!
//! ```
//! use sparql_dataset::{open_dataset, Dataset, DatasetConfig, Graph};
//! use oxigraph::model::{NamedNode, Triple};
//!
//! let dataset = open_dataset(&DatasetConfig::default()).unwrap();
//! let g = NamedNode::new("http://example.com/g").unwrap();
//! let t = Triple::new(
//!     NamedNode::new("http://example.com/a").unwrap(),
//!     NamedNode::new("http://example.com/p").unwrap(),
//!     NamedNode::new("http://example.com/b").unwrap(),
//! );
//! dataset.add_graph(Graph::from_triples(g.clone(), [t])).unwrap();
//! dataset.flush().unwrap();
//!
//! dataset.set_active_graph(&g.into()).unwrap();
//! assert_eq!(dataset.triples().unwrap().len(), 1);
//! dataset.reset_active_graph().unwrap();
//! ```

extern crate derive_builder;

pub mod config;
pub mod dataset;
pub mod errors;
pub mod graph;
pub mod graph_dataset;
pub mod memory;
pub mod options;
pub mod persistence;
pub mod quad_dataset;
pub mod scope;
pub mod transaction;
pub mod update;
pub mod util;
pub mod wrapper;

pub use config::DatasetConfig;
pub use dataset::{Dataset, DatasetLock};
pub use errors::{DatasetError, Result};
pub use graph::{Graph, GraphView, MutableGraph, TransactionalGraph, TriplePattern};
pub use graph_dataset::{GraphDataset, GraphStore};
pub use memory::{MemoryGraphStore, MemoryQuadStore};
pub use options::{CommitMode, DefaultGraphMode, StorageKind};
pub use quad_dataset::{QuadDataset, QuadStore};
pub use update::UpdateSession;
pub use wrapper::{ImmutableDataset, WrapperDataset};

use log::info;
use oxigraph::store::Store;
use std::sync::Arc;

/// Builds the dataset flavor `config` selects, backed by memory.
pub fn open_dataset(config: &DatasetConfig) -> Result<Arc<dyn Dataset>> {
    open(config, None)
}

/// Like [`open_dataset`], but a graph-oriented dataset loads `backing` and
/// writes flushed changes back into it. A quad-oriented dataset uses `backing`
/// directly as its quad store.
pub fn open_dataset_with_backing(config: &DatasetConfig, backing: Store) -> Result<Arc<dyn Dataset>> {
    open(config, Some(backing))
}

fn open(config: &DatasetConfig, backing: Option<Store>) -> Result<Arc<dyn Dataset>> {
    info!(
        "Opening {:?} dataset (union default graph: {})",
        config.storage,
        config.default_graph.is_union()
    );
    let mode = config.default_graph.clone();
    Ok(match config.storage {
        StorageKind::Graph => {
            let store = MemoryGraphStore::open(backing, config.always_queue_actions)?;
            Arc::new(GraphDataset::new(store, mode).thread_safe(config.thread_safe)) as Arc<dyn Dataset>
        }
        StorageKind::Quad => {
            let store = match backing {
                Some(store) => MemoryQuadStore::from_store(store),
                None => MemoryQuadStore::new()?,
            };
            Arc::new(
                QuadDataset::new(store, mode)
                    .thread_safe(config.thread_safe)
                    .always_queue(config.always_queue_actions),
            ) as Arc<dyn Dataset>
        }
    })
}

/// Opens an update session over `dataset` with the commit mode and time
/// budget `config` asks for.
pub fn open_session<D: Dataset>(dataset: D, config: &DatasetConfig) -> Result<UpdateSession<D>> {
    Ok(UpdateSession::new(dataset, config.commit)?.with_timeout(config.update_timeout()))
}
