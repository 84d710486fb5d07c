//! Defines the configuration of a dataset: which storage model backs it, what
//! its default graph means, how updates commit, and whether it exposes a lock.

use crate::options::{CommitMode, DefaultGraphMode, StorageKind};
use anyhow::Result;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::io::{BufReader, Write};
use std::path::Path;
use std::time::Duration;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, Builder)]
#[builder(default, setter(into))]
pub struct DatasetConfig {
    // graph-oriented or quad-oriented storage
    #[serde(default)]
    pub storage: StorageKind,
    // union of all graphs, or one fixed graph
    #[serde(default)]
    pub default_graph: DefaultGraphMode,
    // commit after every update command, or wait for an explicit flush
    #[serde(default)]
    pub commit: CommitMode,
    // expose a reader-writer lock for update consumers
    #[serde(default)]
    pub thread_safe: bool,
    // update execution budget in milliseconds
    #[serde(default)]
    pub update_timeout_ms: Option<u64>,
    // log every change made through a modifiable graph, even redundant ones
    #[serde(default)]
    pub always_queue_actions: bool,
}

impl DatasetConfig {
    pub fn builder() -> DatasetConfigBuilder {
        DatasetConfigBuilder::default()
    }

    pub fn update_timeout(&self) -> Option<Duration> {
        self.update_timeout_ms.map(Duration::from_millis)
    }

    pub fn save_to_file(&self, file: &Path) -> Result<()> {
        let config_str = serde_json::to_string_pretty(&self)?;
        let mut file = std::fs::File::create(file)?;
        file.write_all(config_str.as_bytes())?;
        Ok(())
    }

    pub fn from_file(file: &Path) -> Result<Self> {
        let file = std::fs::File::open(file)?;
        let reader = BufReader::new(file);
        let config: DatasetConfig = serde_json::from_reader(reader)?;
        Ok(config)
    }

    /// Prints out the current configuration in a clear and readable way for command line output.
    pub fn print(&self) {
        println!("Dataset configuration:");
        println!("  Storage: {:?}", self.storage);
        match self.default_graph.fixed_name() {
            Some(name) => println!("  Default Graph: {}", name),
            None => println!("  Default Graph: union of all graphs"),
        }
        println!("  Commit: {:?}", self.commit);
        println!("  Thread Safe: {}", self.thread_safe);
        match self.update_timeout_ms {
            Some(ms) => println!("  Update Timeout: {} ms", ms),
            None => println!("  Update Timeout: none"),
        }
        println!("  Always Queue Actions: {}", self.always_queue_actions);
    }
}
