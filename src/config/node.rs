//! Node storage configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Node storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Data directory holding the frontier, history and registry snapshots
    pub data_dir: PathBuf,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".searchonion"),
        }
    }
}
