use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Where the binary finds its mesh and workload inventory.
///
/// The inventory is JSON (`{"meshes": [...], "workloads": [...]}`) rather
/// than part of the layered settings: tag names such as `kuma.io/service`
/// contain the `.` path separator of the settings loader.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct WorkloadsConfig {
    #[serde(default)]
    pub inventory_path: Option<String>,
}

impl WorkloadsConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.inventory_path {
            if !Path::new(path).is_file() {
                return Err(Error::InvalidConfig(format!(
                    "workloads.inventory_path {path} is not a file"
                )));
            }
        }
        Ok(())
    }
}
