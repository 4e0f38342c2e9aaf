//! Deploy configuration file
//!
//! `kptdeploy.yaml` carries the kpt section of a deploy pipeline:
//!
//! ```yaml
//! dir: ./config
//! flags: ["--context", "kind-dev"]
//! applyFlags: ["--reconcile-timeout=2m"]
//! force: false
//! inventoryNamespace: apps
//! inventoryID: 9d2f6c1e
//! name: web
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::package::{InventoryOverrides, Package};

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "kptdeploy.yaml";

/// Deploy configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfig {
    /// Package directory (defaults to the working directory)
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Flags passed to every `kpt live` command
    #[serde(default)]
    pub flags: Vec<String>,

    /// Flags passed to `kpt live apply` only
    #[serde(default)]
    pub apply_flags: Vec<String>,

    /// Pass `--force true` to `kpt live init`
    #[serde(default)]
    pub force: bool,

    /// Inventory namespace
    #[serde(default)]
    pub inventory_namespace: Option<String>,

    /// Inventory ID
    #[serde(default, rename = "inventoryID")]
    pub inventory_id: Option<String>,

    /// Inventory name
    #[serde(default)]
    pub name: Option<String>,
}

impl DeployConfig {
    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| CoreError::InvalidConfig {
            message: format!("{}: {}", path.display(), e),
        })?;
        Ok(config)
    }

    /// Load configuration if the file exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Package described by this config, with `dir` resolved against `base`
    pub fn package(&self, base: &Path) -> Package {
        let apply_dir = match &self.dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => base.join(dir),
            None => base.to_path_buf(),
        };
        Package {
            apply_dir,
            flags: self.flags.clone(),
            apply_flags: self.apply_flags.clone(),
            force: self.force,
        }
    }

    /// Inventory settings as an override source
    pub fn inventory(&self) -> InventoryOverrides {
        InventoryOverrides {
            namespace: self.inventory_namespace.clone(),
            id: self.inventory_id.clone(),
            name: self.name.clone(),
        }
    }
}
