//! Package options and inventory intent

use std::path::{Path, PathBuf};

use crate::kptfile::KPTFILE_NAME;

/// Namespace used for the inventory object when none is requested
pub const DEFAULT_NAMESPACE: &str = "default";

/// A kpt package directory together with the caller's pass-through options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Package {
    /// Directory holding the Kptfile and the package resources
    pub apply_dir: PathBuf,

    /// Raw arguments forwarded to every `kpt live` invocation
    pub flags: Vec<String>,

    /// Arguments forwarded to `kpt live apply` only
    pub apply_flags: Vec<String>,

    /// Pass `--force true` to `kpt live init`
    pub force: bool,
}

impl Package {
    /// Create a package rooted at `apply_dir` with no extra flags
    pub fn new(apply_dir: impl Into<PathBuf>) -> Self {
        Self {
            apply_dir: apply_dir.into(),
            ..Default::default()
        }
    }

    /// Set the general flags
    pub fn with_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags = flags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the apply-only flags
    pub fn with_apply_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.apply_flags = flags.into_iter().map(Into::into).collect();
        self
    }

    /// Enable force mode
    pub fn with_force(mut self) -> Self {
        self.force = true;
        self
    }

    /// Path of the package descriptor
    pub fn descriptor_path(&self) -> PathBuf {
        self.apply_dir.join(KPTFILE_NAME)
    }

    pub fn dir(&self) -> &Path {
        &self.apply_dir
    }
}

/// What the caller wants the package inventory to look like
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryIntent {
    /// Namespace of the inventory object
    pub namespace: String,

    /// Inventory ID (empty = let kpt decide)
    pub id: String,

    /// Inventory name (empty = let kpt decide)
    pub name: String,
}

impl Default for InventoryIntent {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            id: String::new(),
            name: String::new(),
        }
    }
}

impl InventoryIntent {
    /// Intent targeting `namespace` with no explicit ID or name
    pub fn new(namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            namespace: if namespace.is_empty() {
                DEFAULT_NAMESPACE.to_string()
            } else {
                namespace
            },
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Whether the namespace is the well-known default
    pub fn has_default_namespace(&self) -> bool {
        self.namespace == DEFAULT_NAMESPACE
    }

    /// Resolve the intent from the deploy config and command-line options
    ///
    /// A value set in the deploy config wins. An unset config value falls back
    /// to the command-line option, and the namespace finally falls back to
    /// [`DEFAULT_NAMESPACE`].
    pub fn resolve(configured: &InventoryOverrides, options: &InventoryOverrides) -> Self {
        let pick = |cfg: &Option<String>, opt: &Option<String>| {
            non_empty(cfg)
                .or_else(|| non_empty(opt))
                .map(str::to_string)
        };

        Self {
            namespace: pick(&configured.namespace, &options.namespace)
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            id: pick(&configured.id, &options.id).unwrap_or_default(),
            name: pick(&configured.name, &options.name).unwrap_or_default(),
        }
    }
}

/// Optional inventory settings coming from one configuration source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryOverrides {
    pub namespace: Option<String>,
    pub id: Option<String>,
    pub name: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
