//! Inventory reconciliation
//!
//! Before `kpt live apply` or `kpt live destroy` can run, the package must
//! have a Kptfile with inventory metadata matching the caller's intent. The
//! Kptfile is in one of three states, each handled differently:
//!
//! - **Missing**: `kpt pkg init` creates it, then it is treated as uninitialized.
//! - **Uninitialized**: `kpt live init` registers a new inventory. This is the
//!   only way to create one, since kpt owns the cluster-side registration.
//! - **Initialized**: `kpt live init` would refuse to run again, so the
//!   namespace, name and ID are patched directly in the file.

use kptdeploy_core::{InventoryIntent, InventoryMetadata, Kptfile, Package};
use std::io::Write;
use std::path::Path;

use crate::error::{DeployError, Result};
use crate::runner::{CancelToken, KptCommand, KptRunner};

/// State of the package descriptor on disk
#[derive(Debug, Clone, PartialEq)]
pub enum DescriptorState {
    /// No Kptfile
    Missing,
    /// Kptfile without inventory metadata
    Uninitialized(Kptfile),
    /// Kptfile with inventory metadata
    Initialized {
        kptfile: Kptfile,
        inventory: InventoryMetadata,
    },
}

impl DescriptorState {
    /// Read the Kptfile at `path` and classify it
    pub fn inspect(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::Missing),
            Err(source) => {
                return Err(DeployError::OpenDescriptor {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let corrupt = |source| DeployError::DescriptorCorrupt {
            path: path.to_path_buf(),
            source,
        };
        let kptfile = Kptfile::parse(&content).map_err(corrupt)?;
        match kptfile.inventory().map_err(corrupt)? {
            Some(inventory) => Ok(Self::Initialized { kptfile, inventory }),
            None => Ok(Self::Uninitialized(kptfile)),
        }
    }
}

/// What [`InventoryReconciler::ensure_inventory`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryOutcome {
    /// `kpt live init` registered a new inventory
    Registered {
        /// `kpt pkg init` had to create the Kptfile first
        created_descriptor: bool,
    },
    /// Existing inventory fields were rewritten
    Patched,
    /// Existing inventory already matched the intent
    Unchanged,
}

/// Makes sure a package has inventory metadata matching the caller's intent
pub struct InventoryReconciler<'a, R: ?Sized> {
    runner: &'a R,
}

impl<'a, R: KptRunner + ?Sized> InventoryReconciler<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self { runner }
    }

    /// Create, register or patch the package inventory
    ///
    /// Every failure is fatal for the calling operation; nothing is retried.
    pub async fn ensure_inventory(
        &self,
        package: &Package,
        intent: &InventoryIntent,
        cancel: &CancelToken,
        out: &mut (dyn Write + Send),
    ) -> Result<InventoryOutcome> {
        let path = package.descriptor_path();

        let (state, created_descriptor) = match DescriptorState::inspect(&path)? {
            DescriptorState::Missing => {
                tracing::info!(dir = %package.dir().display(), "creating Kptfile");
                self.runner
                    .run(&KptCommand::pkg_init(package.dir()), cancel, out)
                    .await
                    .map_err(|source| DeployError::PkgInit {
                        dir: package.apply_dir.clone(),
                        source,
                    })?;
                (DescriptorState::inspect(&path)?, true)
            }
            state => (state, false),
        };

        match state {
            DescriptorState::Missing => Err(DeployError::OpenDescriptor {
                path,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "`kpt pkg init` did not create a Kptfile",
                ),
            }),
            DescriptorState::Uninitialized(_) => {
                tracing::info!(
                    dir = %package.dir().display(),
                    namespace = %intent.namespace,
                    "registering package inventory"
                );
                self.runner
                    .run(&KptCommand::live_init(package, intent), cancel, out)
                    .await
                    .map_err(|source| DeployError::LiveInit {
                        dir: package.apply_dir.clone(),
                        source,
                    })?;
                Ok(InventoryOutcome::Registered { created_descriptor })
            }
            DescriptorState::Initialized { mut kptfile, inventory } => {
                let changed = kptfile.apply_intent(intent).map_err(|source| {
                    DeployError::DescriptorWrite {
                        path: path.clone(),
                        source,
                    }
                })?;
                if !changed {
                    tracing::debug!(path = %path.display(), "inventory already up to date");
                    return Ok(InventoryOutcome::Unchanged);
                }
                tracing::info!(
                    path = %path.display(),
                    from = %inventory.namespace,
                    to = %intent.namespace,
                    "updating inventory in Kptfile"
                );
                kptfile
                    .save(&path)
                    .map_err(|source| DeployError::DescriptorWrite { path, source })?;
                Ok(InventoryOutcome::Patched)
            }
        }
    }
}
