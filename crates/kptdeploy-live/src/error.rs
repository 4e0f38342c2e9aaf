//! Error types for kptdeploy-live

use std::path::{Path, PathBuf};
use thiserror::Error;

use kptdeploy_core::CoreError;

use crate::runner::CommandError;

/// Result type for kptdeploy-live operations
pub type Result<T> = std::result::Result<T, DeployError>;

/// Lifecycle stage an error is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Init,
    Collect,
    Apply,
    Destroy,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Collect => write!(f, "collect"),
            Self::Apply => write!(f, "apply"),
            Self::Destroy => write!(f, "destroy"),
        }
    }
}

/// Classification of a deploy failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// `kpt pkg init` failed
    Initialization,
    /// The Kptfile exists but cannot be read or parsed
    DescriptorCorrupt,
    /// `kpt live init` failed
    LiveInit,
    /// Patching the Kptfile failed
    Io,
    /// Reading hydrated manifests or their namespaces failed
    SourceCollection,
    /// `kpt live apply` failed
    LiveApply,
    /// `kpt live destroy` failed
    LiveDestroy,
}

/// Why manifest collection failed
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("cannot parse resource list: {0}")]
    Parse(#[source] CoreError),

    #[error("cannot read resource namespaces: {0}")]
    Namespaces(#[source] CoreError),
}

/// Errors that can occur while deploying or cleaning up a package
///
/// Every variant carries the package directory or Kptfile path.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeployError {
    /// `kpt pkg init` failed
    #[error("`kpt pkg init` failed for {}: {source}", .dir.display())]
    PkgInit {
        dir: PathBuf,
        #[source]
        source: CommandError,
    },

    /// Kptfile could not be read
    #[error("cannot open Kptfile {}: {source}", .path.display())]
    OpenDescriptor {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Kptfile is not a valid descriptor
    #[error("cannot parse Kptfile {}: {source}", .path.display())]
    DescriptorCorrupt {
        path: PathBuf,
        #[source]
        source: CoreError,
    },

    /// `kpt live init` failed
    #[error("`kpt live init` failed for {}: {source}", .dir.display())]
    LiveInit {
        dir: PathBuf,
        #[source]
        source: CommandError,
    },

    /// Patched Kptfile could not be written
    #[error("cannot update Kptfile {}: {source}", .path.display())]
    DescriptorWrite {
        path: PathBuf,
        #[source]
        source: CoreError,
    },

    /// Hydrated manifests could not be collected
    #[error("sourcing dir {} with kpt: {source}", .dir.display())]
    SourceCollection {
        dir: PathBuf,
        #[source]
        source: SourceError,
    },

    /// `kpt live apply` failed
    #[error("`kpt live apply` failed for {}: {source}", .dir.display())]
    LiveApply {
        dir: PathBuf,
        #[source]
        source: CommandError,
    },

    /// `kpt live destroy` failed
    #[error("`kpt live destroy` failed for {}: {source}", .dir.display())]
    LiveDestroy {
        dir: PathBuf,
        #[source]
        source: CommandError,
    },
}

impl DeployError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PkgInit { .. } => ErrorKind::Initialization,
            Self::OpenDescriptor { .. } | Self::DescriptorCorrupt { .. } => {
                ErrorKind::DescriptorCorrupt
            }
            Self::LiveInit { .. } => ErrorKind::LiveInit,
            Self::DescriptorWrite { .. } => ErrorKind::Io,
            Self::SourceCollection { .. } => ErrorKind::SourceCollection,
            Self::LiveApply { .. } => ErrorKind::LiveApply,
            Self::LiveDestroy { .. } => ErrorKind::LiveDestroy,
        }
    }

    pub fn phase(&self) -> Phase {
        match self.kind() {
            ErrorKind::Initialization
            | ErrorKind::DescriptorCorrupt
            | ErrorKind::LiveInit
            | ErrorKind::Io => Phase::Init,
            ErrorKind::SourceCollection => Phase::Collect,
            ErrorKind::LiveApply => Phase::Apply,
            ErrorKind::LiveDestroy => Phase::Destroy,
        }
    }

    /// Whether the failure stops the current operation
    pub fn is_fatal(&self) -> bool {
        self.kind() != ErrorKind::SourceCollection
    }

    /// Whether the failure came from cancelling a running command
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::PkgInit { source, .. }
            | Self::LiveInit { source, .. }
            | Self::LiveApply { source, .. }
            | Self::LiveDestroy { source, .. } => source.is_cancelled(),
            Self::SourceCollection {
                source: SourceError::Command(source),
                ..
            } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Package directory or Kptfile path the error refers to
    pub fn path(&self) -> &Path {
        match self {
            Self::PkgInit { dir, .. }
            | Self::LiveInit { dir, .. }
            | Self::SourceCollection { dir, .. }
            | Self::LiveApply { dir, .. }
            | Self::LiveDestroy { dir, .. } => dir,
            Self::OpenDescriptor { path, .. }
            | Self::DescriptorCorrupt { path, .. }
            | Self::DescriptorWrite { path, .. } => path,
        }
    }
}
