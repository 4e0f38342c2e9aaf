//! kptdeploy Core - Core types for deploying kpt packages
//!
//! This crate provides the foundational types used throughout kptdeploy:
//! - `Package`: The package directory and its pass-through options
//! - `InventoryIntent`: Caller intent for the package inventory
//! - `Kptfile`: The on-disk package descriptor, rewritten without losing fields
//! - `ManifestList`: Hydrated manifests and the namespaces they target
//! - `Artifact`: Built images tracked after a deploy
//! - `DeployConfig`: The deploy config file

pub mod artifact;
pub mod config;
pub mod error;
pub mod kptfile;
pub mod manifest;
pub mod package;

pub use artifact::{Artifact, image_name};
pub use config::{DEFAULT_CONFIG_FILE, DeployConfig};
pub use error::{CoreError, Result};
pub use kptfile::{InventoryMetadata, KPTFILE_NAME, Kptfile};
pub use manifest::ManifestList;
pub use package::{DEFAULT_NAMESPACE, InventoryIntent, InventoryOverrides, Package};
