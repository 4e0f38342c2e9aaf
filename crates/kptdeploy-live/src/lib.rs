//! kptdeploy Live - Lifecycle orchestration for kpt packages
//!
//! This crate provides:
//! - **Command Runner**: `kpt` invocations with streaming output and cancellation
//! - **Inventory Reconciliation**: Create, register or patch the package inventory
//! - **Manifest Collection**: Hydrated manifests and the namespaces they target
//! - **Deployer**: Deploy and cleanup pipelines with phase-tagged errors
//! - **Image Selector**: Tags of deployed artifacts for log and port-forward lookups
//! - **Events**: Side-channel for non-fatal failures

pub mod collector;
pub mod deployer;
pub mod error;
pub mod events;
pub mod inventory;
pub mod mock;
pub mod runner;
pub mod selector;

pub use collector::ManifestCollector;
pub use deployer::KptDeployer;
pub use error::{DeployError, ErrorKind, Phase, Result, SourceError};
pub use events::{DeployEvent, EventSink, RecordingEvents, TracingEvents};
pub use inventory::{DescriptorState, InventoryOutcome, InventoryReconciler};
pub use mock::MockRunner;
pub use runner::{CancelToken, CommandError, CommandKind, KPT_PROGRAM, KptCli, KptCommand, KptRunner};
pub use selector::{ImageSelector, add_tags_to_selector};
