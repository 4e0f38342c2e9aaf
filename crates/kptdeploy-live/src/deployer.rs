//! Lifecycle orchestration for a kpt package
//!
//! A deploy runs `Init → Collect → Apply → TrackArtifacts`; a cleanup runs
//! `Init → Destroy`. Stages run one after another and each blocks on its kpt
//! command. Init, apply and destroy failures abort the operation. Collect
//! failures are reported as events and the deploy carries on with whatever
//! namespaces it could derive.

use kptdeploy_core::{Artifact, InventoryIntent, ManifestList, Package};
use std::io::Write;
use std::path::PathBuf;

use crate::collector::ManifestCollector;
use crate::error::{DeployError, Phase, Result};
use crate::events::{DeployEvent, EventSink, TracingEvents};
use crate::inventory::{InventoryOutcome, InventoryReconciler};
use crate::runner::{CancelToken, KptCli, KptCommand, KptRunner};
use crate::selector::{ImageSelector, add_tags_to_selector};

/// Deploys and cleans up one kpt package
///
/// One deployer is built per package. It owns the image selector consulted
/// by log and port-forward collaborators after a deploy. Running two
/// operations on the same package directory at once is not supported.
pub struct KptDeployer<R = KptCli> {
    package: Package,
    intent: InventoryIntent,
    runner: R,
    events: Box<dyn EventSink>,
    selector: ImageSelector,
    deployed_images: Option<Vec<String>>,
    artifacts: Vec<Artifact>,
}

impl<R: KptRunner> KptDeployer<R> {
    pub fn new(package: Package, intent: InventoryIntent, runner: R) -> Self {
        Self {
            package,
            intent,
            runner,
            events: Box::new(TracingEvents),
            selector: ImageSelector::new(),
            deployed_images: None,
            artifacts: Vec::new(),
        }
    }

    /// Send non-fatal events to `events` instead of the log
    pub fn with_events(mut self, events: impl EventSink + 'static) -> Self {
        self.events = Box::new(events);
        self
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    pub fn intent(&self) -> &InventoryIntent {
        &self.intent
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Tags of the images deployed so far
    pub fn selector(&self) -> &ImageSelector {
        &self.selector
    }

    /// Artifacts registered by successful deploys
    pub fn registered_artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Files to watch for redeploys; kpt packages are re-read on every apply
    pub fn dependencies(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Deploy the package and return the namespaces its manifests target
    ///
    /// The namespace list is empty or partial when the manifests could not be
    /// read; callers should treat that as "scope unknown".
    pub async fn deploy(
        &mut self,
        cancel: &CancelToken,
        out: &mut (dyn Write + Send),
        artifacts: &[Artifact],
    ) -> Result<Vec<String>> {
        let dir = self.package.apply_dir.clone();

        tracing::debug!(phase = %Phase::Init, dir = %dir.display(), "deploy stage");
        self.ensure_inventory(cancel, out).await?;

        tracing::debug!(phase = %Phase::Collect, dir = %dir.display(), "deploy stage");
        let collector = ManifestCollector::new(&self.runner);
        let manifests = match collector.collect_manifests(&dir, cancel).await {
            Ok(manifests) => Some(manifests),
            Err(e) => {
                self.events.emit(DeployEvent::info(
                    Phase::Collect,
                    format!("could not read the hydrated manifest from {}: {}", dir.display(), e),
                ));
                None
            }
        };
        let namespaces = match &manifests {
            Some(manifests) => match collector.collect_namespaces(&dir, manifests) {
                Ok(namespaces) => namespaces,
                Err(e) => {
                    self.events.emit(DeployEvent::info(
                        Phase::Collect,
                        format!(
                            "could not fetch deployed resource namespace. This might cause port-forward and deploy health-check to fail: {}",
                            e
                        ),
                    ));
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        self.deployed_images = manifests.as_ref().map(ManifestList::collect_images);

        tracing::debug!(phase = %Phase::Apply, dir = %dir.display(), "deploy stage");
        self.runner
            .run(&KptCommand::live_apply(&self.package), cancel, out)
            .await
            .map_err(|source| DeployError::LiveApply {
                dir: dir.clone(),
                source,
            })?;

        self.track_build_artifacts(artifacts);
        tracing::info!(
            dir = %dir.display(),
            namespaces = namespaces.len(),
            "package deployed"
        );
        Ok(namespaces)
    }

    /// Delete everything the package inventory tracks
    pub async fn cleanup(&mut self, cancel: &CancelToken, out: &mut (dyn Write + Send)) -> Result<()> {
        let dir = self.package.apply_dir.clone();

        tracing::debug!(phase = %Phase::Init, dir = %dir.display(), "cleanup stage");
        self.ensure_inventory(cancel, out).await?;

        tracing::debug!(phase = %Phase::Destroy, dir = %dir.display(), "cleanup stage");
        self.runner
            .run(&KptCommand::live_destroy(&self.package), cancel, out)
            .await
            .map_err(|source| DeployError::LiveDestroy {
                dir: dir.clone(),
                source,
            })?;

        tracing::info!(dir = %dir.display(), "package destroyed");
        Ok(())
    }

    /// Register build artifacts so their tags resolve to the deployed pods
    pub fn track_build_artifacts(&mut self, artifacts: &[Artifact]) {
        add_tags_to_selector(artifacts, self.deployed_images.as_deref(), &mut self.selector);
        self.artifacts.extend(artifacts.iter().cloned());
    }

    async fn ensure_inventory(
        &self,
        cancel: &CancelToken,
        out: &mut (dyn Write + Send),
    ) -> Result<InventoryOutcome> {
        let outcome = InventoryReconciler::new(&self.runner)
            .ensure_inventory(&self.package, &self.intent, cancel, out)
            .await?;
        tracing::debug!(outcome = ?outcome, "inventory ready");
        Ok(outcome)
    }
}
