//! Hydrated manifest collection
//!
//! The manifests are only read to learn which namespaces and images a deploy
//! touches. `kpt live apply` reads the package on its own, so callers treat
//! failures here as informational.

use kptdeploy_core::ManifestList;
use std::path::Path;

use crate::error::{DeployError, Result, SourceError};
use crate::runner::{CancelToken, KptCommand, KptRunner};

/// Reads a package's hydrated manifests through `kpt fn source`
pub struct ManifestCollector<'a, R: ?Sized> {
    runner: &'a R,
}

impl<'a, R: KptRunner + ?Sized> ManifestCollector<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self { runner }
    }

    /// Source the package in `apply_dir` and split it into manifests
    pub async fn collect_manifests(
        &self,
        apply_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<ManifestList> {
        let source_err = |source: SourceError| DeployError::SourceCollection {
            dir: apply_dir.to_path_buf(),
            source,
        };

        let output = self
            .runner
            .output(&KptCommand::source(apply_dir), cancel)
            .await
            .map_err(|e| source_err(SourceError::Command(e)))?;

        let manifests = ManifestList::from_resource_list(&output)
            .map_err(|e| source_err(SourceError::Parse(e)))?;
        tracing::debug!(
            dir = %apply_dir.display(),
            count = manifests.len(),
            "read hydrated manifests"
        );
        Ok(manifests)
    }

    /// Namespaces targeted by `manifests`
    pub fn collect_namespaces(&self, apply_dir: &Path, manifests: &ManifestList) -> Result<Vec<String>> {
        manifests
            .collect_namespaces()
            .map_err(|e| DeployError::SourceCollection {
                dir: apply_dir.to_path_buf(),
                source: SourceError::Namespaces(e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::mock::MockRunner;
    use crate::runner::CommandKind;

    const SOURCE_OUTPUT: &str = r#"apiVersion: config.kubernetes.io/v1
kind: ResourceList
items:
- apiVersion: v1
  kind: ConfigMap
  metadata:
    name: one
    namespace: a
- apiVersion: v1
  kind: ConfigMap
  metadata:
    name: two
    namespace: b
- apiVersion: v1
  kind: Service
  metadata:
    name: three
    namespace: a
"#;

    #[tokio::test]
    async fn test_collect_manifests_and_namespaces() {
        let runner = MockRunner::new().with_source_output(SOURCE_OUTPUT);
        let collector = ManifestCollector::new(&runner);
        let dir = Path::new("/pkg");

        let manifests = collector.collect_manifests(dir, &CancelToken::new()).await.unwrap();
        assert_eq!(manifests.len(), 3);
        assert_eq!(runner.kinds(), vec![CommandKind::Source]);
        assert_eq!(runner.calls()[0].args(), vec!["fn", "source", "/pkg"]);

        let namespaces = collector.collect_namespaces(dir, &manifests).unwrap();
        assert_eq!(namespaces, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_empty_output_gives_empty_list() {
        let runner = MockRunner::new();
        let collector = ManifestCollector::new(&runner);

        let manifests = collector
            .collect_manifests(Path::new("/pkg"), &CancelToken::new())
            .await
            .unwrap();
        assert!(manifests.is_empty());
        assert!(collector.collect_namespaces(Path::new("/pkg"), &manifests).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_command_failure_is_source_collection_error() {
        let runner = MockRunner::new().fail(CommandKind::Source, 1);
        let err = ManifestCollector::new(&runner)
            .collect_manifests(Path::new("/pkg"), &CancelToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SourceCollection);
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_unparseable_output() {
        let runner = MockRunner::new().with_source_output("items: [unclosed");
        let err = ManifestCollector::new(&runner)
            .collect_manifests(Path::new("/pkg"), &CancelToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DeployError::SourceCollection { source: SourceError::Parse(_), .. }
        ));
    }
}
