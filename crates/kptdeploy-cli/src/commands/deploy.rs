//! Deploy command - apply a package to the cluster

use console::style;
use kptdeploy_core::Artifact;
use kptdeploy_live::{KptCli, KptDeployer};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::commands::{GlobalOptions, cancel_on_interrupt};
use crate::error::{CliError, Result};
use crate::settings::{PackageArgs, resolve};

/// Build output file, as written by `skaffold build --file-output`
#[derive(Debug, Deserialize)]
struct BuildArtifacts {
    #[serde(default)]
    builds: Vec<Artifact>,
}

/// Machine-readable deploy result
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeployReport {
    dir: String,
    namespaces: Vec<String>,
    tracked_tags: Vec<String>,
}

/// Collect artifacts from `--image` references and a build output file
pub fn load_artifacts(images: &[String], build_artifacts: Option<&Path>) -> Result<Vec<Artifact>> {
    let mut artifacts: Vec<Artifact> = images.iter().map(|i| Artifact::from_reference(i)).collect();
    if let Some(path) = build_artifacts {
        let content = std::fs::read_to_string(path)?;
        let file: BuildArtifacts = serde_json::from_str(&content)
            .map_err(|e| CliError::config(format!("{}: {}", path.display(), e)))?;
        artifacts.extend(file.builds);
    }
    Ok(artifacts)
}

/// Run the deploy command
pub async fn run(
    global: &GlobalOptions,
    args: &PackageArgs,
    apply_flags: &[String],
    images: &[String],
    build_artifacts: Option<&PathBuf>,
    json: bool,
) -> Result<()> {
    let (package, intent) = resolve(&global.config, args, apply_flags)?;
    let artifacts = load_artifacts(images, build_artifacts.map(PathBuf::as_path))?;
    let dir = package.apply_dir.display().to_string();

    if !json {
        println!(
            "{} Deploying {} (inventory namespace {})",
            style("→").blue().bold(),
            style(&dir).cyan(),
            style(&intent.namespace).yellow()
        );
    }

    let mut deployer = KptDeployer::new(package, intent, KptCli::with_program(&global.kpt));
    let cancel = cancel_on_interrupt();

    // kpt output goes to stderr when stdout carries the JSON report
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let out: &mut (dyn Write + Send) = if json { &mut stderr } else { &mut stdout };
    let namespaces = deployer.deploy(&cancel, out, &artifacts).await?;

    let report = DeployReport {
        dir,
        namespaces,
        tracked_tags: deployer.selector().tags().map(String::from).collect(),
    };

    if json {
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::internal(e.to_string()))?;
        println!("{}", rendered);
        return Ok(());
    }

    println!(
        "{} Successfully deployed {}",
        style("✓").green().bold(),
        style(&report.dir).cyan()
    );
    if report.namespaces.is_empty() {
        println!("  Namespaces: {}", style("unknown").dim());
    } else {
        println!("  Namespaces: {}", report.namespaces.join(", "));
    }
    for tag in &report.tracked_tags {
        println!("  Tracking image {}", style(tag).yellow());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_artifacts_from_images_and_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("build.json");
        std::fs::write(
            &path,
            r#"{"builds":[{"imageName":"gcr.io/proj/web","tag":"gcr.io/proj/web:abc"}]}"#,
        )
        .unwrap();

        let artifacts = load_artifacts(&["app:v1".to_string()], Some(&path)).unwrap();
        assert_eq!(
            artifacts,
            vec![
                Artifact::new("app", "app:v1"),
                Artifact::new("gcr.io/proj/web", "gcr.io/proj/web:abc"),
            ]
        );
    }

    #[test]
    fn test_invalid_build_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("build.json");
        std::fs::write(&path, "not json").unwrap();

        let err = load_artifacts(&[], Some(&path)).unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
    }
}
