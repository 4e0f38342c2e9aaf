//! Resolution of the package and inventory intent from config and flags

use clap::Args;
use kptdeploy_core::{DeployConfig, InventoryIntent, InventoryOverrides, Package};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Options shared by every command that touches a package
#[derive(Args, Debug, Clone, Default)]
pub struct PackageArgs {
    /// Package directory (overrides `dir` from the config file)
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Inventory namespace, used when the config file sets none
    #[arg(long, env = "KPTDEPLOY_INVENTORY_NAMESPACE")]
    pub inventory_namespace: Option<String>,

    /// Inventory ID, used when the config file sets none
    #[arg(long, env = "KPTDEPLOY_INVENTORY_ID")]
    pub inventory_id: Option<String>,

    /// Inventory name, used when the config file sets none
    #[arg(long, env = "KPTDEPLOY_INVENTORY_NAME")]
    pub inventory_name: Option<String>,

    /// Pass `--force true` to `kpt live init`
    #[arg(long)]
    pub force: bool,

    /// Extra argument for every `kpt live` command (repeatable)
    #[arg(long = "kpt-flag", value_name = "ARG", allow_hyphen_values = true)]
    pub flags: Vec<String>,
}

impl PackageArgs {
    fn inventory(&self) -> InventoryOverrides {
        InventoryOverrides {
            namespace: self.inventory_namespace.clone(),
            id: self.inventory_id.clone(),
            name: self.inventory_name.clone(),
        }
    }
}

/// Build the package and inventory intent for a command
///
/// The config file is optional. Inventory values from the config file win
/// over flags; flags are appended after the configured ones.
pub fn resolve(
    config_path: &Path,
    args: &PackageArgs,
    apply_flags: &[String],
) -> Result<(Package, InventoryIntent)> {
    let config = DeployConfig::load_or_default(config_path)?;
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut package = config.package(base);
    if let Some(dir) = &args.dir {
        package.apply_dir = dir.clone();
    }
    package.flags.extend(args.flags.iter().cloned());
    package.apply_flags.extend(apply_flags.iter().cloned());
    package.force |= args.force;

    let intent = InventoryIntent::resolve(&config.inventory(), &args.inventory());
    tracing::debug!(
        dir = %package.apply_dir.display(),
        namespace = %intent.namespace,
        "resolved package"
    );
    Ok((package, intent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_without_config() {
        let tmp = TempDir::new().unwrap();
        let args = PackageArgs {
            inventory_namespace: Some("apps".to_string()),
            flags: vec!["--context".to_string(), "kind".to_string()],
            ..Default::default()
        };

        let (package, intent) =
            resolve(&tmp.path().join("kptdeploy.yaml"), &args, &["--dry-run".to_string()]).unwrap();

        assert_eq!(package.apply_dir, tmp.path());
        assert_eq!(package.flags, vec!["--context", "kind"]);
        assert_eq!(package.apply_flags, vec!["--dry-run"]);
        assert_eq!(intent.namespace, "apps");
    }

    #[test]
    fn test_config_values_win_over_flags() {
        let tmp = TempDir::new().unwrap();
        let config = tmp.path().join("kptdeploy.yaml");
        std::fs::write(
            &config,
            "dir: pkg\nflags: [\"--context\", \"dev\"]\ninventoryNamespace: from-config\nforce: true\n",
        )
        .unwrap();
        let args = PackageArgs {
            inventory_namespace: Some("from-flag".to_string()),
            inventory_id: Some("abc".to_string()),
            flags: vec!["--verbose".to_string()],
            ..Default::default()
        };

        let (package, intent) = resolve(&config, &args, &[]).unwrap();

        assert_eq!(package.apply_dir, tmp.path().join("pkg"));
        assert_eq!(package.flags, vec!["--context", "dev", "--verbose"]);
        assert!(package.force);
        assert_eq!(intent.namespace, "from-config");
        assert_eq!(intent.id, "abc");
    }
}
