//! Cleanup command - delete everything a package deployed

use console::style;
use kptdeploy_live::{KptCli, KptDeployer};

use crate::commands::{GlobalOptions, cancel_on_interrupt};
use crate::error::Result;
use crate::settings::{PackageArgs, resolve};

/// Run the cleanup command
pub async fn run(global: &GlobalOptions, args: &PackageArgs) -> Result<()> {
    let (package, intent) = resolve(&global.config, args, &[])?;
    let dir = package.apply_dir.display().to_string();

    println!(
        "{} Destroying resources of {}",
        style("→").blue().bold(),
        style(&dir).cyan()
    );

    let mut deployer = KptDeployer::new(package, intent, KptCli::with_program(&global.kpt));
    deployer
        .cleanup(&cancel_on_interrupt(), &mut std::io::stdout())
        .await?;

    println!(
        "{} Successfully cleaned up {}",
        style("✓").green().bold(),
        style(&dir).cyan()
    );

    Ok(())
}
