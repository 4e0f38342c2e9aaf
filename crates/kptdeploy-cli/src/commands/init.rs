//! Init command - make sure the package has a registered inventory

use console::style;
use kptdeploy_live::{InventoryOutcome, InventoryReconciler, KptCli};

use crate::commands::{GlobalOptions, cancel_on_interrupt};
use crate::error::Result;
use crate::settings::{PackageArgs, resolve};

/// Run the init command
pub async fn run(global: &GlobalOptions, args: &PackageArgs) -> Result<()> {
    let (package, intent) = resolve(&global.config, args, &[])?;
    let runner = KptCli::with_program(&global.kpt);
    let cancel = cancel_on_interrupt();

    println!(
        "{} Preparing inventory for {} in namespace {}",
        style("→").blue().bold(),
        style(package.apply_dir.display()).cyan(),
        style(&intent.namespace).yellow()
    );

    let outcome = InventoryReconciler::new(&runner)
        .ensure_inventory(&package, &intent, &cancel, &mut std::io::stdout())
        .await?;

    let summary = match outcome {
        InventoryOutcome::Registered {
            created_descriptor: true,
        } => "created Kptfile and registered inventory",
        InventoryOutcome::Registered {
            created_descriptor: false,
        } => "registered inventory",
        InventoryOutcome::Patched => "updated inventory in Kptfile",
        InventoryOutcome::Unchanged => "inventory already up to date",
    };
    println!("{} {}", style("✓").green().bold(), summary);

    Ok(())
}
