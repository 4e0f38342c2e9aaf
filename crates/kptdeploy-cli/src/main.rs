//! kptdeploy CLI - Deploy and tear down kpt packages as a single unit

use clap::{Parser, Subcommand};
use kptdeploy_core::DEFAULT_CONFIG_FILE;
use kptdeploy_live::KPT_PROGRAM;
use std::path::PathBuf;

mod commands;
mod error;
mod exit_codes;
mod settings;

use commands::GlobalOptions;
use settings::PackageArgs;

#[derive(Parser)]
#[command(name = "kptdeploy")]
#[command(author = "kptdeploy Contributors")]
#[command(version)]
#[command(about = "Deploy and tear down kpt packages as a single unit", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Deploy config file
    #[arg(long, global = true, env = "KPTDEPLOY_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// kpt binary to run
    #[arg(long, global = true, env = "KPT_BIN", default_value = KPT_PROGRAM)]
    kpt: PathBuf,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Register the inventory and apply the package
    Deploy {
        #[command(flatten)]
        package: PackageArgs,

        /// Extra argument for `kpt live apply` only (repeatable)
        #[arg(long = "apply-flag", value_name = "ARG", allow_hyphen_values = true)]
        apply_flags: Vec<String>,

        /// Pre-built image reference to track (repeatable)
        #[arg(short = 'i', long = "image")]
        images: Vec<String>,

        /// JSON build output listing the artifacts to track
        #[arg(long)]
        build_artifacts: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete every resource tracked by the package inventory
    Cleanup {
        #[command(flatten)]
        package: PackageArgs,
    },

    /// Create or update the package inventory without deploying
    Init {
        #[command(flatten)]
        package: PackageArgs,
    },
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("KPTDEPLOY_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

async fn run(cli: Cli) -> error::Result<()> {
    let global = GlobalOptions {
        config: cli.config,
        kpt: cli.kpt,
    };

    match cli.command {
        Commands::Deploy {
            package,
            apply_flags,
            images,
            build_artifacts,
            json,
        } => {
            commands::deploy::run(
                &global,
                &package,
                &apply_flags,
                &images,
                build_artifacts.as_ref(),
                json,
            )
            .await
        }

        Commands::Cleanup { package } => commands::cleanup::run(&global, &package).await,

        Commands::Init { package } => commands::init::run(&global, &package).await,
    }
}

#[tokio::main]
async fn main() {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
