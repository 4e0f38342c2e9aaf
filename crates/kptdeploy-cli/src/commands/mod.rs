//! CLI commands

pub mod cleanup;
pub mod deploy;
pub mod init;

use kptdeploy_live::CancelToken;
use std::path::PathBuf;

/// Options that apply to every command
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    /// Deploy config file
    pub config: PathBuf,
    /// kpt binary
    pub kpt: PathBuf,
}

/// Cancellation token triggered by Ctrl-C
///
/// The running kpt process is killed and the command fails; nothing is
/// rolled back.
pub fn cancel_on_interrupt() -> CancelToken {
    let token = CancelToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping kpt");
            trigger.cancel();
        }
    });
    token
}
