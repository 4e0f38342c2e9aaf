//! Scripted kpt runner for testing
//!
//! `MockRunner` records every invocation and imitates the side effects of
//! the kpt commands the deployer relies on: `pkg init` writes a minimal
//! Kptfile and `live init` registers an inventory in it, refusing to run
//! twice. Individual commands can be made to fail, or to block until the
//! invocation is cancelled.

use async_trait::async_trait;
use kptdeploy_core::{InventoryIntent, KPTFILE_NAME, Kptfile};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::runner::{CancelToken, CommandError, CommandKind, KptCommand, KptRunner};

/// Inventory ID `live init` assigns when none is requested
pub const GENERATED_INVENTORY_ID: &str = "mock-inventory-id";

/// Inventory name `live init` assigns when none is requested
pub const GENERATED_INVENTORY_NAME: &str = "inventory-mock";

/// In-memory kpt runner for testing
#[derive(Clone, Default)]
pub struct MockRunner {
    calls: Arc<Mutex<Vec<KptCommand>>>,
    failures: Arc<Mutex<HashMap<CommandKind, i32>>>,
    blocking: Arc<Mutex<HashSet<CommandKind>>>,
    source_output: Arc<Mutex<Vec<u8>>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every invocation of `kind` exit with `code`
    pub fn fail(self, kind: CommandKind, code: i32) -> Self {
        self.failures.lock().unwrap().insert(kind, code);
        self
    }

    /// Make every invocation of `kind` wait until it is cancelled
    pub fn block(self, kind: CommandKind) -> Self {
        self.blocking.lock().unwrap().insert(kind);
        self
    }

    /// Stdout printed by `kpt fn source`
    pub fn with_source_output(self, output: impl Into<Vec<u8>>) -> Self {
        *self.source_output.lock().unwrap() = output.into();
        self
    }

    /// All invocations so far
    pub fn calls(&self) -> Vec<KptCommand> {
        self.calls.lock().unwrap().clone()
    }

    /// Kinds of all invocations so far, in order
    pub fn kinds(&self) -> Vec<CommandKind> {
        self.calls().iter().map(KptCommand::kind).collect()
    }

    pub fn count(&self, kind: CommandKind) -> usize {
        self.calls().iter().filter(|c| c.kind() == kind).count()
    }

    async fn invoke(&self, command: &KptCommand, cancel: &CancelToken) -> Result<Vec<u8>, CommandError> {
        self.calls.lock().unwrap().push(command.clone());

        let rendered = command.to_string();
        let blocks = self.blocking.lock().unwrap().contains(&command.kind());
        if blocks {
            cancel.cancelled().await;
        }
        if cancel.is_cancelled() {
            return Err(CommandError::Cancelled { command: rendered });
        }

        let failure = self.failures.lock().unwrap().get(&command.kind()).copied();
        if let Some(code) = failure {
            return Err(CommandError::Exit {
                command: rendered,
                code: Some(code),
                stderr: format!("{} failed", command.kind()),
            });
        }

        match command.kind() {
            CommandKind::PkgInit => pkg_init(command),
            CommandKind::LiveInit => live_init(command),
            CommandKind::Source => Ok(self.source_output.lock().unwrap().clone()),
            CommandKind::LiveApply => Ok(b"inventory update started\nall resources applied\n".to_vec()),
            CommandKind::LiveDestroy => Ok(b"all resources deleted\n".to_vec()),
        }
    }
}

fn exit_error(command: &KptCommand, stderr: String) -> CommandError {
    CommandError::Exit {
        command: command.to_string(),
        code: Some(1),
        stderr,
    }
}

fn pkg_init(command: &KptCommand) -> Result<Vec<u8>, CommandError> {
    let path = command.dir().join(KPTFILE_NAME);
    if !path.exists() {
        let name = command
            .dir()
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "package".to_string());
        std::fs::write(
            &path,
            format!("apiVersion: kpt.dev/v1\nkind: Kptfile\nmetadata:\n  name: {}\n", name),
        )
        .map_err(|e| exit_error(command, e.to_string()))?;
    }
    Ok(format!("writing {}\n", path.display()).into_bytes())
}

fn live_init(command: &KptCommand) -> Result<Vec<u8>, CommandError> {
    let path = command.dir().join(KPTFILE_NAME);
    let mut kptfile = Kptfile::load(&path).map_err(|e| exit_error(command, e.to_string()))?;
    let existing = kptfile
        .inventory()
        .map_err(|e| exit_error(command, e.to_string()))?;
    if existing.is_some() && command.flag_value("--force") != Some("true") {
        return Err(exit_error(
            command,
            "inventory information already set for package".to_string(),
        ));
    }

    let intent = InventoryIntent::new(command.flag_value("--namespace").unwrap_or_default())
        .with_id(command.flag_value("--inventory-id").unwrap_or(GENERATED_INVENTORY_ID))
        .with_name(command.flag_value("--name").unwrap_or(GENERATED_INVENTORY_NAME));
    kptfile
        .apply_intent(&intent)
        .map_err(|e| exit_error(command, e.to_string()))?;
    kptfile
        .save(&path)
        .map_err(|e| exit_error(command, e.to_string()))?;

    Ok(format!(
        "initializing Kptfile inventory info (namespace: {})...success\n",
        intent.namespace
    )
    .into_bytes())
}

#[async_trait]
impl KptRunner for MockRunner {
    async fn run(
        &self,
        command: &KptCommand,
        cancel: &CancelToken,
        out: &mut (dyn Write + Send),
    ) -> Result<(), CommandError> {
        let printed = self.invoke(command, cancel).await?;
        out.write_all(&printed).map_err(|source| CommandError::Io {
            command: command.to_string(),
            source,
        })
    }

    async fn output(
        &self,
        command: &KptCommand,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, CommandError> {
        self.invoke(command, cancel).await
    }
}
