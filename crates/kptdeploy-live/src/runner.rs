//! External `kpt` command execution
//!
//! Every stage of a deploy shells out to the kpt CLI. [`KptCommand`] renders
//! the exact argument list for each invocation and [`KptRunner`] executes
//! it. Runs are blocking from the caller's point of view and honor a
//! [`CancelToken`]: a cancelled command has its process killed and reports
//! [`CommandError::Cancelled`]. Nothing here retries.

use async_trait::async_trait;
use kptdeploy_core::{InventoryIntent, Package};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::watch;

/// Default program name of the kpt CLI
pub const KPT_PROGRAM: &str = "kpt";

/// Bytes of stderr kept for error reports
const STDERR_TAIL: usize = 4096;

/// Which kpt subcommand an invocation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    PkgInit,
    LiveInit,
    Source,
    LiveApply,
    LiveDestroy,
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PkgInit => write!(f, "kpt pkg init"),
            Self::LiveInit => write!(f, "kpt live init"),
            Self::Source => write!(f, "kpt fn source"),
            Self::LiveApply => write!(f, "kpt live apply"),
            Self::LiveDestroy => write!(f, "kpt live destroy"),
        }
    }
}

/// A single kpt invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KptCommand {
    kind: CommandKind,
    dir: PathBuf,
    extra: Vec<String>,
}

impl KptCommand {
    /// `kpt pkg init DIR`
    pub fn pkg_init(dir: &Path) -> Self {
        Self::plain(CommandKind::PkgInit, dir)
    }

    /// `kpt fn source DIR`
    pub fn source(dir: &Path) -> Self {
        Self::plain(CommandKind::Source, dir)
    }

    /// `kpt live init DIR FLAGS... [--name N] [--inventory-id I] [--namespace NS] [--force true]`
    ///
    /// `--namespace` is only passed for a non-default namespace.
    pub fn live_init(package: &Package, intent: &InventoryIntent) -> Self {
        let mut extra = package.flags.clone();
        if !intent.name.is_empty() {
            extra.extend(["--name".to_string(), intent.name.clone()]);
        }
        if !intent.id.is_empty() {
            extra.extend(["--inventory-id".to_string(), intent.id.clone()]);
        }
        if !intent.has_default_namespace() {
            extra.extend(["--namespace".to_string(), intent.namespace.clone()]);
        }
        if package.force {
            extra.extend(["--force".to_string(), "true".to_string()]);
        }
        Self {
            kind: CommandKind::LiveInit,
            dir: package.apply_dir.clone(),
            extra,
        }
    }

    /// `kpt live apply DIR FLAGS... APPLY_FLAGS...`
    ///
    /// Apply flags come last so they can override general flags.
    pub fn live_apply(package: &Package) -> Self {
        let mut extra = package.flags.clone();
        extra.extend(package.apply_flags.iter().cloned());
        Self {
            kind: CommandKind::LiveApply,
            dir: package.apply_dir.clone(),
            extra,
        }
    }

    /// `kpt live destroy DIR FLAGS...`
    pub fn live_destroy(package: &Package) -> Self {
        Self {
            kind: CommandKind::LiveDestroy,
            dir: package.apply_dir.clone(),
            extra: package.flags.clone(),
        }
    }

    fn plain(kind: CommandKind, dir: &Path) -> Self {
        Self {
            kind,
            dir: dir.to_path_buf(),
            extra: Vec::new(),
        }
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Arguments after the program name
    pub fn args(&self) -> Vec<String> {
        let (group, verb) = match self.kind {
            CommandKind::PkgInit => ("pkg", "init"),
            CommandKind::LiveInit => ("live", "init"),
            CommandKind::Source => ("fn", "source"),
            CommandKind::LiveApply => ("live", "apply"),
            CommandKind::LiveDestroy => ("live", "destroy"),
        };
        let mut args = vec![
            group.to_string(),
            verb.to_string(),
            self.dir.display().to_string(),
        ];
        args.extend(self.extra.iter().cloned());
        args
    }

    /// Value following `flag` in the argument list
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.extra
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.extra.get(i + 1))
            .map(String::as_str)
    }
}

impl std::fmt::Display for KptCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", KPT_PROGRAM, self.args().join(" "))
    }
}

/// Cancellation signal shared between a caller and running commands
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    /// Request cancellation of every command observing this token
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Failure of a single kpt invocation
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` {}{}", exit_label(.code), stderr_suffix(.stderr))]
    Exit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("`{command}` was cancelled")]
    Cancelled { command: String },

    #[error("I/O error while running `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl CommandError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Exit code, when the process ran to completion
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exit { code, .. } => *code,
            _ => None,
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {}", code),
        None => "was terminated by a signal".to_string(),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {}", stderr)
    }
}

/// Executes kpt commands
///
/// Implementations must be Send + Sync so a deployer can be driven from any
/// task.
#[async_trait]
pub trait KptRunner: Send + Sync {
    /// Run a command, streaming its stdout and stderr into `out`
    async fn run(
        &self,
        command: &KptCommand,
        cancel: &CancelToken,
        out: &mut (dyn Write + Send),
    ) -> Result<(), CommandError>;

    /// Run a command and capture its stdout
    async fn output(
        &self,
        command: &KptCommand,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, CommandError>;
}

/// Runner backed by the real kpt binary
#[derive(Debug, Clone)]
pub struct KptCli {
    program: PathBuf,
}

impl KptCli {
    /// Use `kpt` from `PATH`
    pub fn new() -> Self {
        Self {
            program: PathBuf::from(KPT_PROGRAM),
        }
    }

    /// Use a specific kpt binary
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    async fn execute(
        &self,
        command: &KptCommand,
        cancel: &CancelToken,
        sink: &mut (dyn Write + Send),
        forward_stderr: bool,
    ) -> Result<(), CommandError> {
        let rendered = command.to_string();
        if cancel.is_cancelled() {
            return Err(CommandError::Cancelled { command: rendered });
        }
        tracing::debug!(command = %rendered, "running kpt");

        let mut child = tokio::process::Command::new(&self.program)
            .args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                command: rendered.clone(),
                source,
            })?;

        let io_err = |source: std::io::Error| CommandError::Io {
            command: rendered.clone(),
            source,
        };

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let mut stdout_open = stdout.is_some();
        let mut stderr_open = stderr.is_some();
        let mut out_buf = vec![0u8; 8192];
        let mut err_buf = vec![0u8; 8192];
        let mut stderr_tail = Vec::new();

        while stdout_open || stderr_open {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = child.kill().await;
                    return Err(CommandError::Cancelled { command: rendered.clone() });
                }
                read = read_chunk(&mut stdout, &mut out_buf), if stdout_open => {
                    match read.map_err(io_err)? {
                        0 => stdout_open = false,
                        n => sink.write_all(&out_buf[..n]).map_err(io_err)?,
                    }
                }
                read = read_chunk(&mut stderr, &mut err_buf), if stderr_open => {
                    match read.map_err(io_err)? {
                        0 => stderr_open = false,
                        n => {
                            if forward_stderr {
                                sink.write_all(&err_buf[..n]).map_err(io_err)?;
                            }
                            keep_tail(&mut stderr_tail, &err_buf[..n]);
                        }
                    }
                }
            }
        }

        let status = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(CommandError::Cancelled { command: rendered.clone() });
            }
            status = child.wait() => status.map_err(io_err)?,
        };
        sink.flush().map_err(io_err)?;

        if status.success() {
            Ok(())
        } else {
            Err(CommandError::Exit {
                command: rendered,
                code: status.code(),
                stderr: String::from_utf8_lossy(&stderr_tail).trim().to_string(),
            })
        }
    }
}

impl Default for KptCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KptRunner for KptCli {
    async fn run(
        &self,
        command: &KptCommand,
        cancel: &CancelToken,
        out: &mut (dyn Write + Send),
    ) -> Result<(), CommandError> {
        self.execute(command, cancel, out, true).await
    }

    async fn output(
        &self,
        command: &KptCommand,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, CommandError> {
        let mut buf = Vec::new();
        self.execute(command, cancel, &mut buf, false).await?;
        Ok(buf)
    }
}

async fn read_chunk<R: AsyncRead + Unpin>(
    pipe: &mut Option<R>,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    match pipe {
        Some(pipe) => pipe.read(buf).await,
        None => Ok(0),
    }
}

fn keep_tail(tail: &mut Vec<u8>, chunk: &[u8]) {
    tail.extend_from_slice(chunk);
    if tail.len() > STDERR_TAIL {
        let excess = tail.len() - STDERR_TAIL;
        tail.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package() -> Package {
        Package::new("/pkg").with_flags(["--context", "kind"])
    }

    #[test]
    fn test_live_init_without_optional_flags() {
        let cmd = KptCommand::live_init(&Package::new("/pkg"), &InventoryIntent::default());
        assert_eq!(cmd.args(), vec!["live", "init", "/pkg"]);
    }

    #[test]
    fn test_live_init_with_all_flags() {
        let intent = InventoryIntent::new("custom-ns").with_id("abc").with_name("foo");
        let cmd = KptCommand::live_init(&package().with_force(), &intent);
        assert_eq!(
            cmd.args(),
            vec![
                "live", "init", "/pkg", "--context", "kind", "--name", "foo",
                "--inventory-id", "abc", "--namespace", "custom-ns", "--force", "true",
            ]
        );
        assert_eq!(cmd.flag_value("--namespace"), Some("custom-ns"));
        assert_eq!(cmd.flag_value("--missing"), None);
    }

    #[test]
    fn test_live_apply_puts_apply_flags_last() {
        let pkg = package().with_apply_flags(["--context", "prod"]);
        let cmd = KptCommand::live_apply(&pkg);
        assert_eq!(
            cmd.args(),
            vec!["live", "apply", "/pkg", "--context", "kind", "--context", "prod"]
        );
    }

    #[test]
    fn test_live_destroy_ignores_apply_flags() {
        let pkg = package().with_apply_flags(["--dry-run"]);
        let cmd = KptCommand::live_destroy(&pkg);
        assert_eq!(cmd.to_string(), "kpt live destroy /pkg --context kind");
    }

    #[test]
    fn test_command_error_messages() {
        let err = CommandError::Exit {
            command: "kpt live apply /pkg".to_string(),
            code: Some(1),
            stderr: "error: no inventory".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "`kpt live apply /pkg` exited with code 1: error: no inventory"
        );
        assert_eq!(err.exit_code(), Some(1));
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_keep_tail_bounds_buffer() {
        let mut tail = Vec::new();
        keep_tail(&mut tail, &vec![b'a'; STDERR_TAIL]);
        keep_tail(&mut tail, b"xyz");
        assert_eq!(tail.len(), STDERR_TAIL);
        assert!(tail.ends_with(b"xyz"));
    }

    #[tokio::test]
    async fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());

        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        token.cancel();
        handle.await.unwrap();
        assert!(token.is_cancelled());
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::time::{Duration, Instant};
        use tempfile::TempDir;

        fn fake_kpt(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("kpt");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_run_streams_output() {
            let tmp = TempDir::new().unwrap();
            let kpt = KptCli::with_program(fake_kpt(tmp.path(), "echo \"args: $*\"\necho warn >&2"));

            let mut out = Vec::new();
            kpt.run(&KptCommand::pkg_init(Path::new("/pkg")), &CancelToken::new(), &mut out)
                .await
                .unwrap();

            let out = String::from_utf8(out).unwrap();
            assert!(out.contains("args: pkg init /pkg"));
            assert!(out.contains("warn"));
        }

        #[tokio::test]
        async fn test_output_captures_stdout_only() {
            let tmp = TempDir::new().unwrap();
            let kpt = KptCli::with_program(fake_kpt(tmp.path(), "echo 'kind: ResourceList'\necho noise >&2"));

            let out = kpt
                .output(&KptCommand::source(Path::new("/pkg")), &CancelToken::new())
                .await
                .unwrap();
            assert_eq!(out, b"kind: ResourceList\n");
        }

        #[tokio::test]
        async fn test_non_zero_exit() {
            let tmp = TempDir::new().unwrap();
            let kpt = KptCli::with_program(fake_kpt(tmp.path(), "echo boom >&2\nexit 3"));

            let err = kpt
                .run(&KptCommand::live_apply(&Package::new("/pkg")), &CancelToken::new(), &mut Vec::new())
                .await
                .unwrap_err();
            match err {
                CommandError::Exit { code, stderr, .. } => {
                    assert_eq!(code, Some(3));
                    assert_eq!(stderr, "boom");
                }
                other => panic!("unexpected error: {other}"),
            }
        }

        #[tokio::test]
        async fn test_missing_binary() {
            let kpt = KptCli::with_program("/nonexistent/kpt");
            let err = kpt
                .output(&KptCommand::source(Path::new("/pkg")), &CancelToken::new())
                .await
                .unwrap_err();
            assert!(matches!(err, CommandError::Spawn { .. }));
        }

        #[tokio::test]
        async fn test_cancel_kills_process() {
            let tmp = TempDir::new().unwrap();
            let kpt = KptCli::with_program(fake_kpt(tmp.path(), "exec sleep 30"));
            let cancel = CancelToken::new();

            let trigger = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                trigger.cancel();
            });

            let started = Instant::now();
            let err = kpt
                .run(&KptCommand::live_destroy(&Package::new("/pkg")), &cancel, &mut Vec::new())
                .await
                .unwrap_err();
            assert!(err.is_cancelled());
            assert!(started.elapsed() < Duration::from_secs(10));
        }

        #[tokio::test]
        async fn test_already_cancelled_does_not_spawn() {
            let cancel = CancelToken::new();
            cancel.cancel();
            let err = KptCli::with_program("/nonexistent/kpt")
                .output(&KptCommand::source(Path::new("/pkg")), &cancel)
                .await
                .unwrap_err();
            assert!(err.is_cancelled());
        }
    }
}
