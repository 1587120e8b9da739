//! Managed process supervision
//!
//! The supervisor launches the edge-routing process once, rewrites its
//! configuration file in place and asks it to reload with `SIGHUP`. A
//! watcher task owns the child. It delivers reload signals and reports the
//! exit through an [`ExitWatch`], so a signal never reaches a reaped PID.

use crate::{CoreError, Result};
use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::env;
use std::ffi::OsString;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// Launch configuration for the managed process
#[derive(Clone, Debug)]
pub struct SupervisorConfig {
    /// Binary name looked up on `PATH`, or a path containing `/`
    pub binary: String,
    /// Fixed configuration path, passed as `-c <path>`
    pub config_path: PathBuf,
    /// Appended to the command line after the configuration path
    pub extra_args: Vec<String>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            binary: "nginx".to_string(),
            config_path: PathBuf::from("/nginx.conf"),
            extra_args: Vec::new(),
        }
    }
}

impl SupervisorConfig {
    pub fn args(&self) -> Vec<OsString> {
        let mut args = vec![OsString::from("-c"), self.config_path.clone().into_os_string()];
        args.extend(self.extra_args.iter().map(OsString::from));
        args
    }
}

/// Lifecycle of the managed process
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running,
    Exited,
}

/// The process whose configuration the engine manages
#[async_trait]
pub trait ManagedProcess: Send + Sync {
    /// Replace the configuration file's contents
    async fn write_config(&self, config: &[u8]) -> Result<()>;

    /// Launch the process
    fn start(&mut self) -> Result<ExitWatch>;

    /// Ask the running process to reload its configuration
    async fn reload(&self) -> Result<()>;
}

/// Resolves once the managed process has exited
#[derive(Debug)]
pub struct ExitWatch {
    exit: oneshot::Receiver<String>,
}

impl ExitWatch {
    /// A watch together with the sender that reports the exit
    pub fn channel() -> (oneshot::Sender<String>, Self) {
        let (tx, exit) = oneshot::channel();
        (tx, Self { exit })
    }

    /// Wait for the managed process to exit
    pub async fn wait(self) -> CoreError {
        let reason = self
            .exit
            .await
            .unwrap_or_else(|_| "exit watcher stopped".to_string());
        CoreError::ProcessExited(reason)
    }
}

/// Supervises a single managed process
pub struct ProcessSupervisor {
    config: SupervisorConfig,
    pid: Option<Pid>,
    exited: Arc<AtomicBool>,
    reloads: Option<mpsc::UnboundedSender<ReloadRequest>>,
}

type ReloadRequest = oneshot::Sender<Result<()>>;

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            pid: None,
            exited: Arc::new(AtomicBool::new(false)),
            reloads: None,
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn pid(&self) -> Option<i32> {
        self.pid.map(Pid::as_raw)
    }

    pub fn state(&self) -> ProcessState {
        match self.pid {
            None => ProcessState::NotStarted,
            Some(_) if self.exited.load(Ordering::SeqCst) => ProcessState::Exited,
            Some(_) => ProcessState::Running,
        }
    }
}

#[async_trait]
impl ManagedProcess for ProcessSupervisor {
    async fn write_config(&self, config: &[u8]) -> Result<()> {
        let path = &self.config.config_path;
        tokio::fs::write(path, config)
            .await
            .map_err(|source| CoreError::Io {
                path: path.clone(),
                source,
            })?;

        debug!("Wrote {} bytes to {}", config.len(), path.display());
        Ok(())
    }

    fn start(&mut self) -> Result<ExitWatch> {
        let launch_error = |reason: String| CoreError::Launch {
            binary: self.config.binary.clone(),
            reason,
        };

        if self.pid.is_some() {
            return Err(launch_error("already started".to_string()));
        }

        let path = locate_binary(&self.config.binary)?;
        let mut child = Command::new(&path)
            .args(self.config.args())
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| launch_error(e.to_string()))?;

        let raw_pid = child
            .id()
            .ok_or_else(|| launch_error("exited before it could be supervised".to_string()))?;
        let pid = i32::try_from(raw_pid).map_err(|e| launch_error(e.to_string()))?;
        self.pid = Some(Pid::from_raw(pid));

        let exited = self.exited.clone();
        let (tx, watch) = ExitWatch::channel();
        let (reloads, mut requests) = mpsc::unbounded_channel::<ReloadRequest>();
        self.reloads = Some(reloads);

        tokio::spawn(async move {
            // Signals are sent between polls of `wait`, never after the reap
            let reason = loop {
                tokio::select! {
                    status = child.wait() => break match status {
                        Ok(status) => status.to_string(),
                        Err(e) => format!("wait failed: {e}"),
                    },
                    Some(reply) = requests.recv() => {
                        let _ = reply.send(signal_reload(&child));
                    }
                }
            };
            exited.store(true, Ordering::SeqCst);
            let _ = tx.send(reason);
        });

        info!("Started {} with PID {}", path.display(), pid);
        Ok(watch)
    }

    async fn reload(&self) -> Result<()> {
        let not_running = || CoreError::Signal(format!("process is {:?}", self.state()));

        let reloads = self.reloads.as_ref().ok_or_else(not_running)?;
        let (reply, result) = oneshot::channel();
        reloads.send(reply).map_err(|_| not_running())?;
        result.await.map_err(|_| not_running())?
    }
}

/// Send `SIGHUP` to a child that hasn't been reaped yet
fn signal_reload(child: &Child) -> Result<()> {
    let raw_pid = child
        .id()
        .ok_or_else(|| CoreError::Signal("process has already been reaped".to_string()))?;
    let pid = i32::try_from(raw_pid)
        .map(Pid::from_raw)
        .map_err(|e| CoreError::Signal(e.to_string()))?;

    signal::kill(pid, Signal::SIGHUP)
        .map_err(|e| CoreError::Signal(format!("SIGHUP to PID {pid}: {e}")))
}

/// Find the managed binary the way a shell would
pub fn locate_binary(binary: &str) -> Result<PathBuf> {
    let not_found = |reason: &str| CoreError::Launch {
        binary: binary.to_string(),
        reason: reason.to_string(),
    };

    if binary.contains('/') {
        let path = PathBuf::from(binary);
        return if is_executable(&path) {
            Ok(path)
        } else {
            Err(not_found("not an executable file"))
        };
    }

    let search_path = env::var_os("PATH").ok_or_else(|| not_found("$PATH is not set"))?;
    env::split_paths(&search_path)
        .map(|dir| dir.join(binary))
        .find(|candidate| is_executable(candidate))
        .ok_or_else(|| not_found("executable file not found in $PATH"))
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn supervisor(binary: &str, config_path: PathBuf) -> ProcessSupervisor {
        ProcessSupervisor::new(SupervisorConfig {
            binary: binary.to_string(),
            config_path,
            extra_args: Vec::new(),
        })
    }

    #[test]
    fn test_args_reference_config_path() {
        let config = SupervisorConfig {
            extra_args: vec!["-g".to_string(), "pid /run/nginx.pid;".to_string()],
            ..Default::default()
        };
        let args: Vec<String> = config
            .args()
            .into_iter()
            .map(|a| a.into_string().unwrap())
            .collect();
        assert_eq!(args, vec!["-c", "/nginx.conf", "-g", "pid /run/nginx.pid;"]);
    }

    #[test]
    fn test_locate_binary() {
        assert!(locate_binary("sh").is_ok());
        assert!(matches!(
            locate_binary("definitely-not-an-edge-proxy"),
            Err(CoreError::Launch { .. })
        ));
        assert!(locate_binary("/definitely/not/here").is_err());
    }

    #[tokio::test]
    async fn test_start_missing_binary_is_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut sup = supervisor("definitely-not-an-edge-proxy", dir.path().join("proxy.conf"));

        let err = sup.start().unwrap_err();
        assert!(matches!(err, CoreError::Launch { .. }));
        assert_eq!(sup.state(), ProcessState::NotStarted);
    }

    #[tokio::test]
    async fn test_write_config_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxy.conf");
        let sup = supervisor("nginx", path.clone());

        sup.write_config(b"a much longer first configuration").await.unwrap();
        sup.write_config(b"short").await.unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"short");
    }

    #[tokio::test]
    async fn test_write_config_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let sup = supervisor("nginx", dir.path().join("missing").join("proxy.conf"));

        let err = sup.write_config(b"daemon off;").await.unwrap_err();
        assert!(matches!(err, CoreError::Io { .. }));
    }

    #[tokio::test]
    async fn test_reload_before_start_fails() {
        let sup = supervisor("nginx", PathBuf::from("/nginx.conf"));
        let err = sup.reload().await.unwrap_err();
        assert!(matches!(err, CoreError::Signal(_)));
    }

    #[tokio::test]
    async fn test_reaped_child_is_not_signalled() {
        let mut child = Command::new("sh").args(["-c", "exit 0"]).spawn().unwrap();
        child.wait().await.unwrap();

        let err = signal_reload(&child).unwrap_err();
        assert!(matches!(err, CoreError::Signal(_)));
    }

    #[tokio::test]
    async fn test_supervised_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("proxy.sh");
        fs::write(&script, "#!/bin/sh\nexec sleep 30\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        // `sh -c <path>` runs the script in place of a real proxy
        let mut sup = supervisor("sh", script);
        let watch = sup.start().unwrap();
        assert_eq!(sup.state(), ProcessState::Running);
        assert!(sup.pid().is_some());
        assert!(matches!(sup.start(), Err(CoreError::Launch { .. })));

        // The stand-in has no reload handler, so SIGHUP terminates it
        sup.reload().await.unwrap();

        let err = tokio::time::timeout(Duration::from_secs(10), watch.wait())
            .await
            .unwrap();
        assert!(matches!(err, CoreError::ProcessExited(_)));
        assert_eq!(sup.state(), ProcessState::Exited);
        assert!(matches!(sup.reload().await, Err(CoreError::Signal(_))));
    }

    #[tokio::test]
    async fn test_exit_watch_channel() {
        let (tx, watch) = ExitWatch::channel();
        tx.send("exit status: 1".to_string()).unwrap();
        let err = watch.wait().await;
        assert_eq!(err.to_string(), "Managed process exited: exit status: 1");
    }
}
