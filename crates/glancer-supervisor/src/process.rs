//! Launching and reaping the `ollama serve` process.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::SupervisorError;

/// How long a terminated server gets to exit before it is killed.
const TERMINATE_GRACE: Duration = Duration::from_secs(3);

/// Starts the server process. Swapped out in tests.
pub trait Spawner: Send + Sync {
    fn spawn(&self, executable: &Path) -> std::io::Result<Child>;
}

/// Runs `<executable> serve` detached from the gateway's console.
#[derive(Debug, Default, Clone, Copy)]
pub struct ServeSpawner;

impl Spawner for ServeSpawner {
    fn spawn(&self, executable: &Path) -> std::io::Result<Child> {
        let mut command = Command::new(executable);
        command
            .arg("serve")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        detach(&mut command);
        command.spawn()
    }
}

/// Keep the child off the gateway's console window.
#[cfg(windows)]
fn detach(command: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    command.creation_flags(CREATE_NO_WINDOW);
}

/// Own process group, so Ctrl-C in the gateway's terminal reaches only the
/// gateway, which then stops the server itself.
#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(any(unix, windows)))]
fn detach(_command: &mut Command) {}

/// Spawn the server and wrap it in a [`ServerHandle`].
pub fn launch<S>(spawner: &S, executable: &Path) -> Result<ServerHandle, SupervisorError>
where
    S: Spawner + ?Sized,
{
    let child = spawner
        .spawn(executable)
        .map_err(|source| SupervisorError::Launch {
            path: executable.to_path_buf(),
            source,
        })?;
    Ok(ServerHandle::new(child))
}

/// Owned handle to a spawned server process.
///
/// The process is terminated when the handle is dropped.
#[derive(Debug)]
pub struct ServerHandle {
    pid: u32,
    child: Option<Child>,
}

impl ServerHandle {
    /// Take ownership of `child`. Its piped stdout/stderr are drained on
    /// background threads into the debug log.
    pub fn new(mut child: Child) -> Self {
        let pid = child.id();
        if let Some(stdout) = child.stdout.take() {
            drain("stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            drain("stderr", stderr);
        }
        Self {
            pid,
            child: Some(child),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Whether the process is still running.
    pub fn is_alive(&mut self) -> bool {
        match self.child.as_mut().map(Child::try_wait) {
            Some(Ok(None)) => true,
            Some(Ok(Some(_))) | Some(Err(_)) | None => false,
        }
    }

    /// Stop the process. Safe to call repeatedly and on a process that has
    /// already exited.
    pub fn terminate(&mut self) {
        let Some(mut child) = self.child.take() else {
            debug!("Ollama server (PID: {}) already terminated", self.pid);
            return;
        };

        match child.try_wait() {
            Ok(Some(status)) => {
                debug!("Ollama server (PID: {}) already exited: {}", self.pid, status);
                return;
            }
            Ok(None) => {}
            Err(e) => warn!("Error checking Ollama server status: {}", e),
        }

        info!("Stopping Ollama server (PID: {})", self.pid);

        #[cfg(unix)]
        {
            if send_sigterm(self.pid) && wait_for_exit(&mut child, TERMINATE_GRACE) {
                return;
            }
            warn!("Ollama server didn't exit gracefully, killing...");
        }

        if let Err(e) = child.kill() {
            debug!("Kill of PID {} failed: {}", self.pid, e);
        }
        let _ = child.wait();
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// SIGTERM the child's process group, falling back to the child alone.
#[cfg(unix)]
fn send_sigterm(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: kill has no memory-safety preconditions; the child has not been
    // reaped yet so the pid still refers to it.
    unsafe { libc::kill(-pid, libc::SIGTERM) == 0 || libc::kill(pid, libc::SIGTERM) == 0 }
}

#[cfg(unix)]
fn wait_for_exit(child: &mut Child, grace: Duration) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < grace {
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!("Ollama server exited with status: {}", status);
                return true;
            }
            Ok(None) => std::thread::sleep(Duration::from_millis(50)),
            Err(_) => return false,
        }
    }
    false
}

fn drain<R>(stream: &'static str, reader: R)
where
    R: Read + Send + 'static,
{
    let spawned = std::thread::Builder::new()
        .name(format!("ollama-{}", stream))
        .spawn(move || {
            for line in BufReader::new(reader).lines() {
                match line {
                    Ok(line) => debug!(target: "glancer::ollama", stream, "{}", line),
                    Err(_) => break,
                }
            }
        });
    if let Err(e) = spawned {
        warn!("Could not capture Ollama {}: {}", stream, e);
    }
}
