//! Compute module hosted as a child process
//!
//! Requests are written to the child's stdin as newline-delimited JSON and
//! messages are read back from its stdout the same way. Anything the module
//! prints to stderr is forwarded to `tracing`.

use safelight_common::{Error, RequestEnvelope, Result};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::channel::{ChannelEvent, EventReceiver, EventSender, ModuleChannel};

/// Channel to a module executable running as a child process
pub struct ProcessChannel {
    path: PathBuf,
    requests: Option<mpsc::UnboundedSender<String>>,
    kill: Option<oneshot::Sender<()>>,
}

impl ProcessChannel {
    /// Start the module at `path`
    ///
    /// Spawn failures are reported as [`ChannelEvent::LoadError`] on the
    /// returned receiver rather than as an error here.
    pub fn spawn(path: PathBuf) -> (Self, EventReceiver) {
        let (events, event_rx) = mpsc::unbounded_channel();

        let mut command = Command::new(&path);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                let _ = events.send(ChannelEvent::LoadError(format!(
                    "Failed to start module {}: {}",
                    path.display(),
                    e
                )));
                let channel = Self {
                    path,
                    requests: None,
                    kill: None,
                };
                return (channel, event_rx);
            }
        };

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            let _ = events.send(ChannelEvent::LoadError(
                "Module stdio was not captured".to_string(),
            ));
            let channel = Self {
                path,
                requests: None,
                kill: None,
            };
            return (channel, event_rx);
        };

        info!("Started module {} (pid {:?})", path.display(), child.id());
        let _ = events.send(ChannelEvent::Ready);

        let (requests, request_rx) = mpsc::unbounded_channel();
        let (kill, kill_rx) = oneshot::channel();
        let name = module_name(&path);

        tokio::spawn(write_requests(stdin, request_rx));
        tokio::spawn(forward_stderr(stderr, name.clone()));
        tokio::spawn(supervise(child, stdout, events, kill_rx, name));

        let channel = Self {
            path,
            requests: Some(requests),
            kill: Some(kill),
        };
        (channel, event_rx)
    }
}

impl ModuleChannel for ProcessChannel {
    fn probe(&self) -> bool {
        self.path.is_file()
    }

    fn post(&mut self, envelope: &RequestEnvelope) -> Result<()> {
        let requests = self.requests.as_ref().ok_or_else(stdin_closed)?;
        let mut line = serde_json::to_string(envelope)?;
        line.push('\n');
        requests.send(line).map_err(|_| stdin_closed())
    }

    fn close(&mut self) {
        self.requests = None;
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

fn stdin_closed() -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::BrokenPipe,
        "module stdin is closed",
    ))
}

fn module_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn write_requests(mut stdin: ChildStdin, mut requests: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = requests.recv().await {
        if let Err(e) = stdin.write_all(line.as_bytes()).await {
            warn!("Failed to write to module stdin: {}", e);
            break;
        }
        if let Err(e) = stdin.flush().await {
            warn!("Failed to flush module stdin: {}", e);
            break;
        }
    }
}

async fn forward_stderr(stderr: ChildStderr, name: String) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(module = %name, "{}", line);
    }
}

/// Forward stdout messages until the module exits or is killed
///
/// The exit is reported only after stdout is drained, so responses written
/// just before exiting are delivered ahead of the crash.
async fn supervise(
    mut child: Child,
    stdout: ChildStdout,
    events: EventSender,
    mut kill: oneshot::Receiver<()>,
    name: String,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        tokio::select! {
            _ = &mut kill => {
                debug!(module = %name, "Killing module");
                let _ = child.kill().await;
                return;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str(&line) {
                        Ok(message) => {
                            let _ = events.send(ChannelEvent::Message(message));
                        }
                        Err(e) => warn!(module = %name, "Module wrote a non-JSON line: {}", e),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(module = %name, "Failed to read module stdout: {}", e);
                    break;
                }
            }
        }
    }

    let reason = match child.wait().await {
        Ok(status) => format!("Module {} exited with {}", name, status),
        Err(e) => format!("Failed to wait on module {}: {}", name, e),
    };
    let _ = events.send(ChannelEvent::Crashed(reason));
}
