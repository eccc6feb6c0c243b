use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{mpsc, oneshot};

use super::SessionEvent;

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// What to start, and which session/run its events belong to.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    pub session: String,
    pub run: u64,
    pub directory: PathBuf,
    pub command: String,
}

/// Starts a shell command and streams its output back as [`SessionEvent`]s.
///
/// Implementations must deliver every `Output` event of a run before its
/// `Exited` event.
pub trait Spawner: Send {
    fn spawn(&mut self, request: SpawnRequest, events: EventSender) -> crate::Result<ProcessHandle>;
}

/// Control over one spawned run. Dropping the handle terminates the process.
#[derive(Debug)]
pub struct ProcessHandle {
    run: u64,
    pid: Option<u32>,
    kill: Option<oneshot::Sender<()>>,
}

impl ProcessHandle {
    pub fn new(run: u64, pid: Option<u32>, kill: oneshot::Sender<()>) -> Self {
        Self { run, pid, kill: Some(kill) }
    }

    pub fn run(&self) -> u64 {
        self.run
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Ask the process to stop. Returns false if it was already asked.
    pub fn terminate(&mut self) -> bool {
        match self.kill.take() {
            Some(tx) => {
                tracing::info!("Terminating run {} (pid {:?})", self.run, self.pid);
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }
}

/// Runs commands through `sh -c` in their own process group.
pub struct ShellSpawner {
    shell: String,
}

impl Default for ShellSpawner {
    fn default() -> Self {
        Self { shell: "sh".to_string() }
    }
}

impl Spawner for ShellSpawner {
    fn spawn(&mut self, request: SpawnRequest, events: EventSender) -> crate::Result<ProcessHandle> {
        let mut command = tokio::process::Command::new(&self.shell);
        command
            .arg("-c")
            .arg(&request.command)
            .current_dir(&request.directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        {
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|e| {
            crate::Error::SpawnFailed(format!("{} in {}: {}", request.command, request.directory.display(), e))
        })?;
        let pid = child.id();
        tracing::info!("Spawned run {} for {} (pid {:?}): {}", request.run, request.session, pid, request.command);

        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(read_lines(stdout, chunk_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(read_lines(stderr, chunk_tx.clone()));
        }
        drop(chunk_tx);

        let (kill_tx, kill_rx) = oneshot::channel();
        tokio::spawn(pump(child, pid, chunk_rx, kill_rx, request.session, request.run, events));

        Ok(ProcessHandle::new(request.run, pid, kill_tx))
    }
}

async fn read_lines<R: AsyncRead + Unpin>(reader: R, chunks: mpsc::UnboundedSender<String>) {
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                if chunks.send(String::from_utf8_lossy(&line).into_owned()).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!("Output read failed: {}", e);
                break;
            }
        }
    }
}

/// Forwards output, waits for exit, then reports `Exited` last.
async fn pump(
    mut child: tokio::process::Child,
    pid: Option<u32>,
    mut chunks: mpsc::UnboundedReceiver<String>,
    kill: oneshot::Receiver<()>,
    session: String,
    run: u64,
    events: EventSender,
) {
    let forward = async {
        while let Some(chunk) = chunks.recv().await {
            let _ = events.send(SessionEvent::Output {
                session: session.clone(),
                run,
                chunk,
            });
        }
    };

    let wait = async {
        tokio::select! {
            status = child.wait() => status,
            _ = kill => {
                signal_group(pid);
                let _ = child.start_kill();
                child.wait().await
            }
        }
    };

    let ((), status) = tokio::join!(forward, wait);
    let code = match status {
        Ok(status) => status.code(),
        Err(e) => {
            tracing::warn!("Waiting on run {} failed: {}", run, e);
            None
        }
    };
    tracing::info!("Run {} for {} exited with {:?}", run, session, code);
    let _ = events.send(SessionEvent::Exited { session, run, status: code });
}

/// Jest forks workers; signal the whole group so none outlive the shell.
fn signal_group(pid: Option<u32>) {
    #[cfg(unix)]
    {
        if let Some(pid) = pid {
            unsafe {
                libc::kill(-(pid as i32), libc::SIGTERM);
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
    }
}
