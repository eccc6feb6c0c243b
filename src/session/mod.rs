pub mod history;
pub mod process;
pub mod registry;
pub mod transcript;

pub use history::RunHistory;
pub use process::{ProcessHandle, ShellSpawner, SpawnRequest, Spawner};
pub use registry::{Launch, ProjectSession, SessionObserver, SessionPolicy, SessionRegistry};
pub use transcript::Transcript;

/// Kind marker carried by sessions this tool created.
pub const SESSION_KIND: &str = "jest";

/// Base session name; suffixed with `<project>` when configured.
pub const SESSION_NAME: &str = "*jest*";

/// Lifecycle of a session's current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, nothing launched yet.
    Idle,
    /// Command recorded, process being spawned.
    Starting,
    Running,
    Completed,
    Killed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Starting => "starting",
            SessionState::Running => "running",
            SessionState::Completed => "completed",
            SessionState::Killed => "killed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivered by a spawner for each run: any number of `Output` chunks,
/// then exactly one `Exited`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Output { session: String, run: u64, chunk: String },
    Exited { session: String, run: u64, status: Option<i32> },
}

impl SessionEvent {
    pub fn session(&self) -> &str {
        match self {
            SessionEvent::Output { session, .. } | SessionEvent::Exited { session, .. } => session,
        }
    }

    pub fn run(&self) -> u64 {
        match self {
            SessionEvent::Output { run, .. } | SessionEvent::Exited { run, .. } => *run,
        }
    }
}
