use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use crate::config::JestrunSettings;
use crate::prompt::Prompter;
use crate::runner::command::CommandLine;
use crate::runner::project::Project;
use crate::{Error, Result};
use super::process::{EventSender, ProcessHandle, SpawnRequest, Spawner};
use super::{RunHistory, SessionEvent, SessionState, Transcript, SESSION_KIND, SESSION_NAME};

/// Per-project choices that shape a launch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionPolicy {
    pub kill_without_asking: bool,
    pub clear_on_banner: bool,
    pub project_name_in_session_name: bool,
}

impl SessionPolicy {
    pub fn from_settings(settings: &JestrunSettings) -> Self {
        Self {
            kill_without_asking: settings.kill_without_asking,
            clear_on_banner: settings.clear_on_banner,
            project_name_in_session_name: settings.project_name_in_session_name,
        }
    }
}

/// One long-lived interactive session and its transcript.
#[derive(Debug)]
pub struct ProjectSession {
    name: String,
    kind: String,
    project: Project,
    state: SessionState,
    last_command: Option<CommandLine>,
    last_flags: Vec<String>,
    last_status: Option<i32>,
    clear_on_banner: bool,
    /// Run whose events this session applies. Outlives the handle after a
    /// kill so the run's own `Exited` still arrives.
    run: Option<u64>,
    handle: Option<ProcessHandle>,
    transcript: Transcript,
}

impl ProjectSession {
    fn new(name: &str, project: &Project) -> Self {
        Self::with_kind(name, SESSION_KIND, project)
    }

    /// A session of another kind sharing the host's namespace.
    pub fn with_kind(name: &str, kind: &str, project: &Project) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            project: project.clone(),
            state: SessionState::Idle,
            last_command: None,
            last_flags: Vec::new(),
            last_status: None,
            clear_on_banner: false,
            run: None,
            handle: None,
            transcript: Transcript::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn is_jest(&self) -> bool {
        self.kind == SESSION_KIND
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn last_command(&self) -> Option<&CommandLine> {
        self.last_command.as_ref()
    }

    /// Raw flags the last command was built from.
    pub fn last_flags(&self) -> &[String] {
        &self.last_flags
    }

    pub fn last_status(&self) -> Option<i32> {
        self.last_status
    }

    pub fn pid(&self) -> Option<u32> {
        self.handle.as_ref().and_then(ProcessHandle::pid)
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    fn terminate(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.terminate();
        }
        self.state = SessionState::Killed;
    }
}

/// Notified as sessions start, print, clear and finish.
pub trait SessionObserver {
    fn started(&mut self, _session: &ProjectSession) {}
    fn output(&mut self, _session: &ProjectSession, _chunk: &str) {}
    /// The transcript was wiped because a finished run was still on screen.
    fn cleared(&mut self, _session: &ProjectSession) {}
    fn finished(&mut self, _session: &ProjectSession, _status: Option<i32>) {}
}

/// Everything `launch` needs. `flags` is the raw flag snapshot the command
/// was built from.
#[derive(Debug, Clone)]
pub struct Launch {
    pub project: Project,
    pub current_session: Option<String>,
    pub command: CommandLine,
    pub flags: Vec<String>,
    pub edit: bool,
    pub policy: SessionPolicy,
}

/// Owns every session, the run history and the last command per project.
///
/// Only the host's event loop touches the registry: it calls `launch`,
/// `repeat` and `kill` for user actions and feeds spawner events into
/// `handle_event`. That single writer keeps "one process per session" true
/// without locks.
pub struct SessionRegistry {
    sessions: HashMap<String, ProjectSession>,
    last_commands: HashMap<PathBuf, CommandLine>,
    history: RunHistory,
    spawner: Box<dyn Spawner>,
    events: EventSender,
    observers: Vec<Box<dyn SessionObserver>>,
    next_run: u64,
}

impl SessionRegistry {
    /// The receiver yields spawner events; feed them to `handle_event`.
    pub fn new(spawner: Box<dyn Spawner>) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let registry = Self {
            sessions: HashMap::new(),
            last_commands: HashMap::new(),
            history: RunHistory::new(),
            spawner,
            events,
            observers: Vec::new(),
            next_run: 0,
        };
        (registry, rx)
    }

    pub fn add_observer(&mut self, observer: Box<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    /// Register a session created by someone else, e.g. a plain shell the
    /// host also calls `*jest*`. Jest runs never reuse it.
    pub fn insert(&mut self, session: ProjectSession) {
        self.sessions.insert(session.name.clone(), session);
    }

    pub fn history(&self) -> &RunHistory {
        &self.history
    }

    pub fn session(&self, name: &str) -> Option<&ProjectSession> {
        self.sessions.get(name)
    }

    pub fn sessions(&self) -> impl Iterator<Item = &ProjectSession> {
        self.sessions.values()
    }

    /// Command a repeat would run: the current session's if it is a jest
    /// session, else the project's.
    pub fn last_command(&self, project_root: &Path, current: Option<&str>) -> Option<&CommandLine> {
        self.current_jest_session(current)
            .and_then(|s| s.last_command.as_ref())
            .or_else(|| self.last_commands.get(project_root))
    }

    fn current_jest_session(&self, current: Option<&str>) -> Option<&ProjectSession> {
        current
            .and_then(|name| self.sessions.get(name))
            .filter(|s| s.is_jest())
    }

    /// Name of the session a launch would use. The current session is
    /// reused only for its own project. Never picks a session of another
    /// kind; a clashing name gets a `<N>` suffix instead.
    pub fn session_name_for(&self, project: &Project, current: Option<&str>, policy: &SessionPolicy) -> String {
        let reusable = self
            .current_jest_session(current)
            .filter(|s| s.project.root == project.root);
        if let Some(session) = reusable {
            return session.name.clone();
        }
        let base = if policy.project_name_in_session_name {
            format!("{}<{}>", SESSION_NAME, project.display_name)
        } else {
            SESSION_NAME.to_string()
        };
        let mut name = base.clone();
        let mut suffix = 2;
        while self.sessions.get(&name).is_some_and(|s| !s.is_jest()) {
            name = format!("{}<{}>", base, suffix);
            suffix += 1;
        }
        name
    }

    /// Run `launch.command` in its session, returning the session name.
    ///
    /// Declining the edit prompt or the kill confirmation returns
    /// `UserCancelled` and changes nothing.
    pub async fn launch<P: Prompter>(&mut self, launch: Launch, prompter: &mut P) -> Result<String> {
        let Launch { project, current_session, mut command, flags, edit, policy } = launch;

        if edit {
            let Some(edited) = prompter.edit(&command.rendered, self.history.entries()).await else {
                tracing::info!("Edit declined, not running");
                return Err(Error::UserCancelled);
            };
            command = command.with_rendered(edited);
        }

        let name = self.session_name_for(&project, current_session.as_deref(), &policy);

        let running = self.sessions.get(&name).is_some_and(|s| s.state == SessionState::Running);
        if running {
            let question = format!("A jest process is running in {}; kill it?", name);
            if !policy.kill_without_asking && !prompter.confirm(&question).await {
                tracing::info!("Kept running process in {}, launch aborted", name);
                return Err(Error::UserCancelled);
            }
            if let Some(session) = self.sessions.get_mut(&name) {
                session.terminate();
            }
        }

        self.history.record(&command.rendered);
        self.last_commands.insert(project.root.clone(), command.clone());
        self.next_run += 1;
        let run = self.next_run;

        let session = self.sessions.entry(name.clone()).or_insert_with(|| {
            tracing::info!("Creating session {} for {}", name, project.root.display());
            ProjectSession::new(&name, &project)
        });
        session.project = project;
        session.last_command = Some(command.clone());
        session.last_flags = flags;
        session.last_status = None;
        session.clear_on_banner = policy.clear_on_banner;
        session.transcript.clear();
        session.transcript.write_header(&session.project.root, &command.rendered);
        session.state = SessionState::Starting;

        let request = SpawnRequest {
            session: name.clone(),
            run,
            directory: session.project.root.clone(),
            command: command.rendered.clone(),
        };
        match self.spawner.spawn(request, self.events.clone()) {
            Ok(handle) => {
                session.run = Some(handle.run());
                session.handle = Some(handle);
                session.state = SessionState::Running;
            }
            Err(e) => {
                tracing::warn!("Launch in {} failed: {}", name, e);
                session.state = SessionState::Idle;
                session.run = None;
                return Err(e);
            }
        }

        for observer in self.observers.iter_mut() {
            observer.started(session);
        }
        Ok(name)
    }

    /// Launch the most recent command again.
    ///
    /// Inside a jest session that session's command and project win;
    /// otherwise `project`'s last command is used. Fails with `NoHistory`
    /// when neither exists.
    pub async fn repeat<P: Prompter>(
        &mut self,
        project: &Project,
        current: Option<&str>,
        edit: bool,
        policy: SessionPolicy,
        prompter: &mut P,
    ) -> Result<String> {
        let (project, command, flags) = match self.current_jest_session(current) {
            Some(session) if session.last_command.is_some() => (
                session.project.clone(),
                session.last_command.clone(),
                session.last_flags.clone(),
            ),
            _ => (
                project.clone(),
                self.last_commands.get(&project.root).cloned(),
                Vec::new(),
            ),
        };
        let Some(command) = command else {
            return Err(Error::NoHistory(project.display_name));
        };

        self.launch(
            Launch {
                project,
                current_session: current.map(str::to_string),
                command,
                flags,
                edit,
                policy,
            },
            prompter,
        )
        .await
    }

    /// Kill the running process in `name`. Returns false if nothing was running.
    pub fn kill(&mut self, name: &str) -> bool {
        let Some(session) = self.sessions.get_mut(name) else { return false };
        if session.state != SessionState::Running {
            return false;
        }
        session.terminate();
        session.transcript.append("\nKilled\n");
        true
    }

    /// Apply one spawner event. Events of superseded runs are dropped.
    pub fn handle_event(&mut self, event: SessionEvent) {
        let Some(session) = self.sessions.get_mut(event.session()) else {
            tracing::debug!("Event for unknown session {}", event.session());
            return;
        };
        if session.run != Some(event.run()) {
            tracing::debug!("Ignoring event from superseded run {} in {}", event.run(), session.name);
            return;
        }

        match event {
            SessionEvent::Output { chunk, .. } => {
                if session.clear_on_banner && session.transcript.is_stale_before(&chunk) {
                    tracing::debug!("New run after a finished one in {}, clearing", session.name);
                    session.transcript.clear();
                    for observer in self.observers.iter_mut() {
                        observer.cleared(session);
                    }
                }
                session.transcript.append(&chunk);
                for observer in self.observers.iter_mut() {
                    observer.output(session, &chunk);
                }
            }
            SessionEvent::Exited { status, .. } => {
                session.run = None;
                session.handle = None;
                if session.state != SessionState::Killed {
                    session.state = SessionState::Completed;
                }
                session.last_status = status;
                session.transcript.append(&format!("\n{}\n", describe_exit(status)));
                tracing::info!("Session {} finished: {:?}", session.name, status);
                for observer in self.observers.iter_mut() {
                    observer.finished(session, status);
                }
            }
        }
    }
}

fn describe_exit(status: Option<i32>) -> String {
    match status {
        Some(code) => format!("Jest exited with code {}", code),
        None => "Jest was terminated".to_string(),
    }
}
