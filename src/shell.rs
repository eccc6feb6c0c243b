//! Interactive host: one command per line, sessions running in the background.
//!
//! The loop owns the [`SessionRegistry`] and is its only writer. It waits on
//! either the next input line or the next spawner event and applies whichever
//! comes first.

use std::io::Write;
use std::path::PathBuf;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::prompt::{LinePrompter, Prompter};
use crate::runner::project::Project;
use crate::runner::{Action, Runner};
use crate::session::{
    ProjectSession, SessionEvent, SessionObserver, SessionPolicy, SessionRegistry, ShellSpawner,
};

const PROMPT: &str = "jestrun> ";

#[derive(Debug, Parser)]
#[command(name = "jestrun", no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Debug, Subcommand)]
enum ShellCommand {
    #[command(flatten)]
    Run(Action),
    /// Run the last command again
    Repeat {
        /// Offer the command for editing first
        #[arg(long)]
        edit: bool,
        /// Kill a running test process without asking
        #[arg(long)]
        force: bool,
    },
    /// Kill the running process of a session (default: current)
    Kill { session: Option<String> },
    /// Make SESSION the current session
    Switch { session: String },
    /// List previously run commands, newest first
    History,
    /// List sessions
    Sessions,
    /// Print a session's transcript (default: current)
    Transcript { session: Option<String> },
    /// Leave the shell, killing running processes
    #[command(alias = "exit")]
    Quit,
}

/// What the host should do after a line.
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    Done,
    Text(String),
    Quit,
}

pub struct Shell {
    runner: Runner,
    registry: SessionRegistry,
    cwd: PathBuf,
    current: Option<String>,
}

impl Shell {
    pub fn new(runner: Runner, registry: SessionRegistry, cwd: PathBuf) -> Self {
        Self { runner, registry, cwd, current: None }
    }

    /// Session the last launch went to, used by `repeat`, `kill` and `transcript`.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        self.registry.handle_event(event);
    }

    /// Parse and run one input line.
    pub async fn execute<P: Prompter>(&mut self, line: &str, prompter: &mut P) -> Reply {
        let line = line.trim();
        if line.is_empty() {
            return Reply::Done;
        }
        let words = match shell_words::split(line) {
            Ok(words) => words,
            Err(e) => return Reply::Text(format!("Could not parse line: {}", e)),
        };
        let parsed = match ShellLine::try_parse_from(words) {
            Ok(parsed) => parsed,
            Err(e) => return Reply::Text(e.render().to_string()),
        };

        match self.dispatch(parsed.command, prompter).await {
            Ok(reply) => reply,
            Err(e) if e.is_cancelled() => {
                tracing::info!("{}", e);
                Reply::Done
            }
            Err(e) => Reply::Text(format!("Error: {}", e)),
        }
    }

    async fn dispatch<P: Prompter>(&mut self, command: ShellCommand, prompter: &mut P) -> crate::Result<Reply> {
        match command {
            ShellCommand::Run(action) => {
                let force = action.options().force;
                let prepared = self.runner.prepare(&action, &self.cwd)?;
                let launch = prepared.into_launch(self.current.clone(), force);
                let name = self.registry.launch(launch, prompter).await?;
                self.current = Some(name);
                Ok(Reply::Done)
            }
            ShellCommand::Repeat { edit, force } => {
                let project = Project::discover(&self.cwd);
                let settings = self.runner.settings_for(&project);
                let mut policy = SessionPolicy::from_settings(&settings);
                policy.kill_without_asking |= force;
                let edit = edit || settings.confirm_before_run;
                let name = self
                    .registry
                    .repeat(&project, self.current.as_deref(), edit, policy, prompter)
                    .await?;
                self.current = Some(name);
                Ok(Reply::Done)
            }
            ShellCommand::Kill { session } => {
                let Some(name) = session.or_else(|| self.current.clone()) else {
                    return Ok(Reply::Text("No current session".to_string()));
                };
                if self.registry.kill(&name) {
                    Ok(Reply::Text(format!("Killed {}", name)))
                } else {
                    Ok(Reply::Text(format!("Nothing running in {}", name)))
                }
            }
            ShellCommand::Switch { session } => {
                if self.registry.session(&session).is_some() {
                    self.current = Some(session.clone());
                    Ok(Reply::Text(format!("Current session: {}", session)))
                } else {
                    Ok(Reply::Text(format!("No session named {}", session)))
                }
            }
            ShellCommand::History => Ok(Reply::Text(self.history_listing())),
            ShellCommand::Sessions => Ok(Reply::Text(self.session_listing())),
            ShellCommand::Transcript { session } => {
                let name = session.or_else(|| self.current.clone());
                match name.as_deref().and_then(|n| self.registry.session(n)) {
                    Some(session) => Ok(Reply::Text(session.transcript().as_str().to_string())),
                    None => Ok(Reply::Text("No such session".to_string())),
                }
            }
            ShellCommand::Quit => Ok(Reply::Quit),
        }
    }

    fn history_listing(&self) -> String {
        let history = self.registry.history();
        if history.is_empty() {
            return "No commands run yet".to_string();
        }
        history
            .entries()
            .iter()
            .enumerate()
            .map(|(i, cmd)| format!("{:>3}  {}", i, cmd))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn session_listing(&self) -> String {
        let mut sessions: Vec<&ProjectSession> = self.registry.sessions().collect();
        if sessions.is_empty() {
            return "No sessions".to_string();
        }
        sessions.sort_by(|a, b| a.name().cmp(b.name()));
        sessions
            .iter()
            .map(|s| {
                let marker = if Some(s.name()) == self.current() { ">" } else { " " };
                let mut line = format!(
                    "{} {} [{}] {} {}",
                    marker,
                    s.name(),
                    s.kind(),
                    s.state(),
                    s.project().root.display()
                );
                if !s.last_flags().is_empty() {
                    line.push_str(&format!(" -- {}", shell_words::join(s.last_flags())));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Echoes session activity to a terminal.
pub struct TerminalObserver<W> {
    out: W,
}

impl TerminalObserver<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: std::io::stdout() }
    }
}

impl<W: Write> TerminalObserver<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> SessionObserver for TerminalObserver<W> {
    fn started(&mut self, session: &ProjectSession) {
        if let Some(command) = session.last_command() {
            let _ = writeln!(self.out, "[{}] {}", session.name(), command.rendered);
        }
    }

    fn output(&mut self, _session: &ProjectSession, chunk: &str) {
        let _ = self.out.write_all(chunk.as_bytes());
        let _ = self.out.flush();
    }

    fn cleared(&mut self, session: &ProjectSession) {
        let _ = writeln!(self.out, "[{}] new run", session.name());
    }

    fn finished(&mut self, session: &ProjectSession, status: Option<i32>) {
        let _ = match status {
            Some(code) => writeln!(self.out, "[{}] exited with code {}", session.name(), code),
            None => writeln!(self.out, "[{}] terminated", session.name()),
        };
        let _ = self.out.flush();
    }
}

enum Input {
    Line(Option<String>),
    Event(SessionEvent),
}

/// Run the interactive shell on stdin/stdout until `quit` or end of input.
pub async fn run_interactive(runner: Runner, cwd: PathBuf) -> crate::Result<()> {
    let (mut registry, mut events) = SessionRegistry::new(Box::new(ShellSpawner::default()));
    registry.add_observer(Box::new(TerminalObserver::stdout()));
    let mut shell = Shell::new(runner, registry, cwd);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    stdout.write_all(PROMPT.as_bytes()).await?;
    stdout.flush().await?;

    loop {
        let input = tokio::select! {
            line = lines.next_line() => Input::Line(line?),
            Some(event) = events.recv() => Input::Event(event),
        };

        match input {
            Input::Event(event) => shell.handle_event(event),
            Input::Line(None) => break,
            Input::Line(Some(line)) => {
                let mut prompter = LinePrompter::new(&mut lines, tokio::io::stdout());
                match shell.execute(&line, &mut prompter).await {
                    Reply::Quit => break,
                    Reply::Text(text) => {
                        stdout.write_all(text.as_bytes()).await?;
                        if !text.ends_with('\n') {
                            stdout.write_all(b"\n").await?;
                        }
                    }
                    Reply::Done => {}
                }
                stdout.write_all(PROMPT.as_bytes()).await?;
                stdout.flush().await?;
            }
        }
    }

    tracing::info!("Shell exiting, stopping running sessions");
    Ok(())
}
