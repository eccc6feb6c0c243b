use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use jestrun::locator::{self, Location, ParsedSource};
use jestrun::prompt::{AutoPrompter, LinePrompter, Prompter};
use jestrun::runner::{Action, Runner};
use jestrun::session::{Launch, SessionEvent, SessionRegistry, ShellSpawner};
use jestrun::shell::{self, TerminalObserver};
use jestrun::Result;

#[derive(Debug, Parser)]
#[command(name = "jestrun", version, about = "Run the Jest test under the cursor")]
struct Cli {
    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the name of the test enclosing FILE:LINE[:COL]
    Locate { location: Location },
    /// Print the command an action would run
    Command {
        #[command(subcommand)]
        action: Action,
    },
    /// Run an action and exit with the test process's status
    Run {
        #[command(subcommand)]
        action: Action,
    },
    /// Interactive shell keeping sessions between runs
    Shell,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cwd = std::env::current_dir()?;
    match cli.command {
        Command::Locate { location } => locate(&location),
        Command::Command { action } => {
            let prepared = Runner::new().prepare(&action, &cwd)?;
            println!("{}", prepared.command);
            Ok(())
        }
        Command::Run { action } => {
            let force = action.options().force;
            let launch = Runner::new().prepare(&action, &cwd)?.into_launch(None, force);
            let code = if launch.edit {
                let mut lines = BufReader::new(tokio::io::stdin()).lines();
                run_once(launch, &mut LinePrompter::new(&mut lines, tokio::io::stdout())).await?
            } else {
                run_once(launch, &mut AutoPrompter { confirm: true }).await?
            };
            std::process::exit(code);
        }
        Command::Shell => shell::run_interactive(Runner::new(), cwd).await,
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "jestrun=warn",
        1 => "jestrun=info",
        2 => "jestrun=debug",
        _ => "jestrun=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn locate(location: &Location) -> Result<()> {
    let name = ParsedSource::read(&location.file)?.and_then(|source| {
        location
            .char_offset(source.text())
            .and_then(|offset| locator::nearest_test_name(&source, offset))
    });
    match name {
        Some(name) => {
            println!("{}", name);
            Ok(())
        }
        None => {
            eprintln!("No test at {}:{}", location.file.display(), location.line);
            std::process::exit(1);
        }
    }
}

/// Launch, stream output until the process exits, return its exit code.
async fn run_once<P: Prompter>(launch: Launch, prompter: &mut P) -> Result<i32> {
    let (mut registry, mut events) = SessionRegistry::new(Box::new(ShellSpawner::default()));
    registry.add_observer(Box::new(TerminalObserver::stdout()));

    let name = match registry.launch(launch, prompter).await {
        Ok(name) => name,
        Err(e) if e.is_cancelled() => {
            tracing::info!("{}", e);
            return Ok(1);
        }
        Err(e) => return Err(e),
    };

    while let Some(event) = events.recv().await {
        let exited = matches!(event, SessionEvent::Exited { .. });
        registry.handle_event(event);
        if exited {
            break;
        }
    }
    Ok(registry
        .session(&name)
        .and_then(|session| session.last_status())
        .unwrap_or(1))
}
