//! Backup-first chat with a remote model.
//!
//! Every prompt and every accepted proposal is preceded by a snapshot of the
//! workspace folders under the backup root.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use backstop::exit_codes;
use backstop::io::backup::list_backups;
use backstop::io::config::{BackstopConfig, load_config, write_config};
use backstop::io::credentials::{StoredCredentials, store_secret};
use backstop::io::paths::AppPaths;
use backstop::io::remote::ChatCompletionClient;
use backstop::io::workspace::StaticRoots;
use backstop::logging;
use backstop::session::{ApplySignal, BackupSignal, Orchestrator, SubmitSignal};
use backstop::shell::{self, HELP, ShellCommand, parse_line};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

type CliOrchestrator = Orchestrator<StoredCredentials, ChatCompletionClient, StaticRoots>;

#[derive(Parser)]
#[command(
    name = "backstop",
    version,
    about = "Chat with a remote model, backing up the workspace before every step"
)]
struct Cli {
    /// Config file (defaults to the platform config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Workspace folder to back up. Repeatable; defaults to the current directory.
    #[arg(long = "workspace", global = true)]
    workspaces: Vec<PathBuf>,

    /// Backup root, overriding the config file.
    #[arg(long, global = true)]
    backup_root: Option<PathBuf>,

    /// Raise tracing verbosity on stderr (-v info, -vv debug). `RUST_LOG` wins when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive session: type prompts, `:apply` to accept, `:help` for more.
    Chat,
    /// Send one prompt and print the proposal.
    Ask {
        prompt: String,
        /// Back up again and accept the proposal.
        #[arg(long)]
        apply: bool,
    },
    /// Back up the workspace now.
    Backup,
    /// List backup folders under the backup root.
    Backups,
    /// Store the API key read from stdin.
    Login,
    /// Write the default config file.
    Init {
        /// Overwrite an existing config file.
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let paths = AppPaths::resolve(cli.config.as_deref())?;
    debug!(config = %paths.config_path.display(), "resolved config path");
    match cli.command {
        Command::Init { force } => cmd_init(&paths, force),
        Command::Login => cmd_login(&paths).await,
        Command::Backups => {
            let config = load_config(&paths.config_path)?;
            cmd_backups(&backup_root(&config, cli.backup_root)?)
        }
        Command::Backup => {
            let orch = build_orchestrator(&paths, cli.workspaces, cli.backup_root)?;
            cmd_backup(&orch).await
        }
        Command::Ask { prompt, apply } => {
            let orch = build_orchestrator(&paths, cli.workspaces, cli.backup_root)?;
            cmd_ask(&orch, &prompt, apply).await
        }
        Command::Chat => {
            let orch = build_orchestrator(&paths, cli.workspaces, cli.backup_root)?;
            cmd_chat(&orch).await
        }
    }
}

fn build_orchestrator(
    paths: &AppPaths,
    workspaces: Vec<PathBuf>,
    backup_root_override: Option<PathBuf>,
) -> Result<CliOrchestrator> {
    let config = load_config(&paths.config_path)?;
    let backup_root = backup_root(&config, backup_root_override)?;
    let credentials = StoredCredentials::new(&config.remote.api_key_env, &paths.secret_path);
    let remote = ChatCompletionClient::new(&config.remote)?;
    let workspace = StaticRoots::from_paths(workspace_dirs(workspaces)?);
    Ok(Orchestrator::new(credentials, remote, workspace, backup_root))
}

/// Backup root from the flag or the config, resolved against the current directory.
fn backup_root(config: &BackstopConfig, explicit: Option<PathBuf>) -> Result<PathBuf> {
    let root = match explicit {
        Some(path) => path,
        None => config.backup_root()?,
    };
    std::path::absolute(&root).with_context(|| format!("resolve {}", root.display()))
}

/// Canonical workspace folders; the current directory when none are given.
fn workspace_dirs(workspaces: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    let workspaces = if workspaces.is_empty() {
        vec![std::env::current_dir().context("read current directory")?]
    } else {
        workspaces
    };
    // A folder that does not exist keeps its given path and is skipped at backup time.
    Ok(workspaces
        .into_iter()
        .map(|path| path.canonicalize().unwrap_or(path))
        .collect())
}

fn cmd_init(paths: &AppPaths, force: bool) -> Result<i32> {
    if !force && paths.config_path.exists() {
        bail!(
            "{} already exists (use --force to overwrite)",
            paths.config_path.display()
        );
    }
    write_config(&paths.config_path, &BackstopConfig::default())?;
    println!("{}", paths.config_path.display());
    Ok(exit_codes::OK)
}

async fn cmd_login(paths: &AppPaths) -> Result<i32> {
    eprint!("API key: ");
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("read API key from stdin")?;
    store_secret(&paths.secret_path, &line)?;
    println!("stored API key in {}", paths.secret_path.display());
    Ok(exit_codes::OK)
}

fn cmd_backups(backup_root: &Path) -> Result<i32> {
    for name in list_backups(backup_root)? {
        println!("{name}");
    }
    Ok(exit_codes::OK)
}

async fn cmd_backup(orch: &CliOrchestrator) -> Result<i32> {
    let signal = orch.manual_backup().await;
    println!("{}", shell::render_backup(&signal));
    Ok(match signal {
        BackupSignal::Done(report) if report.is_partial() => exit_codes::INVALID,
        BackupSignal::Done(_) => exit_codes::OK,
        BackupSignal::NoWorkspace => exit_codes::NO_WORKSPACE,
        BackupSignal::Busy | BackupSignal::Failed { .. } => exit_codes::INVALID,
    })
}

async fn cmd_ask(orch: &CliOrchestrator, prompt: &str, apply: bool) -> Result<i32> {
    let signal = orch.submit_prompt(prompt).await;
    let code = submit_exit_code(&signal);
    match &signal {
        SubmitSignal::ProposalReady { response } => println!("{response}"),
        other => eprintln!("{}", shell::render_submit(other)),
    }
    if code != exit_codes::OK || !apply {
        return Ok(code);
    }
    let applied = orch.request_apply().await;
    eprintln!("{}", shell::render_apply(&applied));
    Ok(match applied {
        ApplySignal::Applied { .. } => exit_codes::OK,
        ApplySignal::NotReady | ApplySignal::Failed { .. } => exit_codes::INVALID,
    })
}

fn submit_exit_code(signal: &SubmitSignal) -> i32 {
    match signal {
        SubmitSignal::ProposalReady { .. } => exit_codes::OK,
        SubmitSignal::NoWorkspace => exit_codes::NO_WORKSPACE,
        SubmitSignal::NoCredential => exit_codes::NO_CREDENTIAL,
        SubmitSignal::Busy | SubmitSignal::Failed { .. } => exit_codes::INVALID,
    }
}

async fn cmd_chat(orch: &CliOrchestrator) -> Result<i32> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    write_out(
        &mut stdout,
        &format!("Backups go to {}\n{HELP}\n", orch.backup_root().display()),
    )
    .await?;
    loop {
        write_out(&mut stdout, "> ").await?;
        let Some(line) = lines.next_line().await.context("read stdin")? else {
            break;
        };
        let reply = match parse_line(&line) {
            ShellCommand::Empty => continue,
            ShellCommand::Quit => break,
            ShellCommand::Help => HELP.to_string(),
            ShellCommand::Unknown(command) => {
                format!("Unknown command :{command} (try :help)")
            }
            ShellCommand::Event(event) => shell::render(&orch.handle(event).await),
        };
        write_out(&mut stdout, &format!("{reply}\n")).await?;
    }
    Ok(exit_codes::OK)
}

async fn write_out(stdout: &mut tokio::io::Stdout, text: &str) -> Result<()> {
    stdout
        .write_all(text.as_bytes())
        .await
        .context("write stdout")?;
    stdout.flush().await.context("flush stdout")
}
