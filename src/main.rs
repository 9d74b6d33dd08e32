use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use release_workflow::app::{AppState, Environment};
use release_workflow::config::AppConfig;
use release_workflow::driver::{self, StopReason};
use release_workflow::report::{self, StatusReport};
use release_workflow::shutdown::StopSignal;
use release_workflow::workflow::ReleaseIntents;

#[derive(Parser)]
#[command(
    name = "release-workflow",
    about = "Step-gated release workflow: branch, PR, merge, tag and changelog sync"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Repository root to use instead of the current directory
    #[arg(long, global = true)]
    repo: Option<PathBuf>,

    /// GitHub token for this session only
    #[arg(long, global = true)]
    token: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect the repository and show status, issues and step gates
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Drive the release workflow from the next incomplete step
    Release(ReleaseArgs),
    /// Manage the GitHub token stored in the OS keychain
    Token {
        #[command(subcommand)]
        command: TokenCommand,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum TokenCommand {
    Save { token: String },
    Clear,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,
}

#[derive(Args)]
struct ReleaseArgs {
    /// Feature branch to create for local changes
    #[arg(long)]
    branch: Option<String>,
    #[arg(long)]
    commit_message: Option<String>,
    #[arg(long)]
    pr_title: Option<String>,
    #[arg(long)]
    pr_body: Option<String>,
    /// New release number, with or without a leading `v`
    #[arg(long)]
    version: Option<String>,
    /// VERSION already names the release; skip writing it
    #[arg(long)]
    existing_release: bool,
    /// Stage tracked files only
    #[arg(long)]
    tracked_only: bool,
    /// Run the changelog sync without GitHub data
    #[arg(long)]
    no_github: bool,
    /// Run the changelog sync without writing
    #[arg(long)]
    dry_run: bool,
    /// Carry local changes through the branch steps
    #[arg(long)]
    acknowledge_dirty: bool,
}

impl ReleaseArgs {
    fn intents(&self) -> ReleaseIntents {
        ReleaseIntents {
            branch_name: self.branch.clone().unwrap_or_default(),
            commit_message: self.commit_message.clone().unwrap_or_default(),
            pr_title: self.pr_title.clone().unwrap_or_default(),
            pr_body: self.pr_body.clone().unwrap_or_default(),
            new_version: self.version.clone().unwrap_or_default(),
            include_untracked: !self.tracked_only,
            is_new_release: !self.existing_release,
            include_github_data: !self.no_github,
            dry_run: self.dry_run,
            dirty_workspace_acknowledged: self.acknowledge_dirty,
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(repo) = cli.repo {
        config.repository.root_override = Some(repo);
    }
    if let Some(token) = cli.token {
        config.github.token = Some(token);
    }

    if let Command::Config {
        command: ConfigCommand::Show,
    } = &cli.command
    {
        print!("{}", config.to_redacted_toml()?);
        return Ok(());
    }

    let env = Environment::capture(&config);
    let state = AppState::new(config, env)?;

    match cli.command {
        Command::Status { json } => {
            let dispatcher = state.dispatcher(ReleaseIntents::default()).await?;
            let snapshot = dispatcher.snapshot();
            let status = StatusReport::new(&snapshot, dispatcher.state());
            if json {
                println!("{}", status.to_json()?);
            } else {
                print!("{}", status.render());
            }
        }
        Command::Release(args) => {
            let mut dispatcher = state.dispatcher(args.intents()).await?;
            tracing::info!(step = ?dispatcher.active_step(), "Starting release run");

            let stop = StopSignal::listen();
            let run = driver::drive(&mut dispatcher, &stop, |outcome| {
                println!("{}", report::outcome_line(outcome));
            })
            .await;

            if let Some(output) = &dispatcher.state().last_output {
                println!("\n{output}");
            }
            println!("{}", report::run_summary(&run));
            if let StopReason::Failed(failure) = run.stop {
                anyhow::bail!("{}", failure.message);
            }
        }
        Command::Token { command } => match command {
            TokenCommand::Save { token } => {
                state.tokens.save_to_store(&token)?;
                println!("Token saved to keychain.");
            }
            TokenCommand::Clear => {
                state.tokens.clear_store()?;
                println!("Token removed from keychain.");
            }
        },
        Command::Config { .. } => {}
    }

    Ok(())
}
