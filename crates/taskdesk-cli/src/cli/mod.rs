//! CLI entry and dispatch.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use taskdesk_core::models::TaskStatus;
use taskdesk_core::pages::TaskFilter;
use taskdesk_core::{config, logging};

mod commands;

#[derive(Parser)]
#[command(name = "taskdesk")]
#[command(version)]
#[command(about = "Terminal client for the taskdesk task API")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override the API base URL (takes precedence over TASKDESK_API_URL and config)
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Sign in with email and password (password is read from stdin)
    Login {
        /// Account email (prompted if omitted)
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account (password and confirmation are read from stdin)
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Manage tasks
    Tasks {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum TaskCommands {
    /// List tasks with per-status counts
    List {
        /// Filter: all, pending, in_progress, completed
        #[arg(long, default_value = "all")]
        status: TaskFilter,
    },
    /// Show one task
    Show {
        #[arg(value_name = "TASK_ID")]
        id: i64,
    },
    /// Create a task
    New {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        /// pending, in_progress or completed
        #[arg(long, default_value = "pending")]
        status: TaskStatus,
        /// Due date (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        due: NaiveDate,
    },
    /// Edit a task; omitted fields keep their current value
    Edit {
        #[arg(value_name = "TASK_ID")]
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long, value_name = "DATE")]
        due: Option<NaiveDate>,
    },
    /// Delete a task after confirmation
    Delete {
        #[arg(value_name = "TASK_ID")]
        id: i64,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Persist the API base URL
    SetUrl {
        #[arg(value_name = "URL")]
        url: String,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = config::Config::load().context("load config")?;
    let _log_guard = logging::init(&config).context("init logging")?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli, &config).await })
}

async fn dispatch(cli: Cli, config: &config::Config) -> Result<()> {
    let Cli { command, api_url } = cli;
    // Config commands must work even when the configured URL is broken.
    let connect = || commands::connect(config, api_url.as_deref());

    match command {
        Commands::Login { email } => commands::auth::login(&connect()?, email).await,
        Commands::Register {
            username,
            email,
            first_name,
            last_name,
        } => {
            commands::auth::register(
                &connect()?,
                commands::auth::RegisterArgs {
                    username,
                    email,
                    first_name,
                    last_name,
                },
            )
            .await
        }
        Commands::Logout => commands::auth::logout(&connect()?).await,
        Commands::Whoami => commands::auth::whoami(&connect()?).await,

        Commands::Tasks { command } => {
            let client = connect()?;
            match command {
                TaskCommands::List { status } => commands::tasks::list(&client, status).await,
                TaskCommands::Show { id } => commands::tasks::show(&client, id).await,
                TaskCommands::New {
                    title,
                    description,
                    status,
                    due,
                } => {
                    commands::tasks::create(
                        &client,
                        commands::tasks::TaskFields {
                            title: Some(title),
                            description: Some(description),
                            status: Some(status),
                            due: Some(due),
                        },
                    )
                    .await
                }
                TaskCommands::Edit {
                    id,
                    title,
                    description,
                    status,
                    due,
                } => {
                    commands::tasks::edit(
                        &client,
                        id,
                        commands::tasks::TaskFields {
                            title,
                            description,
                            status,
                            due,
                        },
                    )
                    .await
                }
                TaskCommands::Delete { id, yes } => {
                    commands::tasks::delete(&client, id, yes).await
                }
            }
        }

        Commands::Config { command } => match command {
            ConfigCommands::Path => commands::config::path(),
            ConfigCommands::Init => commands::config::init(),
            ConfigCommands::SetUrl { url } => commands::config::set_url(&url),
        },
    }
}
