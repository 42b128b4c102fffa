//! `plinth-manage`: database and account management for a Plinth deployment.

mod demo;
mod manage;
mod setup;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use plinth_db::DbPool;
use plinth_server::config::{self, Config};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "plinth-manage", about = "Manage a Plinth API deployment", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, env = "PLINTH_CONFIG_PATH", default_value = "plinth.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Default)]
struct AccountArgs {
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    password: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database schema.
    InitDb,
    /// Create an administrator account.
    CreateAdmin {
        #[command(flatten)]
        account: AccountArgs,
    },
    /// Create a regular user account.
    CreateUser {
        #[command(flatten)]
        account: AccountArgs,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    /// List all users.
    ListUsers,
    /// List all posts.
    ListPosts,
    /// Create `.env` from `env.example` and initialize the database.
    Setup {
        /// Project directory holding `env.example`.
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Exercise every endpoint of a running server.
    Demo {
        #[arg(long, default_value = "http://localhost:8000")]
        base_url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::InitDb => {
            let config = load(&cli.config)?;
            manage::init_db(&config, &mut out)?;
        }
        Command::CreateAdmin { account } => {
            let pool = open(&cli.config)?;
            let conn = pool.get()?;
            let account = account.into_input(None, None);
            manage::create_admin(&conn, account, &mut input, &mut out)?;
        }
        Command::CreateUser {
            account,
            first_name,
            last_name,
        } => {
            let pool = open(&cli.config)?;
            let conn = pool.get()?;
            let account = account.into_input(first_name, last_name);
            manage::create_user(&conn, account, &mut input, &mut out)?;
        }
        Command::ListUsers => {
            let pool = open(&cli.config)?;
            let conn = pool.get()?;
            manage::write_users(&plinth_models::list_users(&conn)?, &mut out)?;
        }
        Command::ListPosts => {
            let pool = open(&cli.config)?;
            let conn = pool.get()?;
            manage::write_posts(&plinth_models::list_posts(&conn)?, &mut out)?;
        }
        Command::Setup { dir } => {
            // `.env` must be in the environment before configuration is read.
            let status = setup::ensure_env_file(&dir)?;
            setup::report_env_file(status, &mut out)?;
            if status == setup::EnvFileStatus::Created {
                let path = dir.join(setup::ENV_FILE);
                dotenvy::from_path(&path)
                    .with_context(|| format!("failed to load {}", path.display()))?;
            }
            let config = load(&cli.config)?;
            manage::init_db(&config, &mut out)?;
            setup::write_next_steps(&mut out)?;
        }
        Command::Demo { base_url } => {
            init_logging("warn");
            demo::run(&base_url, &mut out).await?;
        }
    }

    out.flush()?;
    Ok(())
}

impl AccountArgs {
    fn into_input(self, first_name: Option<String>, last_name: Option<String>) -> manage::AccountInput {
        manage::AccountInput {
            username: self.username,
            email: self.email,
            password: self.password,
            first_name,
            last_name,
        }
    }
}

fn open(config_path: &str) -> anyhow::Result<DbPool> {
    let config = load(config_path)?;
    plinth_server::open_database(&config).context("failed to open database")
}

/// Loads configuration and installs a stderr logger at the configured level.
fn load(path: &str) -> anyhow::Result<Config> {
    let config = config::load_config(Some(path)).context("failed to load configuration")?;
    init_logging(&config.logging.level);
    Ok(config)
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
