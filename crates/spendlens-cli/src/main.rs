use anyhow::Result;
use clap::{Parser, Subcommand};
use spendlens_application::ClientContext;
use spendlens_infrastructure::SpendLensPaths;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "spendlens")]
#[command(about = "SpendLens CLI - upload invoices and analyze your spending", long_about = None)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding config.toml and credentials.toml
    #[arg(long, global = true, env = "SPENDLENS_HOME")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session credentials
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "SPENDLENS_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Log out and forget the stored credentials
    Logout,
    /// Show whether a session is stored
    Status,
    /// Create an account with an invitation code
    Register {
        #[arg(long)]
        invitation_code: String,
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(short, long, env = "SPENDLENS_PASSWORD", hide_env_values = true)]
        password: String,
        /// Log in right after registering
        #[arg(long)]
        login: bool,
    },
    /// Check an invitation code
    Invite { code: String },
    /// Upload an invoice (PDF, JPG, JPEG or PNG)
    Upload { path: PathBuf },
    /// Analyze the uploaded invoices
    Analyze {
        /// Print the normalized analysis as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or edit the account profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Manage config.toml
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Print the current profile
    Show,
    /// Change profile fields; omitted fields keep their value
    Update {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        avatar_url: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default config.toml if none exists
    Init,
    /// Print the effective configuration
    Show,
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "spendlens=debug" } else { "spendlens=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let paths = SpendLensPaths::new(cli.config_dir.as_deref());
    tracing::debug!(config_dir = ?cli.config_dir, "Starting spendlens");

    if let Commands::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => commands::config::init(&paths),
            ConfigAction::Show => commands::config::show(&paths),
        };
    }

    let ctx = ClientContext::from_paths(&paths)?;

    match cli.command {
        Commands::Login { username, password } => {
            commands::auth::login(&ctx, &username, &password).await?
        }
        Commands::Logout => commands::auth::logout(&ctx)?,
        Commands::Status => commands::auth::status(&ctx),
        Commands::Register {
            invitation_code,
            username,
            email,
            first_name,
            last_name,
            password,
            login,
        } => {
            let form = commands::auth::registration_form(
                invitation_code,
                username,
                email,
                first_name,
                last_name,
                password,
            );
            commands::auth::register(&ctx, &form, login).await?
        }
        Commands::Invite { code } => commands::invite::check(&ctx, &code).await?,
        Commands::Upload { path } => commands::upload::run(&ctx, &path).await?,
        Commands::Analyze { json } => commands::analyze::run(&ctx, json).await?,
        Commands::Profile { action } => match action {
            ProfileAction::Show => commands::profile::show(&ctx).await?,
            ProfileAction::Update {
                username,
                email,
                first_name,
                last_name,
                bio,
                avatar_url,
            } => {
                let changes = commands::profile::ProfileChanges {
                    username,
                    email,
                    first_name,
                    last_name,
                    bio,
                    avatar_url,
                };
                commands::profile::update(&ctx, changes).await?
            }
        },
        Commands::Config { .. } => {}
    }

    Ok(())
}
