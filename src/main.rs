use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use secrecy::{ExposeSecret, SecretString};
use tracing_subscriber::EnvFilter;

use tutor_gateway::api::ApiServerBuilder;
use tutor_gateway::chat::{MemorySessionStore, TruncateToTail};
use tutor_gateway::db::{self, InteractionRepo, Role, UserRepo};
use tutor_gateway::{ChatManager, Config, JwtIdentityProvider, OpenAiCompatClient};

/// Tutor - DSA tutoring chat gateway
#[derive(Parser)]
#[command(name = "tutor", version, about)]
struct Cli {
    /// Port to listen on (overrides TUTOR_PORT and the config file)
    #[arg(long)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Manage the local user directory
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Print a user's stored chat interactions, newest first
    History {
        user_id: String,
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Mint a bearer token for a user (local development)
    Token {
        user_id: String,
        /// Lifetime in seconds
        #[arg(long, default_value = "86400")]
        ttl: u64,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Add a user, or change an existing user's role
    Add {
        id: String,
        #[arg(long, value_enum, default_value = "user")]
        role: RoleArg,
    },
    /// List users
    List,
    /// Remove a user
    Remove { id: String },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum RoleArg {
    User,
    Admin,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::User => Self::User,
            RoleArg::Admin => Self::Admin,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,tutor_gateway=info",
        1 => "info,tutor_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(port) = cli.port {
        config.api_server.port = port;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::User { action } => manage_users(&config, action),
        Command::History { user_id, limit } => print_history(&config, &user_id, limit),
        Command::Token { user_id, ttl } => mint_token(&config, &user_id, ttl),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::init(config.db_path())?;

    let api_key = SecretString::from(config.require_api_key()?.expose_secret().to_owned());
    let completion =
        OpenAiCompatClient::new(&config.llm.base_url, api_key, config.llm.model.clone())?;
    let identity =
        JwtIdentityProvider::new(config.require_jwt_secret()?, config.auth.issuer.clone())?;

    let store = MemorySessionStore::new(config.chat.session_ttl, config.chat.max_sessions);
    let policy = TruncateToTail::new(config.chat.token_threshold, config.chat.keep_messages);
    let chat = ChatManager::new(
        Arc::new(store),
        Arc::new(completion),
        Arc::new(InteractionRepo::new(pool.clone())),
    )
    .with_policy(Arc::new(policy))
    .with_timeout(config.llm.timeout);

    tracing::info!(
        port = config.api_server.port,
        model = %config.llm.model,
        token_threshold = config.chat.token_threshold,
        "starting tutor gateway"
    );

    ApiServerBuilder::new(pool, Arc::new(chat), Arc::new(identity), config.api_server.port)
        .chat_rate_limit(config.chat.requests_per_minute)
        .build()
        .run()
        .await?;

    Ok(())
}

fn manage_users(config: &Config, action: UserAction) -> anyhow::Result<()> {
    let users = UserRepo::new(db::init(config.db_path())?);

    match action {
        UserAction::Add { id, role } => {
            let user = users.upsert(&id, role.into())?;
            println!("{} ({})", user.id, user.role);
        }
        UserAction::List => {
            let all = users.list_all()?;
            if all.is_empty() {
                println!("No users");
            }
            for user in all {
                println!("{}\t{}\t{}", user.id, user.role, user.created_at.to_rfc3339());
            }
        }
        UserAction::Remove { id } => {
            if users.delete(&id)? {
                println!("Removed {id}");
            } else {
                println!("No user {id}");
            }
        }
    }

    Ok(())
}

fn print_history(config: &Config, user_id: &str, limit: usize) -> anyhow::Result<()> {
    let interactions = InteractionRepo::new(db::init(config.db_path())?);

    let entries = interactions.list_for_user(user_id, limit)?;
    if entries.is_empty() {
        println!("No interactions for {user_id}");
    }
    for entry in entries {
        println!("[{}] {}", entry.timestamp.to_rfc3339(), entry.id);
        println!("  Q: {}", entry.query);
        println!("  A: {}\n", entry.reply);
    }

    Ok(())
}

fn mint_token(config: &Config, user_id: &str, ttl: u64) -> anyhow::Result<()> {
    let identity =
        JwtIdentityProvider::new(config.require_jwt_secret()?, config.auth.issuer.clone())?;
    println!("{}", identity.issue(user_id, ttl)?);
    Ok(())
}
