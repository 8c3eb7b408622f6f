use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rally_session::oauth::{self, AbsorbOutcome, History, MemoryHistory, OAuth2CallbackAbsorber};
use rally_session::storage::{FileBackend, MemoryBackend};
use rally_session::{ConnectivitySignal, SessionConfig, SessionError, SessionManager, Slot, TokenStore};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use url::Url;

const SESSION_FILE: &str = "session.json";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("not logged in; run `rally-session login` first")]
    NotAuthenticated,
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "rally-session", about = "Rally backend session client")]
struct Cli {
    /// Overrides `RALLY_BACKEND_URL` from the session config.
    #[arg(long)]
    backend_url: Option<String>,

    #[arg(long, env = "RALLY_STATE_DIR", default_value = ".rally-session")]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "RALLY_PASSWORD")]
        password: String,
        /// Keep the credential for this process only.
        #[arg(long, default_value_t = false)]
        ephemeral: bool,
    },
    Validate,
    Whoami,
    Expiry,
    Refresh,
    Logout,
    /// Consume an identity-provider redirect URL.
    Absorb { url: String },
    LoginUrl,
    /// Run the background validator and print every session change.
    /// Type `online` / `offline` on stdin to simulate connectivity changes.
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = SessionConfig::from_env()?;
    if let Some(url) = &cli.backend_url {
        config = config.with_backend_url(url)?;
    }

    let durable = FileBackend::new(cli.state_dir.join(SESSION_FILE));
    tracing::debug!(path = %durable.path().display(), "durable session slot");
    let store = TokenStore::new(Arc::new(durable), Arc::new(MemoryBackend::new()));
    let manager = SessionManager::from_config(config, store)?;

    match cli.command {
        Command::Login { email, password, ephemeral } => run_login(&manager, &email, &password, ephemeral).await,
        Command::Validate => run_validate(&manager).await,
        Command::Whoami => run_whoami(&manager).await,
        Command::Expiry => run_expiry(&manager),
        Command::Refresh => run_refresh(&manager).await,
        Command::Logout => {
            manager.logout().await;
            println!("logged out");
            Ok(())
        }
        Command::Absorb { url } => run_absorb(&manager, &url).await,
        Command::LoginUrl => {
            println!("{}", oauth::google_login_url(manager.gateway()).await?);
            Ok(())
        }
        Command::Watch => run_watch(&manager).await,
    }
}

async fn run_login(manager: &SessionManager, email: &str, password: &str, ephemeral: bool) -> Result<(), CliError> {
    let user = manager.login(email, password).await?;
    if ephemeral {
        if let Some(token) = manager.store().get_token() {
            manager.store().set_token(&token, Slot::Ephemeral)?;
        }
    }
    eprintln!("logged in as {}", user.display_name());
    print_json(&serde_json::to_value(&user)?)
}

async fn run_validate(manager: &SessionManager) -> Result<(), CliError> {
    if !manager.bootstrap_validate().await {
        return Err(CliError::NotAuthenticated);
    }
    println!("valid");
    Ok(())
}

async fn run_whoami(manager: &SessionManager) -> Result<(), CliError> {
    if !manager.bootstrap_validate().await {
        return Err(CliError::NotAuthenticated);
    }
    manager.refresh_user_data().await?;
    let user = manager.session().user.ok_or(CliError::NotAuthenticated)?;
    print_json(&serde_json::to_value(&user)?)
}

fn run_expiry(manager: &SessionManager) -> Result<(), CliError> {
    let claims = manager.claims().ok_or(CliError::NotAuthenticated)?;
    let body = serde_json::json!({
        "email": claims.email,
        "minutesRemaining": manager.minutes_until_expiration(),
        "expired": manager.is_token_expired(),
        "warn": manager.should_warn_expiration(),
    });
    print_json(&body)
}

async fn run_refresh(manager: &SessionManager) -> Result<(), CliError> {
    if !manager.refresh_token().await {
        return Err(CliError::NotAuthenticated);
    }
    println!("refreshed");
    Ok(())
}

async fn run_absorb(manager: &SessionManager, raw: &str) -> Result<(), CliError> {
    let history = Arc::new(MemoryHistory::new(Url::parse(raw)?));
    let absorber = OAuth2CallbackAbsorber::new(manager.clone(), history.clone());
    match absorber.absorb().await? {
        AbsorbOutcome::NotACallback => eprintln!("no identity provider callback in url"),
        AbsorbOutcome::Absorbed { authenticated } => {
            eprintln!("callback absorbed; authenticated: {authenticated}");
        }
    }
    println!("{}", history.current_url());
    Ok(())
}

async fn run_watch(manager: &SessionManager) -> Result<(), CliError> {
    let (tx, rx) = mpsc::channel(8);
    let _signals = manager.network().attach(rx);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let signal = match line.trim() {
                "online" => ConnectivitySignal::Online,
                "offline" => ConnectivitySignal::Offline,
                other => {
                    eprintln!("unknown signal: {other}");
                    continue;
                }
            };
            if tx.send(signal).await.is_err() {
                break;
            }
        }
    });

    let mut sessions = manager.subscribe();
    let _monitor = manager.spawn_monitor();
    manager.bootstrap_validate().await;

    loop {
        let session = sessions.borrow_and_update().clone();
        let name = session.user.as_ref().map(rally_session::User::display_name).unwrap_or_default();
        println!("{:?} {name}", session.status);
        tokio::select! {
            changed = sessions.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                return Ok(());
            }
        }
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
