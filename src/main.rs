use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tokio::sync::mpsc;

use jotter::api::{ApiClient, Session};
use jotter::app::{App, AppEvent, Backend, View};
use jotter::config::{Config, TOKEN_ENV_VAR};
use jotter::ui;

/// Get the default config file path (~/.config/jotter/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("jotter")
        .join("config.toml"))
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum StartView {
    Feed,
    Notifications,
    Search,
    Followers,
    Following,
}

impl From<StartView> for View {
    fn from(v: StartView) -> Self {
        match v {
            StartView::Feed => View::Feed,
            StartView::Notifications => View::Notifications,
            StartView::Search => View::Search,
            StartView::Followers => View::Followers,
            StartView::Following => View::Following,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "jotter", about = "Terminal client for a journaling and social-posting service")]
struct Args {
    /// Config file (default: ~/.config/jotter/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Start in search with this query, loaded immediately
    #[arg(long, value_name = "TEXT")]
    query: Option<String>,

    /// Signed-in user id (overrides `user_id` from the config file)
    #[arg(long, value_name = "ID")]
    user: Option<String>,

    /// View to open on start
    #[arg(long, value_enum, default_value_t = StartView::Feed)]
    view: StartView,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout belongs to the TUI.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let user_id = args.user.unwrap_or_else(|| config.user_id.clone());
    if user_id.trim().is_empty() {
        eprintln!("Error: no user id configured.");
        eprintln!();
        eprintln!("Set user_id in {} or pass --user <ID>.", config_path.display());
        std::process::exit(1);
    }

    let token = config.resolve_token();
    if token.is_none() {
        tracing::warn!("No API token set; authenticated endpoints will fail");
        eprintln!(
            "Warning: no API token. Set {} or api_token in the config file.",
            TOKEN_ENV_VAR
        );
    }

    let session = Session::new(user_id, token);
    let client = ApiClient::new(&config.base_url, session.clone(), config.request_timeout())
        .context("Failed to create API client")?;

    let mut app = App::new(&config, session, Backend::from(client));

    let initial = match args.query.as_deref() {
        Some(query) => app.seed_search(query),
        None => app.switch_view(args.view.into()),
    };

    let (event_tx, event_rx) = mpsc::channel::<AppEvent>(32);

    ui::run(&mut app, initial, event_tx, event_rx).await?;

    println!("Goodbye!");
    Ok(())
}
