/*
techpulse - main.rs
Console news browser: fetches top headlines, refreshes them on a timer and
stores bookmarks in a local SQLite file. Everything runs on one thread.
*/

use anyhow::Result;
use clap::Parser;
use common::Config;
use std::path::PathBuf;
use tokio::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use techpulse::app::{App, AppState};
use techpulse::bookmarks::BookmarkStore;
use techpulse::console::{self, ConsoleSurface};
use techpulse::news::{self, NewsClient, NewsQuery};
use techpulse::opener::SystemOpener;

const DEFAULT_DB_PATH: &str = "bookmarks.db";
const DEFAULT_REFRESH_SECONDS: u64 = 60;

#[derive(Parser, Debug)]
#[command(name = "techpulse", about = "TechPulse - tech news in the terminal")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Bookmark database file (overrides [database] path)
    #[arg(long, value_name = "FILE")]
    db: Option<String>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so they do not interleave with the headline list.
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    if let Err(e) = dotenv::dotenv() {
        info!("no .env loaded: {}", e);
    }

    let default_path = PathBuf::from("config.default.toml");
    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let config = Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await?;
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    let news_config = config.news.clone().unwrap_or_default();

    let api_url = news_config
        .api_url
        .clone()
        .unwrap_or_else(|| news::DEFAULT_API_URL.to_string());
    common::parse_endpoint(&api_url)?;

    let api_key_env = news_config
        .api_key_env
        .as_deref()
        .unwrap_or(news::DEFAULT_API_KEY_ENV);
    let api_key = match common::api_key_from_env(api_key_env) {
        Ok(key) => key,
        Err(e) => {
            warn!("{}; requests will be rejected by the news endpoint", e);
            String::new()
        }
    };
    let news_client = NewsClient::new(&api_url, api_key, news_config.timeout_seconds)?;

    let defaults = NewsQuery::default();
    let filters = NewsQuery {
        category: news_config.category.clone().unwrap_or(defaults.category),
        search: String::new(),
        source: news_config.source.clone().unwrap_or(defaults.source),
        language: news_config.language.clone().unwrap_or(defaults.language),
    };

    let db_path = args
        .db
        .or_else(|| config.database.as_ref().map(|d| d.path.clone()))
        .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
    let bookmarks = match BookmarkStore::open(&db_path).await {
        Ok(store) => store,
        Err(e) => {
            error!(%e, db_path = %db_path, "failed to open bookmark database");
            return Err(e);
        }
    };
    info!(db_path = %db_path, "bookmark database ready");

    let refresh_every = Duration::from_secs(
        news_config
            .refresh_seconds
            .unwrap_or(DEFAULT_REFRESH_SECONDS)
            .max(1),
    );

    println!("TechPulse - Tech News App (type 'help' for commands)");
    let mut app = App::new(
        AppState::new(filters),
        ConsoleSurface::new(std::io::stdout()),
        news_client,
        bookmarks,
        Box::new(SystemOpener),
    );

    console::run(&mut app, refresh_every).await?;

    info!("Shutdown complete");
    Ok(())
}
