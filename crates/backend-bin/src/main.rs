use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use backend_lib::{
    config::{Settings, DEFAULT_CONFIG_FILE},
    create_router,
    mail::mailer_from_settings,
    storage::{MemoryStorage, PgStorage, Storage},
    AppState,
};
use clap::{Parser, ValueEnum};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Sweep interval for expired sessions and stale login lockouts
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Plain,
    Json,
}

/// Toolroom inventory server
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Listen address, overrides `bind_addr`
    #[arg(long)]
    bind: Option<SocketAddr>,

    #[arg(long, value_enum, default_value = "plain")]
    log_format: LogFormat,
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Plain => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn serve<S: Storage>(storage: S, settings: Settings) -> anyhow::Result<()> {
    let mailer = mailer_from_settings(&settings.mail)?;
    let bind_addr = settings.bind_addr;
    let state = Arc::new(AppState::new(storage, settings, mailer));

    state.sessions.spawn_cleanup_task(CLEANUP_INTERVAL);
    state.auth_rate_limiter.spawn_cleanup_task(CLEANUP_INTERVAL);

    let app = create_router(state);
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    info!(%bind_addr, "listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(bind) = cli.bind {
        settings.bind_addr = bind;
    }

    init_tracing(&settings.log_level, cli.log_format);

    if settings.database.url.is_some() {
        let storage = PgStorage::connect(&settings.database).await?;
        storage.migrate().await?;
        info!("connected to postgres, migrations applied");
        serve(storage, settings).await
    } else {
        warn!("database.url not set, using in-memory storage; data is lost on exit");
        serve(MemoryStorage::new(), settings).await
    }
}
