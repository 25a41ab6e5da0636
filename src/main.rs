use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware, web, App, HttpServer};
use clap::Parser;
use tokio::sync::watch;

use calendarbot_lite::app_state::AppState;
use calendarbot_lite::config::Settings;
use calendarbot_lite::event_window::EventWindow;
use calendarbot_lite::health::HealthTracker;
use calendarbot_lite::morning_summary::MorningSummaryAnalyzer;
use calendarbot_lite::refresh::{FullEventCache, RefreshPipeline};
use calendarbot_lite::routes;
use calendarbot_lite::skip_store::SkipStore;
use calendarbot_lite::time_source::{Clock, SystemClock};

#[derive(Parser, Debug)]
#[command(name = "calendarbot-lite")]
struct Cli {
    /// Explicit config file path, overriding the default search.
    #[arg(long)]
    config: Option<String>,

    /// Overrides server_bind/server_port, e.g. "127.0.0.1:9000".
    #[arg(long)]
    bind: Option<String>,
}

fn skip_store_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("calendarbot")
        .join("skipped.json")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref()).map_err(|e| {
        eprintln!("fatal: failed to load configuration: {e:#}");
        e
    })?;

    if let Some(bind) = &cli.bind {
        if let Some((host, port)) = bind.rsplit_once(':') {
            settings.server_bind = host.to_string();
            if let Ok(port) = port.parse() {
                settings.server_port = port;
            }
        }
    }

    env_logger::init_from_env(
        env_logger::Env::new().default_filter_or(settings.log_level.to_lowercase()),
    );

    log::info!("starting calendarbot-lite");
    log::info!("binding http on {}", settings.bind_addr());

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let now = clock.now_utc();

    let skip_store = Arc::new(SkipStore::new(skip_store_path(), Box::new(SystemClock)));
    skip_store.load().await;

    let window = Arc::new(EventWindow::new());
    let full_cache = Arc::new(FullEventCache::new());
    let health = Arc::new(HealthTracker::new(now));
    let morning_summary = Arc::new(MorningSummaryAnalyzer::new());

    let refresh = Arc::new(RefreshPipeline::new(
        settings.clone(),
        window.clone(),
        full_cache.clone(),
        health.clone(),
        skip_store.clone(),
        clock.clone(),
    ));

    let app_state = AppState {
        settings: settings.clone(),
        window,
        full_cache,
        health,
        skip_store,
        clock,
        refresh: refresh.clone(),
        morning_summary,
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let refresh_task = {
        let refresh = refresh.clone();
        tokio::spawn(async move {
            refresh.run_loop(shutdown_rx).await;
        })
    };

    let bind_addr = settings.bind_addr();
    let http_server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .configure(routes::configure)
    })
    .bind(&bind_addr)
    .map_err(|e| {
        log::error!("failed to bind {bind_addr}: {e}");
        e
    })?
    .shutdown_timeout(10)
    .run();

    let http_handle = http_server.handle();
    let http_task = tokio::spawn(http_server);

    shutdown_signal().await;
    log::info!("shutdown signal received");

    let _ = shutdown_tx.send(true);
    let _ = tokio::time::timeout(Duration::from_secs(10), refresh_task).await;

    let stop_fut = http_handle.stop(true);
    let _ = tokio::time::timeout(Duration::from_secs(10), stop_fut).await;
    let _ = http_task.await;

    log::info!("calendarbot-lite stopped");
    Ok(())
}
