mod action;
mod app;
mod components;
mod mpv;
mod player;
mod theme;
mod widgets;

use radio_core::config::Config;
use radio_core::store::FileStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = radio_core::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = data_dir.join("widget.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // RUST_LOG overrides; HTTP client internals are noisy at debug.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("nowplaying log: {}", log_path.display());
    tracing::info!("nowplaying starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("config: {:#}; using defaults", e);
            Config::default()
        }
    };

    // ── Persistent store (prefs, favorites, stats) ───────────────────────────
    if let Some(parent) = config.paths.store_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = FileStore::open(&config.paths.store_file);

    // ── Run widget ───────────────────────────────────────────────────────────
    let app = app::App::new(config, store)?;
    app.run().await
}
