mod config;
mod detector;
mod event;
mod obs;
mod paths;
mod resolver;
mod status;
mod tagger;
mod transition_log;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info, warn};

use crate::config::ConfigurationProvider;
use crate::event::DaemonEvent;
use crate::resolver::HttpResolver;
use crate::tagger::SceneTagger;

/// Logs game start/end timestamps from OBS scene changes.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Config file. Defaults to `config.toml` in the per-user scenetag directory.
    #[arg(long, env = "SCENETAG_CONFIG")]
    config: Option<PathBuf>,
    /// Status file. Defaults to `status.toml` next to the default config.
    #[arg(long, env = "SCENETAG_STATUS")]
    status: Option<PathBuf>,
    /// Log filter used when RUST_LOG is unset (e.g. `debug`).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber already set");
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(&args.log_level);

    // ── Configuration ─────────────────────────────────────────────────────────
    let config_path = paths::absolutize(args.config.unwrap_or_else(paths::config_file_path));
    if let Some(dir) = config_path.parent() {
        if let Err(e) = std::fs::create_dir_all(dir) {
            error!("Failed to create config directory {}: {e}", dir.display());
            std::process::exit(1);
        }
    }
    let initial_config = config::load_or_default(&config_path).unwrap_or_else(|e| {
        error!("Config error (using defaults): {e:#}");
        config::Config::default()
    });
    if initial_config.game_scenes().is_empty() {
        warn!("No game scenes configured in {}", config_path.display());
    }
    let shared_config = Arc::new(RwLock::new(initial_config));

    // ── Initial status ────────────────────────────────────────────────────────
    let status_path = args.status.unwrap_or_else(paths::status_file_path);
    let mut current_status = status::TaggerStatus::new();
    status::write_status(&status_path, &current_status);

    let resolver = match HttpResolver::new() {
        Ok(r) => r,
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    };
    let mut tagger = SceneTagger::new(resolver);

    let (event_tx, mut event_rx) = mpsc::channel::<DaemonEvent>(32);

    // ── Background tasks ──────────────────────────────────────────────────────
    tokio::spawn(config::watch_config(config_path.clone(), event_tx.clone()));
    tokio::spawn(obs::feed::run(Arc::clone(&shared_config), event_tx.clone()));

    // Graceful shutdown on Ctrl+C.
    {
        let tx = event_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(DaemonEvent::Shutdown).await;
            }
        });
    }

    info!(
        config = %config_path.display(),
        "scenetag-daemon v{} started",
        env!("CARGO_PKG_VERSION")
    );

    // ── Event loop ────────────────────────────────────────────────────────────
    // Notifications are handled one at a time; a game id lookup suspends the
    // loop, so no second transition can interleave with it.
    while let Some(evt) = event_rx.recv().await {
        match evt {
            DaemonEvent::SceneChanged(scene) => {
                let timestamp = chrono::Local::now().naive_local();
                let cfg = shared_config.read().await;
                let transition = tagger.on_scene_changed(&scene, &*cfg, timestamp).await;
                if let Some(transition) = transition {
                    current_status.record(&transition);
                    status::write_status(&status_path, &current_status);
                }
            }

            DaemonEvent::ObsConnected => {
                current_status.obs_connected = true;
                status::write_status(&status_path, &current_status);
            }

            DaemonEvent::ObsDisconnected => {
                current_status.obs_connected = false;
                status::write_status(&status_path, &current_status);
            }

            DaemonEvent::ConfigReloaded(new_config) => {
                info!("Config reloaded");
                if new_config.game_scenes().is_empty() {
                    warn!("No game scenes configured; transitions are disabled");
                }
                *shared_config.write().await = new_config;
            }

            DaemonEvent::Shutdown => {
                if tagger.session().in_game_scene {
                    info!("Shutting down mid-game; no END line is written");
                } else {
                    info!("Shutting down");
                }
                current_status.state = status::TaggerState::Idle;
                current_status.obs_connected = false;
                status::write_status(&status_path, &current_status);
                break;
            }
        }
    }
}
