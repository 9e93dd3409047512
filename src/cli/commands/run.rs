//! Run command - start the engine.

use std::path::PathBuf;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::engine::{Engine, EngineConfig, StatsSnapshot};
use crate::processor;

/// Root overrides given on the command line.
#[derive(Debug, Default, Clone)]
pub struct RunOverrides {
    pub watch_dir: Option<PathBuf>,
    pub saved_dir: Option<PathBuf>,
    pub error_dir: Option<PathBuf>,
}

impl RunOverrides {
    pub fn apply(self, settings: &mut Settings) {
        if let Some(dir) = self.watch_dir {
            settings.paths.watch_dir = dir;
        }
        if let Some(dir) = self.saved_dir {
            settings.paths.saved_dir = dir;
        }
        if let Some(dir) = self.error_dir {
            settings.paths.error_dir = dir;
        }
    }
}

/// Run the engine until a shutdown signal arrives (or, with `once`, until
/// the existing tree has been processed).
pub async fn run(settings: &Settings, once: bool) -> anyhow::Result<StatsSnapshot> {
    let config = EngineConfig::from_settings(settings);
    let engine = Engine::new(config, processor::from_config(&settings.processor));

    let shutdown = CancellationToken::new();
    let signal_task = tokio::spawn(cancel_on_signal(shutdown.clone()));

    let result = if once {
        engine.run_once(shutdown.clone()).await
    } else {
        engine.run(shutdown.clone()).await
    };

    signal_task.abort();
    result.context("engine failed to start")
}

/// Cancel `token` on Ctrl+C or (on unix) SIGTERM.
async fn cancel_on_signal(token: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("[engine] cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!("[engine] cannot listen for ctrl+c: {e}");
                return;
            }
        }
        _ = terminate => {}
    }

    eprintln!("Received shutdown signal, finishing current file");
    token.cancel();
}
