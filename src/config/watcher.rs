//! Live `[demo.backend]` settings.
//!
//! # Data Flow
//! ```text
//! file event (notify)
//!     → reload_backend_settings (load + validate whole file)
//!     → changed? publish BackendSettings on the channel
//!     → main: Pipeline::apply_backend_settings
//! ```
//!
//! Other sections need a restart and are ignored here; an invalid file
//! keeps the current settings.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{load_config, ConfigError};
use crate::config::schema::BackendSettings;

/// Publishes each new revision of `[demo.backend]`.
pub struct BackendSettingsWatcher {
    path: PathBuf,
    current: BackendSettings,
    update_tx: mpsc::UnboundedSender<BackendSettings>,
}

impl BackendSettingsWatcher {
    /// `current` is the revision already in effect; only changes from it
    /// are published.
    pub fn new(
        path: &Path,
        current: BackendSettings,
    ) -> (Self, mpsc::UnboundedReceiver<BackendSettings>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                current,
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self {
            path,
            current,
            update_tx,
        } = self;
        let last = Mutex::new(current);
        let watched = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    let mut last = last.lock().unwrap_or_else(|p| p.into_inner());
                    match reload_backend_settings(&watched, &last) {
                        Ok(Some(next)) => {
                            tracing::info!(path = ?watched, "Backend settings changed");
                            *last = next.clone();
                            let _ = update_tx.send(next);
                        }
                        Ok(None) => tracing::debug!(path = ?watched, "Backend settings unchanged"),
                        Err(e) => tracing::error!(
                            error = %e,
                            "Failed to reload config, keeping current backend settings"
                        ),
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?path, "Backend settings watcher started");
        Ok(watcher)
    }
}

/// Load the file and return its `[demo.backend]` if it differs from
/// `current`.
pub fn reload_backend_settings(
    path: &Path,
    current: &BackendSettings,
) -> Result<Option<BackendSettings>, ConfigError> {
    let next = load_config(path)?.demo.backend;
    Ok((next != *current).then_some(next))
}
