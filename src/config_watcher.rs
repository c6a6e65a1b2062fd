//! Hot reload of download settings
//!
//! Watches the configuration file and, whenever it is written, re-parses it
//! and pushes its `[download]` section into the shared [`SettingsHandle`].
//! Only the batch delay takes effect immediately; see [`crate::hub`]. A file
//! that fails to parse or validate is logged and the current settings stay.
//!
//! The containing directory is watched rather than the file itself, so that
//! editors which save by writing a new file and renaming it are picked up.

use crate::config::{Config, DownloadServiceSettings, SettingsHandle};
use crate::error::{Error, Result};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Reloads download settings when the configuration file changes
pub struct ConfigWatcher {
    /// Filesystem watcher instance
    watcher: RecommendedWatcher,

    /// Channel for receiving filesystem events
    rx: mpsc::UnboundedReceiver<notify::Result<Event>>,

    /// Watched configuration file
    path: PathBuf,

    /// Where reloaded settings go
    settings: SettingsHandle,
}

impl ConfigWatcher {
    /// Create a watcher for `path`
    ///
    /// # Errors
    /// Returns error if the filesystem watcher cannot be initialized
    pub fn new(path: impl Into<PathBuf>, settings: SettingsHandle) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let watcher = RecommendedWatcher::new(
            move |res| {
                if let Err(e) = tx.send(res) {
                    error!("Failed to send filesystem event: {}", e);
                }
            },
            NotifyConfig::default(),
        )
        .map_err(|e| Error::ConfigWatch(e.to_string()))?;

        Ok(Self {
            watcher,
            rx,
            path: path.into(),
            settings,
        })
    }

    /// Register the configuration file's directory with the watcher
    ///
    /// # Errors
    /// Returns error if the directory cannot be watched
    pub fn start(&mut self) -> Result<()> {
        let dir = self.watch_dir();
        self.watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| {
                Error::ConfigWatch(format!("Failed to watch {}: {}", dir.display(), e))
            })?;

        info!(path = %self.path.display(), "Watching config file");
        Ok(())
    }

    /// Process filesystem events until `shutdown` fires or the watcher goes away
    pub async fn run(mut self, shutdown: CancellationToken) {
        loop {
            let result = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.rx.recv() => match result {
                    Some(result) => result,
                    None => break,
                },
            };

            match result {
                Ok(event) => self.handle_event(event).await,
                Err(e) => error!("Filesystem watcher error: {}", e),
            }
        }

        info!("Config watcher stopped");
    }

    /// Re-read the file and apply its download settings
    pub async fn reload(&self) -> Result<DownloadServiceSettings> {
        let config = Config::load(&self.path).await?;
        self.settings.replace(config.download.clone())?;
        Ok(config.download)
    }

    async fn handle_event(&self, event: Event) {
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            return;
        }
        if !event.paths.iter().any(|p| self.is_config_file(p)) {
            return;
        }

        debug!(kind = ?event.kind, "Config file changed");
        match self.reload().await {
            Ok(settings) => info!(
                batch_delay_ms = settings.batch_delay_ms,
                "Reloaded download settings"
            ),
            Err(e) => warn!(error = %e, "Ignoring invalid config file change"),
        }
    }

    fn is_config_file(&self, path: &Path) -> bool {
        path.file_name().is_some() && path.file_name() == self.path.file_name()
    }

    fn watch_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}
