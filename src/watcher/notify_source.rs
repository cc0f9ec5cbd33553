//! Change source backed by the platform file-watch service.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use log::{debug, info};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::{ChangeSource, ExtensionFilter};
use crate::error::{Result, SupervisorError};

type EventRx = mpsc::UnboundedReceiver<notify::Result<Event>>;

/// Watches a directory tree recursively through `notify`.
///
/// Each call to [`ChangeSource::wait_for_change`] creates its own watcher,
/// and dropping the returned future drops it again. When the watch service
/// is unavailable the source stays silent forever.
pub struct NotifySource {
    dir: PathBuf,
    filter: ExtensionFilter,
    unavailable_logged: AtomicBool,
}

impl NotifySource {
    pub fn new(dir: impl AsRef<Path>, filter: ExtensionFilter) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            filter,
            unavailable_logged: AtomicBool::new(false),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn subscribe(&self) -> Result<(RecommendedWatcher, EventRx)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })
        .map_err(|e| SupervisorError::Watch(e.to_string()))?;

        watcher
            .watch(&self.dir, RecursiveMode::Recursive)
            .map_err(|e| SupervisorError::Watch(format!("{}: {}", self.dir.display(), e)))?;

        Ok((watcher, rx))
    }

    fn report_unavailable(&self, err: &SupervisorError) {
        if !self.unavailable_logged.swap(true, Ordering::Relaxed) {
            info!("Hot reload disabled: {}", err);
        }
    }
}

#[async_trait]
impl ChangeSource for NotifySource {
    async fn wait_for_change(&self) -> PathBuf {
        let (_watcher, mut rx) = match self.subscribe() {
            Ok(sub) => sub,
            Err(e) => {
                self.report_unavailable(&e);
                return std::future::pending().await;
            }
        };

        while let Some(res) = rx.recv().await {
            match res {
                Ok(event) => {
                    if let Some(path) = self.filter.relevant_path(&event) {
                        return path;
                    }
                }
                Err(e) => debug!("Watch error under {}: {}", self.dir.display(), e),
            }
        }

        std::future::pending().await
    }
}
