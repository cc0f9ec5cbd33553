//! Change watcher - hot-reload triggers from the worker's source tree.
//!
//! A [`ChangeSource`] is asked once per run for the next relevant change.
//! The supervisor races that future against the worker exiting; the loser
//! is dropped in place, which tears the subscription down.

mod filter;
mod notify_source;

use std::path::PathBuf;

use async_trait::async_trait;

pub use filter::ExtensionFilter;
pub use notify_source::NotifySource;

/// Source of "relevant file changed" notifications
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Subscribe fresh and resolve with the first relevant changed path.
    ///
    /// Sources that cannot observe anything never resolve.
    async fn wait_for_change(&self) -> PathBuf;
}

/// A source that never fires; hot reload off
#[derive(Debug, Clone, Copy, Default)]
pub struct Disabled;

#[async_trait]
impl ChangeSource for Disabled {
    async fn wait_for_change(&self) -> PathBuf {
        std::future::pending().await
    }
}

#[async_trait]
impl<S: ChangeSource + ?Sized> ChangeSource for std::sync::Arc<S> {
    async fn wait_for_change(&self) -> PathBuf {
        (**self).wait_for_change().await
    }
}

#[async_trait]
impl<S: ChangeSource + ?Sized> ChangeSource for Box<S> {
    async fn wait_for_change(&self) -> PathBuf {
        (**self).wait_for_change().await
    }
}
