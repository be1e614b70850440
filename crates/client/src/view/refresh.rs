//! Re-fetch a mounted page when the queries it shows go stale.

use std::future::Future;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::store::{ViewState, ViewStore};
use crate::query_cache::{QueryCache, QueryKey};

/// Background refetch for one page. Stops when dropped or once the page
/// is unmounted.
pub struct Refresher {
    task: JoinHandle<()>,
}

impl Refresher {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Refresher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Run `refresh` whenever a key overlapping one of `keys` is invalidated.
///
/// The subscription is taken before this returns, so no invalidation that
/// happens afterwards is missed.
pub fn spawn_refresh<S, F, Fut>(
    cache: &QueryCache,
    store: &ViewStore<S>,
    keys: Vec<QueryKey>,
    refresh: F,
) -> Refresher
where
    S: ViewState,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let mut invalidations = cache.subscribe();
    let store = store.clone();
    let task = tokio::spawn(async move {
        loop {
            let stale = match invalidations.recv().await {
                Ok(key) => keys.iter().any(|watched| watched.overlaps(&key)),
                Err(RecvError::Lagged(skipped)) => {
                    crate::log_warn!("Missed {} invalidations; refreshing", skipped);
                    true
                }
                Err(RecvError::Closed) => break,
            };
            if !store.is_mounted() {
                break;
            }
            if stale {
                refresh().await;
            }
        }
        crate::log_debug!("Refresher stopped");
    });
    Refresher { task }
}
