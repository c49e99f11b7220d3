//! Trash sweeper
//!
//! Periodically purges articles that have sat in the trash longer than the
//! retention period. Works on the store only; trashed articles are already
//! gone from the index.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::storage::{ArticleStore, StorageResult};

/// Handle to the sweeper task
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Trash sweeper ended abnormally");
        }
    }
}

/// Purge trash older than `retention` once
pub fn sweep_once(store: &dyn ArticleStore, retention: Duration) -> StorageResult<usize> {
    // A retention too long to represent means nothing has expired yet
    let Some(cutoff) = chrono::Duration::from_std(retention)
        .ok()
        .and_then(|retention| Utc::now().checked_sub_signed(retention))
    else {
        return Ok(0);
    };
    store.purge_trash(cutoff)
}

/// Spawn a task that sweeps every `interval`, starting immediately
pub fn spawn_trash_sweeper(
    store: Arc<dyn ArticleStore>,
    retention: Duration,
    interval: Duration,
) -> SweeperHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match sweep_once(store.as_ref(), retention) {
                        Ok(0) => debug!("Trash sweep found nothing to purge"),
                        Ok(purged) => info!(purged, "Purged expired trash"),
                        Err(e) => warn!(error = %e, "Trash sweep failed"),
                    }
                }
                _ = shutdown_rx.changed() => break,
            }
        }
    });

    SweeperHandle { shutdown_tx, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Article, ArticleId};
    use crate::storage::MemoryStore;

    fn trashed_store() -> Arc<MemoryStore> {
        let store = MemoryStore::with_data(
            vec![
                Article::with_id(ArticleId(11), "old", "Old"),
                Article::with_id(ArticleId(12), "new", "New"),
                Article::with_id(ArticleId(13), "live", "Live"),
            ],
            vec![],
        );
        store
            .mark_deleted(ArticleId(11), Utc::now() - chrono::Duration::hours(72))
            .unwrap();
        store.mark_deleted(ArticleId(12), Utc::now()).unwrap();
        Arc::new(store)
    }

    #[test]
    fn test_sweep_once_respects_retention() {
        let store = trashed_store();
        let purged = sweep_once(store.as_ref(), Duration::from_secs(48 * 3600)).unwrap();
        assert_eq!(purged, 1);
        assert!(store.fetch(ArticleId(11)).unwrap().is_none());
        assert!(store.fetch(ArticleId(12)).unwrap().is_some());
        assert!(store.fetch(ArticleId(13)).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sweeper_runs_and_stops() {
        let store = trashed_store();
        let handle = spawn_trash_sweeper(
            store.clone(),
            Duration::from_secs(48 * 3600),
            Duration::from_secs(3600),
        );

        tokio::time::timeout(Duration::from_secs(5), async {
            while store.article_count() != 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("sweep never ran");

        tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .expect("shutdown hung");
    }

    #[tokio::test]
    async fn test_sweep_failure_is_not_fatal() {
        let store = trashed_store();
        store.set_unavailable(true);
        let handle = spawn_trash_sweeper(
            store.clone(),
            Duration::from_secs(0),
            Duration::from_millis(10),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.task.is_finished());
        assert_eq!(store.article_count(), 3);
        handle.shutdown().await;
    }
}
