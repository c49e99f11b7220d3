//! Background regeneration of derived pages
//!
//! One task per index. It sleeps until a mutation flags a page as stale,
//! rebuilds every flagged page from the current snapshot and goes back to
//! sleep. Flags raised while it is rendering are picked up on the next turn.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{PageVersions, RegenSignal};
use crate::index::ContentIndex;

/// Handle to the regeneration task
pub struct RegenerationHandle {
    signal: Arc<RegenSignal>,
    /// Watch page publications
    pub versions_rx: watch::Receiver<PageVersions>,
    task: JoinHandle<()>,
}

impl RegenerationHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the task after the page it is rendering, if any
    pub async fn shutdown(self) {
        self.signal.close();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Regeneration worker ended abnormally");
        }
    }
}

/// Spawn the regeneration task for `index`
///
/// Must be called from within a Tokio runtime. Spawn at most one worker per
/// index; a second one would compete for the same flags.
pub fn spawn_regeneration_worker(index: Arc<ContentIndex>) -> RegenerationHandle {
    let signal = index.regen_signal();
    let versions_rx = index.subscribe_pages();
    let task = tokio::spawn(regeneration_loop(index, Arc::clone(&signal)));

    RegenerationHandle {
        signal,
        versions_rx,
        task,
    }
}

async fn regeneration_loop(index: Arc<ContentIndex>, signal: Arc<RegenSignal>) {
    info!("Regeneration worker started");

    while let Some(stale) = signal.wait().await {
        for kind in stale.kinds() {
            // A failed page keeps its last good snapshot until the next mark
            if let Err(e) = index.regenerate(kind) {
                warn!(page = %kind, error = %e, "Failed to regenerate page");
            }
        }
        debug!(?stale, "Regeneration pass finished");
    }

    info!("Regeneration worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequenceIdGenerator;
    use crate::index::IndexSettings;
    use crate::models::NewArticle;
    use crate::pages::PageKind;
    use crate::render::{MarkdownRenderer, RenderError, Renderer};
    use crate::storage::MemoryStore;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::timeout;

    #[derive(Default)]
    struct CountingRenderer {
        failing: AtomicBool,
        calls: AtomicUsize,
        inner: MarkdownRenderer,
    }

    impl Renderer for CountingRenderer {
        fn to_html(&self, markdown: &str) -> Result<String, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(RenderError::Markdown("renderer offline".into()));
            }
            self.inner.to_html(markdown)
        }
    }

    fn index_with(renderer: Arc<CountingRenderer>) -> Arc<ContentIndex> {
        let settings = IndexSettings {
            series_intro: "Every series".into(),
            archives_intro: "Every month".into(),
            ..IndexSettings::default()
        };
        Arc::new(
            ContentIndex::initialize(
                Arc::new(MemoryStore::new()),
                renderer,
                Arc::new(SequenceIdGenerator::default()),
                settings,
            )
            .unwrap(),
        )
    }

    async fn wait_for(
        rx: &mut watch::Receiver<PageVersions>,
        kind: PageKind,
        at_least: u64,
    ) -> PageVersions {
        let seen = timeout(
            Duration::from_secs(5),
            rx.wait_for(|versions| versions.get(kind) >= at_least),
        )
        .await
        .expect("timed out waiting for page")
        .expect("page watch closed");
        *seen
    }

    #[tokio::test]
    async fn test_initial_pages_published() {
        let index = index_with(Arc::new(CountingRenderer::default()));
        let mut handle = spawn_regeneration_worker(Arc::clone(&index));

        wait_for(&mut handle.versions_rx, PageKind::Series, 1).await;
        wait_for(&mut handle.versions_rx, PageKind::Archive, 1).await;
        assert!(index.page_series().contains("Every series"));
        assert!(index.page_archives().contains("Every month"));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_mutation_refreshes_archive() {
        let index = index_with(Arc::new(CountingRenderer::default()));
        let mut handle = spawn_regeneration_worker(Arc::clone(&index));
        wait_for(&mut handle.versions_rx, PageKind::Archive, 1).await;

        let mut input = NewArticle::new("fresh", "Fresh Post");
        input.content = "hello".into();
        index.add_article(input).unwrap();

        wait_for(&mut handle.versions_rx, PageKind::Archive, 2).await;
        assert!(index.page_archives().contains("Fresh Post"));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_failure_keeps_snapshot_and_loop_alive() {
        let renderer = Arc::new(CountingRenderer::default());
        let index = index_with(Arc::clone(&renderer));
        let mut handle = spawn_regeneration_worker(Arc::clone(&index));
        wait_for(&mut handle.versions_rx, PageKind::Series, 1).await;
        let good = index.page_series();

        renderer.failing.store(true, Ordering::SeqCst);
        let calls_before = renderer.calls.load(Ordering::SeqCst);
        index.add_serie("Broken", "broken", "").unwrap();
        timeout(Duration::from_secs(5), async {
            while renderer.calls.load(Ordering::SeqCst) == calls_before {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("worker never attempted the render");
        assert_eq!(index.page_series(), good);
        assert!(!handle.is_finished());

        renderer.failing.store(false, Ordering::SeqCst);
        index.add_serie("Fixed", "fixed", "").unwrap();
        wait_for(&mut handle.versions_rx, PageKind::Series, 2).await;
        let page = index.page_series();
        assert!(page.contains("Broken"));
        assert!(page.contains("Fixed"));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_worker() {
        let index = index_with(Arc::new(CountingRenderer::default()));
        let handle = spawn_regeneration_worker(index);
        timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .expect("shutdown hung");
    }
}
