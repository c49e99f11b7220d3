//! Long-running mode: keep derived pages fresh and sweep the trash

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use quill_core::{spawn_regeneration_worker, spawn_trash_sweeper, Config, ContentIndex};

use crate::output::Output;

/// Run the regeneration worker and trash sweeper until Ctrl-C
pub async fn run(index: Arc<ContentIndex>, config: &Config, output: &Output) -> Result<()> {
    let worker = spawn_regeneration_worker(Arc::clone(&index));
    let sweeper = spawn_trash_sweeper(
        index.store(),
        config.trash_retention(),
        config.sweep_interval(),
    );
    output.message("Quill is running. Press Ctrl-C to stop.");

    let mut versions = worker.versions_rx.clone();
    loop {
        tokio::select! {
            changed = versions.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *versions.borrow_and_update();
                info!(series = current.series, archive = current.archive, "Pages published");
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                break;
            }
        }
    }

    worker.shutdown().await;
    sweeper.shutdown().await;
    output.success("Stopped");
    Ok(())
}
