//! High-level pipeline: build a static copy of the site with its own search index.
//!
//! Steps, fail-fast:
//!   1. Optional cache clear (e.g. `drush cr`) so the crawl sees fresh markup
//!   2. Clean the export directory
//!   3. Mirror the site with the crawler
//!   4. Patch exported HTML/JS for static hosting
//!   5. Snapshot the search index (when a search target is given)
//!   6. Point the exported search widget at the snapshot index
//!
//! Blocking work (external processes, file walking) runs on tokio's blocking
//! pool; the index snapshot awaits on the caller's task.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{error, info};

use crate::contract::IndexAdmin;
use crate::error::SnapshotError;
use crate::export::{self, ExportError, RewriteReport};
use crate::index::SnapshotRequest;
use crate::mirror::{self, MirrorConfig, MirrorError};
use crate::snapshot::{SnapshotReport, Snapshotter};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Mirror(#[from] MirrorError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("background task failed: {0}")]
    Task(String),
}

impl PipelineError {
    /// Snapshot failures keep their step-specific exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Snapshot(e) => e.exit_code(),
            _ => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SiteSnapshotConfig {
    pub mirror: MirrorConfig,
    pub cache_clear_command: Option<String>,
}

/// Index snapshot to take as part of the pipeline.
pub struct SearchSnapshot<'a, A> {
    pub snapshotter: &'a Snapshotter<A>,
    pub request: SnapshotRequest,
}

#[derive(Debug)]
pub struct SiteSnapshotReport {
    pub export_dir: PathBuf,
    /// Where the crawled site landed inside `export_dir`.
    pub site_dir: PathBuf,
    pub mirror_exit_code: i32,
    pub static_rewrites: RewriteReport,
    pub index_snapshot: Option<SnapshotReport>,
    pub index_rewrites: Option<RewriteReport>,
}

async fn blocking<T, F>(f: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))?
}

pub async fn create_site_snapshot<A>(
    config: &SiteSnapshotConfig,
    search: Option<SearchSnapshot<'_, A>>,
) -> Result<SiteSnapshotReport, PipelineError>
where
    A: IndexAdmin,
{
    info!(site_url = %config.mirror.site_url, "[PIPELINE] Starting static site snapshot");

    // --- Step 1-3: cache clear, clean, mirror ---
    let cfg = config.clone();
    let mirror_exit_code = blocking(move || {
        if let Some(cmd) = cfg.cache_clear_command.as_deref() {
            mirror::run_shell(cmd)?;
        }
        mirror::clean_dir(&cfg.mirror.export_dir)?;
        Ok(mirror::mirror_site(&cfg.mirror)?)
    })
    .await
    .map_err(|e| {
        error!(error = %e, "[PIPELINE][ERROR] Mirroring failed");
        e
    })?;

    // --- Step 4: static hosting rewrites ---
    let export_dir = config.mirror.export_dir.clone();
    let root = export_dir.clone();
    let static_rewrites = blocking(move || {
        Ok(export::rewrite_tree(
            &root,
            &[export::strip_index_html(), export::mark_static_context()],
        )?)
    })
    .await?;
    info!(
        changed = static_rewrites.files_changed,
        "[PIPELINE] Static hosting rewrites applied"
    );

    // --- Step 5-6: index snapshot and widget retarget ---
    let (index_snapshot, index_rewrites) = match search {
        Some(search) => {
            let report = search.snapshotter.snapshot(&search.request).await?;
            let rule = export::retarget_search_index(
                search.request.source.as_str(),
                search.request.snapshot.as_str(),
            );
            let root = export_dir.clone();
            let rewrites = blocking(move || Ok(export::rewrite_tree(&root, &[rule])?)).await?;
            info!(
                snapshot = %report.snapshot,
                changed = rewrites.files_changed,
                "[PIPELINE] Search widget retargeted to snapshot index"
            );
            (Some(report), Some(rewrites))
        }
        None => {
            info!("[PIPELINE] No search target configured, skipping index snapshot");
            (None, None)
        }
    };

    let site_dir = config.mirror.site_dir()?;
    info!(site_dir = %site_dir.display(), "[PIPELINE] Static site snapshot complete");
    Ok(SiteSnapshotReport {
        export_dir,
        site_dir,
        mirror_exit_code,
        static_rewrites,
        index_snapshot,
        index_rewrites,
    })
}
