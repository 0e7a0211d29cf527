//! Point-in-time index snapshot: freeze → clone → unfreeze.
//!
//! The source index is write-blocked so the clone is consistent, cloned into
//! the snapshot index, then made writable again. Once the freeze has
//! succeeded the unfreeze is always attempted, including after a failed
//! clone, so the live site is never left unable to index content. Nothing is
//! retried: cloning into an existing index is an error, and retrying it
//! blindly would hide that.
//!
//! # Callable From
//! - The `es-snapshot` CLI command and the `snapshot-create` pipeline
//! - Tests, with `MockIndexAdmin`

use std::time::Duration;

use tracing::{error, info, warn};

use crate::contract::IndexAdmin;
use crate::error::SnapshotError;
use crate::index::{IndexName, SnapshotRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotStep {
    Freeze,
    Clone,
    Unfreeze,
    WaitForClone,
}

/// What a successful run did, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotReport {
    pub source: IndexName,
    pub snapshot: IndexName,
    pub steps: Vec<SnapshotStep>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotOptions {
    /// After unfreezing, wait (up to this long, cluster side) for the clone to
    /// report yellow health. `None` keeps the fire-and-forget behaviour.
    pub wait_for_clone: Option<Duration>,
}

pub struct Snapshotter<A> {
    admin: A,
    options: SnapshotOptions,
}

impl<A> Snapshotter<A>
where
    A: IndexAdmin,
{
    pub fn new(admin: A) -> Self {
        Snapshotter {
            admin,
            options: SnapshotOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SnapshotOptions) -> Self {
        self.options = options;
        self
    }

    pub fn admin(&self) -> &A {
        &self.admin
    }

    pub async fn snapshot(&self, req: &SnapshotRequest) -> Result<SnapshotReport, SnapshotError> {
        let source = &req.source;
        let snapshot = &req.snapshot;
        info!(source = %source, snapshot = %snapshot, "[SNAPSHOT] Starting index snapshot");
        let mut steps = Vec::with_capacity(4);

        // --- Step 1: Freeze ---
        if let Err(cause) = self.admin.set_write_block(source, true).await {
            error!(index = %source, error = %cause, "[SNAPSHOT][ERROR] Freeze failed, nothing changed");
            return Err(SnapshotError::FreezeFailed {
                index: source.clone(),
                cause,
            });
        }
        steps.push(SnapshotStep::Freeze);
        info!(index = %source, "[SNAPSHOT] Source index is read-only");

        // --- Step 2: Clone ---
        let clone_result = self.admin.clone_index(source, snapshot).await;
        match &clone_result {
            Ok(_) => {
                steps.push(SnapshotStep::Clone);
                info!(source = %source, snapshot = %snapshot, "[SNAPSHOT] Clone accepted");
            }
            Err(e) => {
                error!(source = %source, snapshot = %snapshot, error = %e, "[SNAPSHOT][ERROR] Clone failed, restoring writes on source");
            }
        }

        // --- Step 3: Unfreeze (always, once frozen) ---
        let unfreeze = self
            .admin
            .set_write_block(source, false)
            .await
            .map(|_| ());
        match &unfreeze {
            Ok(()) => {
                steps.push(SnapshotStep::Unfreeze);
                info!(index = %source, "[SNAPSHOT] Source index is writable again");
            }
            Err(e) => {
                error!(index = %source, error = %e, "[SNAPSHOT][ERROR] Unfreeze failed, source index left read-only");
            }
        }

        if let Err(cause) = clone_result {
            return Err(SnapshotError::CloneFailed {
                source_index: source.clone(),
                snapshot_index: snapshot.clone(),
                cause,
                unfreeze,
            });
        }
        if let Err(cause) = unfreeze {
            return Err(SnapshotError::UnfreezeFailed {
                index: source.clone(),
                cause,
            });
        }

        // --- Optional: wait for the clone to come up ---
        if let Some(timeout) = self.options.wait_for_clone {
            if let Err(cause) = self.admin.wait_for_index(snapshot, timeout).await {
                warn!(index = %snapshot, error = %cause, "[SNAPSHOT] Clone did not become ready");
                return Err(SnapshotError::CloneNotReady {
                    index: snapshot.clone(),
                    cause,
                });
            }
            steps.push(SnapshotStep::WaitForClone);
        }

        info!(source = %source, snapshot = %snapshot, "[SNAPSHOT] Index snapshot complete");
        Ok(SnapshotReport {
            source: source.clone(),
            snapshot: snapshot.clone(),
            steps,
        })
    }
}
