//! Sequential discovery scans over an identifier range.

use std::sync::{
    atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
    Arc,
};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{
    catalog::Catalog,
    error::CatalogResult,
    ident,
    models::{GameRecord, ScanRange},
    patch::PatchSource,
};

/// Finished scans beyond this many are dropped from the manager's history.
pub const MAX_SCAN_HISTORY: usize = 32;

/// Lifecycle of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    /// Still probing identifiers.
    Running,
    /// Every serial in the range was probed.
    Done,
    /// Stopped on request before the range was exhausted.
    Cancelled,
    /// The scan task aborted unexpectedly.
    Failed,
}

impl ScanState {
    /// Lowercase label, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

/// Live status handle shared between a scan task and its observers.
#[derive(Debug)]
pub struct ScanProgress {
    id: u64,
    range: ScanRange,
    started_at: DateTime<Utc>,
    processed: AtomicU32,
    found: AtomicU32,
    current: AtomicU32,
    cancel_requested: AtomicBool,
    outcome: Mutex<Option<(ScanState, DateTime<Utc>)>>,
}

/// Point-in-time view of a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSnapshot {
    /// Identifier assigned by the [`ScanManager`].
    pub id: u64,
    /// Identifier type prefix.
    pub kind: String,
    /// First serial of the range.
    pub start: u32,
    /// Exclusive upper bound of the range.
    pub max: u32,
    /// Lifecycle state at snapshot time.
    pub state: ScanState,
    /// Serials probed so far.
    pub processed: u32,
    /// Serials that resolved to a stored title.
    pub found: u32,
    /// Serial currently (or last) probed.
    pub current: u32,
    /// When the handle was created.
    pub started_at: DateTime<Utc>,
    /// When the scan reached a final state.
    pub finished_at: Option<DateTime<Utc>>,
}

impl ScanProgress {
    /// Fresh handle for a scan that has not probed anything yet.
    pub fn new(id: u64, range: ScanRange) -> Self {
        let current = range.start;
        Self {
            id,
            range,
            started_at: Utc::now(),
            processed: AtomicU32::new(0),
            found: AtomicU32::new(0),
            current: AtomicU32::new(current),
            cancel_requested: AtomicBool::new(false),
            outcome: Mutex::new(None),
        }
    }

    /// Identifier assigned by the [`ScanManager`].
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Range being scanned.
    pub fn range(&self) -> &ScanRange {
        &self.range
    }

    /// Ask the scan to stop before its next probe.
    pub fn cancel(&self) {
        self.cancel_requested.store(true, Ordering::Relaxed);
    }

    /// Whether [`Self::cancel`] has been called.
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Relaxed)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ScanState {
        let outcome = *self.outcome.lock();
        outcome.map(|(state, _)| state).unwrap_or(ScanState::Running)
    }

    /// Record the final state; only the first call has an effect.
    fn finish(&self, state: ScanState) {
        let mut outcome = self.outcome.lock();
        if outcome.is_none() {
            *outcome = Some((state, Utc::now()));
        }
    }

    /// Copy of the current counters and state.
    pub fn snapshot(&self) -> ScanSnapshot {
        let outcome = *self.outcome.lock();
        ScanSnapshot {
            id: self.id,
            kind: self.range.kind.clone(),
            start: self.range.start,
            max: self.range.max,
            state: outcome.map(|(state, _)| state).unwrap_or(ScanState::Running),
            processed: self.processed.load(Ordering::Relaxed),
            found: self.found.load(Ordering::Relaxed),
            current: self.current.load(Ordering::Relaxed),
            started_at: self.started_at,
            finished_at: outcome.map(|(_, at)| at),
        }
    }
}

/// Probe every serial of the handle's range in order, one request at a time.
///
/// Individual failures never stop the scan; only a cancel request does.
pub async fn run_scan<S: PatchSource>(catalog: &Catalog<S>, progress: &ScanProgress) -> ScanSnapshot {
    let range = progress.range().clone();
    info!(scan = progress.id(), kind = %range.kind, start = range.start, max = range.max, "scan started");

    let mut serial = range.start;
    while serial < range.max {
        if progress.is_cancel_requested() {
            progress.finish(ScanState::Cancelled);
            info!(scan = progress.id(), serial, "scan cancelled");
            return progress.snapshot();
        }

        progress.current.store(serial, Ordering::Relaxed);
        match probe(catalog, &range.kind, serial).await {
            Ok(Some(record)) => {
                progress.found.fetch_add(1, Ordering::Relaxed);
                debug!(scan = progress.id(), code = %record.code, "title found");
            }
            Ok(None) => {}
            Err(err) if err.is_routine() => {
                debug!(scan = progress.id(), serial, %err, "nothing published");
            }
            Err(err) => {
                warn!(scan = progress.id(), serial, %err, "probe failed");
            }
        }
        progress.processed.fetch_add(1, Ordering::Relaxed);
        serial += 1;
    }

    progress.finish(ScanState::Done);
    let snapshot = progress.snapshot();
    info!(
        scan = snapshot.id,
        processed = snapshot.processed,
        found = snapshot.found,
        "scan finished"
    );
    snapshot
}

/// `Ok(None)` means the document resolved but could not be stored.
async fn probe<S: PatchSource>(
    catalog: &Catalog<S>,
    kind: &str,
    serial: u32,
) -> CatalogResult<Option<GameRecord>> {
    let code = ident::format_identifier(kind, serial)?;
    let document = catalog.resolve(&code).await?;
    match catalog.remember(&code, &document) {
        Ok((record, _)) => Ok(Some(record)),
        Err(err) => {
            warn!(%code, %err, "failed to store scanned title");
            Ok(None)
        }
    }
}

/// Spawns scans in the background and keeps their status handles.
pub struct ScanManager<S> {
    catalog: Arc<Catalog<S>>,
    scans: RwLock<Vec<Arc<ScanProgress>>>,
    next_id: AtomicU64,
}

impl<S: PatchSource> ScanManager<S> {
    /// Manager scanning through `catalog`.
    pub fn new(catalog: Arc<Catalog<S>>) -> Self {
        Self {
            catalog,
            scans: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Start a scan on the current tokio runtime and return its handle immediately.
    pub fn start(&self, range: ScanRange) -> CatalogResult<Arc<ScanProgress>> {
        ident::format_identifier(&range.kind, 0)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let progress = Arc::new(ScanProgress::new(id, range));
        {
            let mut scans = self.scans.write();
            scans.push(Arc::clone(&progress));
            prune_finished(&mut scans);
        }

        let catalog = Arc::clone(&self.catalog);
        let task_progress = Arc::clone(&progress);
        let task = tokio::spawn(async move {
            run_scan(&catalog, &task_progress).await;
        });

        let watch_progress = Arc::clone(&progress);
        tokio::spawn(async move {
            if let Err(err) = task.await {
                error!(scan = watch_progress.id(), %err, "scan task aborted");
                watch_progress.finish(ScanState::Failed);
            }
        });

        Ok(progress)
    }

    /// Snapshots of the scans still in the history, oldest first.
    pub fn list(&self) -> Vec<ScanSnapshot> {
        self.scans.read().iter().map(|scan| scan.snapshot()).collect()
    }

    /// Handle for scan `id`.
    pub fn get(&self, id: u64) -> Option<Arc<ScanProgress>> {
        self.scans.read().iter().find(|scan| scan.id() == id).cloned()
    }

    /// Request cancellation; returns false for unknown ids.
    pub fn cancel(&self, id: u64) -> bool {
        match self.get(id) {
            Some(scan) => {
                scan.cancel();
                true
            }
            None => false,
        }
    }
}

/// Drop the oldest finished scans until the history fits; running scans are always kept.
fn prune_finished(scans: &mut Vec<Arc<ScanProgress>>) {
    let mut excess = scans.len().saturating_sub(MAX_SCAN_HISTORY);
    scans.retain(|scan| {
        if excess > 0 && scan.state() != ScanState::Running {
            excess -= 1;
            false
        } else {
            true
        }
    });
}
