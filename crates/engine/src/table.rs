use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use common::ScanReport;

/// Latest applied scan report, guarded by a generation token.
///
/// Every scan takes a generation from `begin()`. A finished report is only
/// applied if no newer scan has been started since, so a slow superseded
/// scan can never overwrite a fresher one.
#[derive(Clone)]
pub struct ScanTable {
    issued: Arc<AtomicU64>,
    latest: Arc<RwLock<Option<ScanReport>>>,
    report_tx: broadcast::Sender<ScanReport>,
}

impl Default for ScanTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanTable {
    pub fn new() -> Self {
        let (report_tx, _) = broadcast::channel(16);
        Self {
            issued: Arc::new(AtomicU64::new(0)),
            latest: Arc::new(RwLock::new(None)),
            report_tx,
        }
    }

    /// Issue the next generation. Strictly increasing, starting at 1.
    pub fn begin(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn latest_generation(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    /// Store `report` if its generation is still the latest issued.
    /// Returns whether it was applied.
    pub async fn apply(&self, report: ScanReport) -> bool {
        self.apply_with(report, || None).await
    }

    /// Like `apply`, but `advisory` is only consulted once the report has
    /// been accepted, so a superseded report cannot consume it.
    pub async fn apply_with(
        &self,
        mut report: ScanReport,
        advisory: impl FnOnce() -> Option<String>,
    ) -> bool {
        let mut latest = self.latest.write().await;
        // Checked under the write lock so two finishing scans cannot interleave.
        if report.generation != self.issued.load(Ordering::SeqCst) {
            debug!(
                generation = report.generation,
                latest = self.latest_generation(),
                "Discarding superseded scan report"
            );
            return false;
        }

        if report.advisory.is_none() {
            report.advisory = advisory();
        }
        info!(generation = report.generation, rows = report.rows.len(), "Scan report applied");
        let _ = self.report_tx.send(report.clone());
        *latest = Some(report);
        true
    }

    pub async fn snapshot(&self) -> Option<ScanReport> {
        self.latest.read().await.clone()
    }

    /// Subscribe to applied reports.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanReport> {
        self.report_tx.subscribe()
    }
}
