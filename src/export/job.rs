use std::sync::{Arc, Mutex, MutexGuard};

use crate::export::ExportKind;
use crate::foundation::error::{TypeCutError, TypeCutResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatus {
    Idle,
    Running,
    Done,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ExportJob {
    pub kind: ExportKind,
    pub status: ExportStatus,
    /// 0..=100, never decreasing while running.
    pub progress: u8,
    pub error: Option<String>,
}

type ProgressObserver = Arc<dyn Fn(ExportKind, u8) + Send + Sync>;

#[derive(Default)]
struct Slot {
    job: Option<ExportJob>,
}

/// Owns the single export slot. A second export is rejected while one is running.
#[derive(Clone, Default)]
pub struct ExportCoordinator {
    slot: Arc<Mutex<Slot>>,
    observer: Option<ProgressObserver>,
}

impl std::fmt::Debug for ExportCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportCoordinator")
            .field("job", &self.current())
            .finish()
    }
}

impl ExportCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called on every progress change, from whichever thread runs the export.
    pub fn with_observer(
        mut self,
        observer: impl Fn(ExportKind, u8) + Send + Sync + 'static,
    ) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Claim the slot for a `kind` export.
    ///
    /// Fails with [`TypeCutError::ExportBusy`] naming the running kind; the running job is left
    /// untouched. A finished or failed job is replaced.
    pub fn begin(&self, kind: ExportKind) -> TypeCutResult<ExportGuard> {
        let mut slot = lock(&self.slot);
        if let Some(job) = &slot.job
            && job.status == ExportStatus::Running
        {
            tracing::warn!(running = %job.kind, requested = %kind, "export rejected: busy");
            return Err(TypeCutError::ExportBusy(job.kind));
        }
        slot.job = Some(ExportJob {
            kind,
            status: ExportStatus::Running,
            progress: 0,
            error: None,
        });
        drop(slot);
        self.notify(kind, 0);
        Ok(ExportGuard {
            coordinator: self.clone(),
            kind,
            settled: false,
        })
    }

    /// Snapshot of the latest job, running or settled.
    pub fn current(&self) -> Option<ExportJob> {
        lock(&self.slot).job.clone()
    }

    pub fn status(&self) -> ExportStatus {
        self.current().map_or(ExportStatus::Idle, |j| j.status)
    }

    pub fn is_busy(&self) -> bool {
        self.status() == ExportStatus::Running
    }

    /// Drop a finished job so the slot reads `idle` again. Running jobs are left alone.
    pub fn reset(&self) {
        let mut slot = lock(&self.slot);
        if slot
            .job
            .as_ref()
            .is_some_and(|j| j.status != ExportStatus::Running)
        {
            slot.job = None;
        }
    }

    fn update(&self, f: impl FnOnce(&mut ExportJob)) -> Option<(ExportKind, u8)> {
        let mut slot = lock(&self.slot);
        let job = slot.job.as_mut()?;
        f(job);
        Some((job.kind, job.progress))
    }

    fn notify(&self, kind: ExportKind, pct: u8) {
        if let Some(observer) = &self.observer {
            observer(kind, pct);
        }
    }
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// Proof of holding the running export. Reaches a terminal state on every path: `finish`,
/// `fail`, or drop (including unwinding), which records a failure.
pub struct ExportGuard {
    coordinator: ExportCoordinator,
    kind: ExportKind,
    settled: bool,
}

impl std::fmt::Debug for ExportGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportGuard")
            .field("kind", &self.kind)
            .field("settled", &self.settled)
            .finish()
    }
}

impl ExportGuard {
    pub fn kind(&self) -> ExportKind {
        self.kind
    }

    /// Raise progress to `pct` (clamped to 100). Lower values are ignored.
    pub fn progress(&self, pct: u8) {
        let pct = pct.min(100);
        let mut changed = false;
        let update = self.coordinator.update(|job| {
            if pct > job.progress {
                job.progress = pct;
                changed = true;
            }
        });
        if let Some((kind, pct)) = update
            && changed
        {
            tracing::debug!(kind = %kind, progress = pct, "export progress");
            self.coordinator.notify(kind, pct);
        }
    }

    /// Map `frac` in `0.0..=1.0` onto the `lo..=hi` band.
    pub fn progress_in(&self, lo: u8, hi: u8, frac: f64) {
        let frac = if frac.is_finite() { frac.clamp(0.0, 1.0) } else { 0.0 };
        let span = f64::from(hi.saturating_sub(lo));
        self.progress(lo.saturating_add((span * frac).round() as u8));
    }

    /// Mark the job done at 100%.
    pub fn finish(mut self) {
        self.settle(ExportStatus::Done, None);
    }

    /// Mark the job failed with `err`'s message.
    pub fn fail(mut self, err: &TypeCutError) {
        self.settle(ExportStatus::Failed, Some(err.to_string()));
    }

    /// Settle from a pipeline result and hand it back, kind-tagged on failure.
    pub fn complete<T>(self, result: TypeCutResult<T>) -> TypeCutResult<T> {
        let kind = self.kind;
        match result {
            Ok(v) => {
                self.finish();
                Ok(v)
            }
            Err(e) => {
                let e = e.in_export(kind);
                self.fail(&e);
                Err(e)
            }
        }
    }

    fn settle(&mut self, status: ExportStatus, error: Option<String>) {
        if self.settled {
            return;
        }
        self.settled = true;
        let done = status == ExportStatus::Done;
        let update = self.coordinator.update(|job| {
            job.status = status;
            if done {
                job.progress = 100;
            }
            job.error = error;
        });
        match status {
            ExportStatus::Done => tracing::info!(kind = %self.kind, "export finished"),
            _ => tracing::warn!(kind = %self.kind, "export failed"),
        }
        if let Some((kind, pct)) = update
            && done
        {
            self.coordinator.notify(kind, pct);
        }
    }
}

impl Drop for ExportGuard {
    fn drop(&mut self) {
        if !self.settled {
            self.settle(
                ExportStatus::Failed,
                Some("export ended without completing".to_owned()),
            );
        }
    }
}
