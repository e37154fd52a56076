use std::time::Duration;

use tasklens_config::Worker;
use tasklens_service::{ReconcileReport, TaskLensService};
use tasklens_storage::models::IndexCursor;

const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Where the scan resumes and how many batches in a row have failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanState {
	pub cursor: Option<IndexCursor>,
	pub failures: u32,
}
impl ScanState {
	/// Folds one batch outcome into the state and returns how long to wait before the next one.
	pub fn record(
		&mut self,
		outcome: &tasklens_service::Result<ReconcileReport>,
		cfg: &Worker,
	) -> Duration {
		match outcome {
			Ok(report) if report.halted => {
				self.cursor = report.cursor;
				self.failures += 1;

				backoff_for_attempt(self.failures, cfg)
			},
			// Every task failed without the provider being down, most likely the store. Move past
			// the batch but slow down.
			Ok(report) if report.scanned > 0 && report.failed == report.scanned => {
				self.cursor = if report.exhausted { None } else { report.cursor };
				self.failures += 1;

				backoff_for_attempt(self.failures, cfg)
			},
			Ok(report) => {
				self.failures = 0;

				if report.exhausted {
					self.cursor = None;

					Duration::from_millis(cfg.poll_interval_ms)
				} else {
					self.cursor = report.cursor;

					Duration::ZERO
				}
			},
			Err(_) => {
				self.failures += 1;

				backoff_for_attempt(self.failures, cfg)
			},
		}
	}
}

pub async fn run_worker(service: &TaskLensService) -> color_eyre::Result<()> {
	let cfg = service.cfg.worker.clone();
	let mut scan = ScanState::default();

	loop {
		let outcome = service.reconcile_once(scan.cursor, cfg.batch_size).await;

		match &outcome {
			Ok(report) if report.scanned > 0 => tracing::info!(
				scanned = report.scanned,
				reindexed = report.reindexed,
				refreshed = report.refreshed,
				failed = report.failed,
				halted = report.halted,
				"Reconcile batch finished."
			),
			Ok(_) => tracing::debug!("No tasks pending reconciliation."),
			Err(err) => tracing::error!(error = %err, "Reconcile batch failed."),
		}

		let wait = scan.record(&outcome, &cfg);

		if !wait.is_zero() {
			tokio::time::sleep(wait).await;
		}
	}
}

fn backoff_for_attempt(attempt: u32, cfg: &Worker) -> Duration {
	let exp = attempt.max(1).saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
	let delay = cfg.base_backoff_ms.saturating_mul(1 << exp).min(cfg.max_backoff_ms);

	Duration::from_millis(delay)
}
