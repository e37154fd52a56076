use crate::{Error, Result, TaskLensService};
use tasklens_storage::models::IndexCursor;

/// Outcome of one reconciliation batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
	pub scanned: u32,
	pub reindexed: u32,
	pub refreshed: u32,
	pub failed: u32,
	/// The embedding provider was unavailable and the batch stopped early.
	pub halted: bool,
	/// Fewer tasks than requested were pending past the starting cursor.
	pub exhausted: bool,
	/// Position after the last task handled. Pass it back to continue the scan.
	pub cursor: Option<IndexCursor>,
}

impl TaskLensService {
	/// Repairs up to `batch_size` tasks whose embedding is missing, from another model version,
	/// or older than the task.
	///
	/// A task whose title still matches its current-version embedding only has its
	/// `source_updated_at` advanced. Per-task failures are counted and skipped; an unavailable
	/// provider halts the batch with the cursor left before the failed task.
	pub async fn reconcile_once(
		&self,
		after: Option<IndexCursor>,
		batch_size: u32,
	) -> Result<ReconcileReport> {
		let version = self.embedder.model_version();
		let batch = self.tasks.list_unindexed(version, after, batch_size).await?;
		let mut report = ReconcileReport {
			exhausted: batch.len() < batch_size as usize,
			cursor: after,
			..Default::default()
		};

		for item in batch {
			let task_id = item.task.task_id;

			report.scanned += 1;

			let current_hash = tasklens_domain::content_hash(item.task.title.trim());
			let still_current = item.model_version.as_ref() == Some(version)
				&& item.content_hash.as_deref() == Some(current_hash.as_str());

			if still_current {
				match self.tasks.mark_indexed(task_id, item.task.updated_at).await {
					Ok(()) => report.refreshed += 1,
					Err(err) => {
						report.failed += 1;

						tracing::warn!(%task_id, error = %err, "Failed to refresh task embedding.");
					},
				}
			} else {
				match self.embed_and_store(&item.task).await {
					Ok(_) => report.reindexed += 1,
					Err(err @ Error::Upstream { .. }) => {
						report.failed += 1;
						report.halted = true;
						report.exhausted = false;

						tracing::warn!(%task_id, error = %err, "Embedding provider unavailable. Halting batch.");

						break;
					},
					Err(err) => {
						report.failed += 1;

						tracing::warn!(%task_id, error = %err, "Failed to reindex task.");
					},
				}
			}

			report.cursor = Some(IndexCursor::of(&item.task));
		}

		Ok(report)
	}
}
