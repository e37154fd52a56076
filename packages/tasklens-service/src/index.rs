use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EmbeddingError, Error, Result, TaskLensService};
use tasklens_domain::{CallerIdentity, ModelVersion, TaskRecord};
use tasklens_storage::models::EmbeddingRecord;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct IndexResponse {
	pub task_id: Uuid,
	pub model_version: ModelVersion,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RemoveResponse {
	pub task_id: Uuid,
	/// `false` when there was nothing to remove.
	pub removed: bool,
}

impl TaskLensService {
	/// Recomputes the embedding for one of the caller's tasks from its current title.
	pub async fn index_task(
		&self,
		caller: Option<CallerIdentity>,
		task_id: Uuid,
	) -> Result<IndexResponse> {
		let caller = caller.ok_or(Error::Unauthenticated)?;
		let Some(task) = self.tasks.get_task(caller.user_id(), task_id).await? else {
			return Err(Error::NotFound { message: format!("Task {task_id} does not exist.") });
		};
		let model_version = self.embed_and_store(&task).await?;

		tracing::info!(%task_id, %model_version, "Task embedding updated.");

		Ok(IndexResponse { task_id, model_version })
	}

	/// Removes the embedding of one of the caller's tasks. Another owner's embedding is reported
	/// as missing.
	pub async fn remove_task(
		&self,
		caller: Option<CallerIdentity>,
		task_id: Uuid,
	) -> Result<RemoveResponse> {
		let caller = caller.ok_or(Error::Unauthenticated)?;

		match self.vectors.owner_of(task_id).await? {
			None => Ok(RemoveResponse { task_id, removed: false }),
			Some(owner_id) if owner_id != caller.user_id() =>
				Err(Error::NotFound { message: format!("Task {task_id} does not exist.") }),
			Some(_) => {
				let removed = self.vectors.delete(task_id).await?;

				tracing::info!(%task_id, removed, "Task embedding removed.");

				Ok(RemoveResponse { task_id, removed })
			},
		}
	}

	pub(crate) async fn embed_and_store(&self, task: &TaskRecord) -> Result<ModelVersion> {
		let embedded = self.embedder.embed(&task.title).await.map_err(|err| match err {
			EmbeddingError::Unavailable { message } => Error::Upstream { message },
			EmbeddingError::InvalidInput { message } => Error::InvalidRequest { message },
		})?;
		let record = EmbeddingRecord {
			task_id: task.task_id,
			owner_id: task.owner_id,
			model_version: embedded.model_version,
			content_hash: tasklens_domain::content_hash(task.title.trim()),
			vector: embedded.vector,
			source_updated_at: task.updated_at,
		};

		self.vectors.put(&record).await?;

		Ok(record.model_version)
	}
}
