use time::OffsetDateTime;
use uuid::Uuid;

use tasklens_domain::{ModelVersion, TaskRecord};

/// One task's embedding as written by the indexing path.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddingRecord {
	pub task_id: Uuid,
	pub owner_id: Uuid,
	pub model_version: ModelVersion,
	pub content_hash: String,
	pub vector: Vec<f32>,
	/// The task's `updated_at` when the embedded title was read.
	pub source_updated_at: OffsetDateTime,
}

/// A ranking candidate as returned by an owner-scoped query.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredEmbedding {
	pub task_id: Uuid,
	pub model_version: ModelVersion,
	pub content_hash: String,
	pub vector: Vec<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct UnindexedTask {
	pub task: TaskRecord,
	pub model_version: Option<ModelVersion>,
	pub content_hash: Option<String>,
}

/// Keyset position in the `(updated_at, task_id)` order used by reconciliation scans.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexCursor {
	pub updated_at: OffsetDateTime,
	pub task_id: Uuid,
}
impl IndexCursor {
	pub fn of(task: &TaskRecord) -> Self {
		Self { updated_at: task.updated_at, task_id: task.task_id }
	}
}
