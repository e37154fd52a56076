use std::{future::Future, pin::Pin};

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Result,
	models::{EmbeddingRecord, IndexCursor, StoredEmbedding, UnindexedTask},
};
use tasklens_domain::{ModelVersion, TaskRecord};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Owner-scoped storage for task embeddings. One record per task id.
pub trait VectorStore
where
	Self: Send + Sync,
{
	/// Upserts the record. A record may never move to a different owner; attempting it yields
	/// [`crate::Error::Conflict`].
	fn put<'a>(&'a self, record: &'a EmbeddingRecord) -> BoxFuture<'a, Result<()>>;

	/// Removes the task's record and reports whether one existed.
	fn delete(&self, task_id: Uuid) -> BoxFuture<'_, Result<bool>>;

	fn owner_of(&self, task_id: Uuid) -> BoxFuture<'_, Result<Option<Uuid>>>;

	/// Every record owned by `owner_id` and nothing else.
	fn query_candidates(&self, owner_id: Uuid) -> BoxFuture<'_, Result<Vec<StoredEmbedding>>>;
}

/// Read access to the task table maintained by the CRUD layer.
pub trait TaskDirectory
where
	Self: Send + Sync,
{
	fn get_task(
		&self,
		owner_id: Uuid,
		task_id: Uuid,
	) -> BoxFuture<'_, Result<Option<TaskRecord>>>;

	fn fetch_tasks<'a>(
		&'a self,
		owner_id: Uuid,
		task_ids: &'a [Uuid],
	) -> BoxFuture<'a, Result<Vec<TaskRecord>>>;

	/// Tasks whose embedding is missing, from another model version, or older than the task,
	/// ordered by `(updated_at, task_id)` and strictly after `after`.
	fn list_unindexed<'a>(
		&'a self,
		model_version: &'a ModelVersion,
		after: Option<IndexCursor>,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<UnindexedTask>>>;

	/// Records that the current embedding still matches the task as of `source_updated_at`.
	fn mark_indexed(
		&self,
		task_id: Uuid,
		source_updated_at: OffsetDateTime,
	) -> BoxFuture<'_, Result<()>>;
}
