use std::{
	collections::HashMap,
	sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	BoxFuture, Error, Result, TaskDirectory, VectorStore,
	models::{EmbeddingRecord, IndexCursor, StoredEmbedding, UnindexedTask},
};
use tasklens_domain::{ModelVersion, TaskRecord};

#[derive(Default)]
struct MemoryState {
	tasks: HashMap<Uuid, TaskRecord>,
	embeddings: HashMap<Uuid, EmbeddingRecord>,
}

/// Process-local backend holding tasks and embeddings behind one lock. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
	state: Arc<RwLock<MemoryState>>,
}
impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Stands in for the CRUD layer's task writes.
	pub fn upsert_task(&self, task: TaskRecord) {
		self.write().tasks.insert(task.task_id, task);
	}

	/// Deletes the task and, like the Postgres foreign key, its embedding.
	pub fn delete_task(&self, task_id: Uuid) -> bool {
		let mut state = self.write();

		state.embeddings.remove(&task_id);

		state.tasks.remove(&task_id).is_some()
	}

	pub fn embedding(&self, task_id: Uuid) -> Option<EmbeddingRecord> {
		self.read().embeddings.get(&task_id).cloned()
	}

	pub fn embedding_count(&self) -> usize {
		self.read().embeddings.len()
	}

	fn read(&self) -> RwLockReadGuard<'_, MemoryState> {
		self.state.read().unwrap_or_else(|err| err.into_inner())
	}

	fn write(&self) -> RwLockWriteGuard<'_, MemoryState> {
		self.state.write().unwrap_or_else(|err| err.into_inner())
	}

	fn put_sync(&self, record: &EmbeddingRecord) -> Result<()> {
		let mut state = self.write();

		if let Some(existing) = state.embeddings.get(&record.task_id)
			&& existing.owner_id != record.owner_id
		{
			return Err(Error::Conflict(format!(
				"Embedding for task {} belongs to another owner.",
				record.task_id
			)));
		}

		state.embeddings.insert(record.task_id, record.clone());

		Ok(())
	}

	fn list_unindexed_sync(
		&self,
		model_version: &ModelVersion,
		after: Option<IndexCursor>,
		limit: u32,
	) -> Vec<UnindexedTask> {
		let state = self.read();
		let mut out: Vec<UnindexedTask> = state
			.tasks
			.values()
			.filter(|task| {
				after.map(|cursor| (task.updated_at, task.task_id) > (cursor.updated_at, cursor.task_id))
					.unwrap_or(true)
			})
			.filter_map(|task| {
				let embedding = state.embeddings.get(&task.task_id);
				let stale = match embedding {
					None => true,
					Some(embedding) =>
						&embedding.model_version != model_version
							|| task.updated_at > embedding.source_updated_at,
				};

				stale.then(|| UnindexedTask {
					task: task.clone(),
					model_version: embedding.map(|embedding| embedding.model_version.clone()),
					content_hash: embedding.map(|embedding| embedding.content_hash.clone()),
				})
			})
			.collect();

		out.sort_by_key(|item| (item.task.updated_at, item.task.task_id));
		out.truncate(limit as usize);

		out
	}
}

impl VectorStore for MemoryStore {
	fn put<'a>(&'a self, record: &'a EmbeddingRecord) -> BoxFuture<'a, Result<()>> {
		let result = self.put_sync(record);

		Box::pin(async move { result })
	}

	fn delete(&self, task_id: Uuid) -> BoxFuture<'_, Result<bool>> {
		let removed = self.write().embeddings.remove(&task_id).is_some();

		Box::pin(async move { Ok(removed) })
	}

	fn owner_of(&self, task_id: Uuid) -> BoxFuture<'_, Result<Option<Uuid>>> {
		let owner = self.read().embeddings.get(&task_id).map(|record| record.owner_id);

		Box::pin(async move { Ok(owner) })
	}

	fn query_candidates(&self, owner_id: Uuid) -> BoxFuture<'_, Result<Vec<StoredEmbedding>>> {
		let candidates: Vec<StoredEmbedding> = self
			.read()
			.embeddings
			.values()
			.filter(|record| record.owner_id == owner_id)
			.map(|record| StoredEmbedding {
				task_id: record.task_id,
				model_version: record.model_version.clone(),
				content_hash: record.content_hash.clone(),
				vector: record.vector.clone(),
			})
			.collect();

		Box::pin(async move { Ok(candidates) })
	}
}

impl TaskDirectory for MemoryStore {
	fn get_task(
		&self,
		owner_id: Uuid,
		task_id: Uuid,
	) -> BoxFuture<'_, Result<Option<TaskRecord>>> {
		let task = self.read().tasks.get(&task_id).filter(|task| task.owner_id == owner_id).cloned();

		Box::pin(async move { Ok(task) })
	}

	fn fetch_tasks<'a>(
		&'a self,
		owner_id: Uuid,
		task_ids: &'a [Uuid],
	) -> BoxFuture<'a, Result<Vec<TaskRecord>>> {
		let state = self.read();
		let tasks: Vec<TaskRecord> = task_ids
			.iter()
			.filter_map(|task_id| state.tasks.get(task_id))
			.filter(|task| task.owner_id == owner_id)
			.cloned()
			.collect();

		drop(state);

		Box::pin(async move { Ok(tasks) })
	}

	fn list_unindexed<'a>(
		&'a self,
		model_version: &'a ModelVersion,
		after: Option<IndexCursor>,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<UnindexedTask>>> {
		let tasks = self.list_unindexed_sync(model_version, after, limit);

		Box::pin(async move { Ok(tasks) })
	}

	fn mark_indexed(
		&self,
		task_id: Uuid,
		source_updated_at: OffsetDateTime,
	) -> BoxFuture<'_, Result<()>> {
		if let Some(record) = self.write().embeddings.get_mut(&task_id)
			&& record.source_updated_at < source_updated_at
		{
			record.source_updated_at = source_updated_at;
		}

		Box::pin(async move { Ok(()) })
	}
}

#[cfg(test)]
mod tests {
	use time::Duration;

	use super::*;
	use tasklens_domain::{Priority, TaskStatus};

	fn task(owner_id: Uuid, title: &str, updated_at: OffsetDateTime) -> TaskRecord {
		TaskRecord {
			task_id: Uuid::new_v4(),
			owner_id,
			title: title.to_string(),
			priority: Priority::Medium,
			status: TaskStatus::Pending,
			created_at: updated_at,
			updated_at,
		}
	}

	fn record(task: &TaskRecord, version: &str) -> EmbeddingRecord {
		EmbeddingRecord {
			task_id: task.task_id,
			owner_id: task.owner_id,
			model_version: ModelVersion::new(version),
			content_hash: tasklens_domain::content_hash(&task.title),
			vector: vec![1.0, 0.0],
			source_updated_at: task.updated_at,
		}
	}

	#[tokio::test]
	async fn candidates_are_owner_scoped() {
		let store = MemoryStore::new();
		let now = OffsetDateTime::now_utc();
		let alice = Uuid::new_v4();
		let bob = Uuid::new_v4();
		let a = task(alice, "Buy milk", now);
		let b = task(bob, "Buy bread", now);

		store.upsert_task(a.clone());
		store.upsert_task(b.clone());
		store.put(&record(&a, "v1")).await.expect("put failed");
		store.put(&record(&b, "v1")).await.expect("put failed");

		let candidates = store.query_candidates(alice).await.expect("query failed");

		assert_eq!(candidates.len(), 1);
		assert_eq!(candidates[0].task_id, a.task_id);
		assert!(store.get_task(alice, b.task_id).await.expect("get failed").is_none());
		assert!(
			store.fetch_tasks(alice, &[a.task_id, b.task_id]).await.expect("fetch failed").len()
				== 1
		);
	}

	#[tokio::test]
	async fn put_overwrites_and_refuses_owner_change() {
		let store = MemoryStore::new();
		let now = OffsetDateTime::now_utc();
		let owner = Uuid::new_v4();
		let t = task(owner, "Call John", now);
		let mut first = record(&t, "v1");

		store.put(&first).await.expect("put failed");

		first.vector = vec![0.0, 1.0];

		store.put(&first).await.expect("overwrite failed");

		assert_eq!(store.embedding(t.task_id).expect("missing record").vector, vec![0.0, 1.0]);

		let mut stolen = first.clone();

		stolen.owner_id = Uuid::new_v4();

		assert!(matches!(store.put(&stolen).await, Err(Error::Conflict(_))));
		assert_eq!(store.embedding_count(), 1);
	}

	#[tokio::test]
	async fn delete_is_idempotent_and_task_delete_cascades() {
		let store = MemoryStore::new();
		let now = OffsetDateTime::now_utc();
		let t = task(Uuid::new_v4(), "Finish report", now);

		store.upsert_task(t.clone());
		store.put(&record(&t, "v1")).await.expect("put failed");

		assert!(store.delete(t.task_id).await.expect("delete failed"));
		assert!(!store.delete(t.task_id).await.expect("delete failed"));

		store.put(&record(&t, "v1")).await.expect("put failed");

		assert!(store.delete_task(t.task_id));
		assert_eq!(store.embedding_count(), 0);
	}

	#[tokio::test]
	async fn unindexed_covers_missing_old_version_and_outdated() {
		let store = MemoryStore::new();
		let now = OffsetDateTime::now_utc();
		let owner = Uuid::new_v4();
		let fresh = task(owner, "fresh", now - Duration::minutes(4));
		let missing = task(owner, "missing", now - Duration::minutes(3));
		let old_version = task(owner, "old version", now - Duration::minutes(2));
		let mut outdated = task(owner, "outdated", now - Duration::minutes(1));

		for t in [&fresh, &missing, &old_version, &outdated] {
			store.upsert_task(t.clone());
		}

		store.put(&record(&fresh, "v2")).await.expect("put failed");
		store.put(&record(&old_version, "v1")).await.expect("put failed");
		store.put(&record(&outdated, "v2")).await.expect("put failed");

		outdated.updated_at = now;

		store.upsert_task(outdated.clone());

		let version = ModelVersion::new("v2");
		let listed = store.list_unindexed(&version, None, 10).await.expect("list failed");
		let ids: Vec<Uuid> = listed.iter().map(|item| item.task.task_id).collect();

		assert_eq!(ids, vec![missing.task_id, old_version.task_id, outdated.task_id]);
		assert!(listed[0].model_version.is_none());

		let after = Some(IndexCursor::of(&listed[0].task));
		let page = store.list_unindexed(&version, after, 1).await.expect("list failed");

		assert_eq!(page.len(), 1);
		assert_eq!(page[0].task.task_id, old_version.task_id);

		store.mark_indexed(outdated.task_id, now).await.expect("mark failed");

		let listed = store.list_unindexed(&version, None, 10).await.expect("list failed");

		assert_eq!(listed.len(), 2);
	}
}
