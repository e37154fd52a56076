use sqlx::{Row, postgres::PgRow};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	BoxFuture, Error, Result, TaskDirectory, VectorStore,
	db::Db,
	models::{EmbeddingRecord, IndexCursor, StoredEmbedding, UnindexedTask},
	vector,
};
use tasklens_domain::{ModelVersion, TaskRecord};

const TASK_COLUMNS: &str =
	"t.task_id, t.owner_id, t.title, t.priority, t.status, t.created_at, t.updated_at";

/// Postgres + pgvector backend. Both tables live in the same database so task deletion cascades
/// to the embedding.
#[derive(Clone)]
pub struct PgStore {
	db: Db,
}
impl PgStore {
	pub fn new(db: Db) -> Self {
		Self { db }
	}

	pub fn db(&self) -> &Db {
		&self.db
	}

	async fn put_inner(&self, record: &EmbeddingRecord) -> Result<()> {
		let dim = i32::try_from(record.vector.len()).map_err(|_| {
			Error::InvalidArgument("Embedding dimension exceeds supported range.".to_string())
		})?;
		let vec_text = vector::vector_to_pg(&record.vector);
		let result = sqlx::query(
			"\
INSERT INTO task_embeddings (
	task_id,
	owner_id,
	model_version,
	embedding_dim,
	content_hash,
	vec,
	source_updated_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6::text::vector, $7, now())
ON CONFLICT (task_id) DO UPDATE
SET
	model_version = EXCLUDED.model_version,
	embedding_dim = EXCLUDED.embedding_dim,
	content_hash = EXCLUDED.content_hash,
	vec = EXCLUDED.vec,
	source_updated_at = EXCLUDED.source_updated_at,
	updated_at = now()
WHERE task_embeddings.owner_id = EXCLUDED.owner_id",
		)
		.bind(record.task_id)
		.bind(record.owner_id)
		.bind(record.model_version.as_str())
		.bind(dim)
		.bind(record.content_hash.as_str())
		.bind(vec_text.as_str())
		.bind(record.source_updated_at)
		.execute(&self.db.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(Error::Conflict(format!(
				"Embedding for task {} belongs to another owner.",
				record.task_id
			)));
		}

		Ok(())
	}

	async fn delete_inner(&self, task_id: Uuid) -> Result<bool> {
		let result = sqlx::query("DELETE FROM task_embeddings WHERE task_id = $1")
			.bind(task_id)
			.execute(&self.db.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	async fn owner_of_inner(&self, task_id: Uuid) -> Result<Option<Uuid>> {
		let owner = sqlx::query_scalar("SELECT owner_id FROM task_embeddings WHERE task_id = $1")
			.bind(task_id)
			.fetch_optional(&self.db.pool)
			.await?;

		Ok(owner)
	}

	async fn query_candidates_inner(&self, owner_id: Uuid) -> Result<Vec<StoredEmbedding>> {
		let rows = sqlx::query(
			"\
SELECT task_id, model_version, content_hash, vec::text AS vec
FROM task_embeddings
WHERE owner_id = $1",
		)
		.bind(owner_id)
		.fetch_all(&self.db.pool)
		.await?;
		let mut out = Vec::with_capacity(rows.len());

		for row in rows {
			let vec_text: String = row.try_get("vec")?;

			out.push(StoredEmbedding {
				task_id: row.try_get("task_id")?,
				model_version: ModelVersion::new(row.try_get::<String, _>("model_version")?),
				content_hash: row.try_get("content_hash")?,
				vector: vector::parse_pg_vector(&vec_text)?,
			});
		}

		Ok(out)
	}

	async fn get_task_inner(&self, owner_id: Uuid, task_id: Uuid) -> Result<Option<TaskRecord>> {
		let sql =
			format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.owner_id = $1 AND t.task_id = $2");
		let row = sqlx::query(&sql)
			.bind(owner_id)
			.bind(task_id)
			.fetch_optional(&self.db.pool)
			.await?;

		row.as_ref().map(task_from_row).transpose()
	}

	async fn fetch_tasks_inner(&self, owner_id: Uuid, task_ids: &[Uuid]) -> Result<Vec<TaskRecord>> {
		if task_ids.is_empty() {
			return Ok(Vec::new());
		}

		let sql = format!(
			"SELECT {TASK_COLUMNS} FROM tasks t WHERE t.owner_id = $1 AND t.task_id = ANY($2)"
		);
		let rows = sqlx::query(&sql).bind(owner_id).bind(task_ids).fetch_all(&self.db.pool).await?;

		rows.iter().map(task_from_row).collect()
	}

	async fn list_unindexed_inner(
		&self,
		model_version: &ModelVersion,
		after: Option<IndexCursor>,
		limit: u32,
	) -> Result<Vec<UnindexedTask>> {
		let sql = format!(
			"\
SELECT {TASK_COLUMNS}, e.model_version AS embedding_model_version, e.content_hash
FROM tasks t
LEFT JOIN task_embeddings e ON e.task_id = t.task_id
WHERE (e.task_id IS NULL OR e.model_version <> $1 OR t.updated_at > e.source_updated_at)
	AND ($2::timestamptz IS NULL OR (t.updated_at, t.task_id) > ($2, $3::uuid))
ORDER BY t.updated_at ASC, t.task_id ASC
LIMIT $4"
		);
		let rows = sqlx::query(&sql)
			.bind(model_version.as_str())
			.bind(after.map(|cursor| cursor.updated_at))
			.bind(after.map(|cursor| cursor.task_id))
			.bind(i64::from(limit))
			.fetch_all(&self.db.pool)
			.await?;
		let mut out = Vec::with_capacity(rows.len());

		for row in &rows {
			out.push(UnindexedTask {
				task: task_from_row(row)?,
				model_version: row
					.try_get::<Option<String>, _>("embedding_model_version")?
					.map(ModelVersion::new),
				content_hash: row.try_get("content_hash")?,
			});
		}

		Ok(out)
	}

	async fn mark_indexed_inner(
		&self,
		task_id: Uuid,
		source_updated_at: OffsetDateTime,
	) -> Result<()> {
		sqlx::query(
			"\
UPDATE task_embeddings
SET source_updated_at = $2
WHERE task_id = $1 AND source_updated_at < $2",
		)
		.bind(task_id)
		.bind(source_updated_at)
		.execute(&self.db.pool)
		.await?;

		Ok(())
	}
}

impl VectorStore for PgStore {
	fn put<'a>(&'a self, record: &'a EmbeddingRecord) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.put_inner(record))
	}

	fn delete(&self, task_id: Uuid) -> BoxFuture<'_, Result<bool>> {
		Box::pin(self.delete_inner(task_id))
	}

	fn owner_of(&self, task_id: Uuid) -> BoxFuture<'_, Result<Option<Uuid>>> {
		Box::pin(self.owner_of_inner(task_id))
	}

	fn query_candidates(&self, owner_id: Uuid) -> BoxFuture<'_, Result<Vec<StoredEmbedding>>> {
		Box::pin(self.query_candidates_inner(owner_id))
	}
}

impl TaskDirectory for PgStore {
	fn get_task(
		&self,
		owner_id: Uuid,
		task_id: Uuid,
	) -> BoxFuture<'_, Result<Option<TaskRecord>>> {
		Box::pin(self.get_task_inner(owner_id, task_id))
	}

	fn fetch_tasks<'a>(
		&'a self,
		owner_id: Uuid,
		task_ids: &'a [Uuid],
	) -> BoxFuture<'a, Result<Vec<TaskRecord>>> {
		Box::pin(self.fetch_tasks_inner(owner_id, task_ids))
	}

	fn list_unindexed<'a>(
		&'a self,
		model_version: &'a ModelVersion,
		after: Option<IndexCursor>,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<UnindexedTask>>> {
		Box::pin(self.list_unindexed_inner(model_version, after, limit))
	}

	fn mark_indexed(
		&self,
		task_id: Uuid,
		source_updated_at: OffsetDateTime,
	) -> BoxFuture<'_, Result<()>> {
		Box::pin(self.mark_indexed_inner(task_id, source_updated_at))
	}
}

fn task_from_row(row: &PgRow) -> Result<TaskRecord> {
	let priority: String = row.try_get("priority")?;
	let status: String = row.try_get("status")?;

	Ok(TaskRecord {
		task_id: row.try_get("task_id")?,
		owner_id: row.try_get("owner_id")?,
		title: row.try_get("title")?,
		priority: priority.parse().map_err(|err| Error::InvalidRow(format!("{err}")))?,
		status: status.parse().map_err(|err| Error::InvalidRow(format!("{err}")))?,
		created_at: row.try_get("created_at")?,
		updated_at: row.try_get("updated_at")?,
	})
}
