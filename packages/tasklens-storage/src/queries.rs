//! Task-row writes. Production task CRUD lives outside this crate; these exist for tooling and
//! integration tests that seed the shared database.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Result, db::Db};
use tasklens_domain::TaskRecord;

pub async fn insert_task(db: &Db, task: &TaskRecord) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO tasks (task_id, owner_id, title, priority, status, created_at, updated_at)
VALUES ($1, $2, $3, $4, $5, $6, $7)",
	)
	.bind(task.task_id)
	.bind(task.owner_id)
	.bind(task.title.as_str())
	.bind(task.priority.as_str())
	.bind(task.status.as_str())
	.bind(task.created_at)
	.bind(task.updated_at)
	.execute(&db.pool)
	.await?;

	Ok(())
}

/// Returns `false` when no task with this id belongs to `owner_id`.
pub async fn update_task_title(
	db: &Db,
	owner_id: Uuid,
	task_id: Uuid,
	title: &str,
	updated_at: OffsetDateTime,
) -> Result<bool> {
	let result = sqlx::query(
		"UPDATE tasks SET title = $3, updated_at = $4 WHERE owner_id = $1 AND task_id = $2",
	)
	.bind(owner_id)
	.bind(task_id)
	.bind(title)
	.bind(updated_at)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() > 0)
}

/// The embedding row goes with the task through `ON DELETE CASCADE`.
pub async fn delete_task(db: &Db, owner_id: Uuid, task_id: Uuid) -> Result<bool> {
	let result = sqlx::query("DELETE FROM tasks WHERE owner_id = $1 AND task_id = $2")
		.bind(owner_id)
		.bind(task_id)
		.execute(&db.pool)
		.await?;

	Ok(result.rows_affected() > 0)
}
