use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use tasklens_config::Postgres;
use tasklens_domain::{ModelVersion, Priority, TaskRecord, TaskStatus};
use tasklens_storage::{
	Error, TaskDirectory, VectorStore,
	db::Db,
	models::{EmbeddingRecord, IndexCursor},
	postgres::PgStore,
	queries,
};
use tasklens_testkit::TestDatabase;

const DIM: u32 = 3;

async fn bootstrap(test_db: &TestDatabase) -> PgStore {
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema(DIM).await.expect("Failed to ensure schema.");

	PgStore::new(db)
}

fn task(owner_id: Uuid, title: &str, updated_at: OffsetDateTime) -> TaskRecord {
	TaskRecord {
		task_id: Uuid::new_v4(),
		owner_id,
		title: title.to_string(),
		priority: Priority::High,
		status: TaskStatus::InProgress,
		created_at: updated_at,
		updated_at,
	}
}

fn embedding(task: &TaskRecord, version: &str, vector: Vec<f32>) -> EmbeddingRecord {
	EmbeddingRecord {
		task_id: task.task_id,
		owner_id: task.owner_id,
		model_version: ModelVersion::new(version),
		content_hash: tasklens_domain::content_hash(&task.title),
		vector,
		source_updated_at: task.updated_at,
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set TASKLENS_PG_DSN to run."]
async fn db_connects_and_bootstraps_twice() {
	let Some(base_dsn) = tasklens_testkit::env_dsn() else {
		eprintln!("Skipping db_connects_and_bootstraps_twice; set TASKLENS_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let store = bootstrap(&test_db).await;

	assert!(test_db.name().starts_with("tasklens_test_"));

	store.db().ensure_schema(DIM).await.expect("Schema bootstrap is not idempotent.");

	let count: i64 = sqlx::query_scalar(
		"\
SELECT count(*)
FROM information_schema.tables
WHERE table_name IN ('tasks', 'task_embeddings')",
	)
	.fetch_one(&store.db().pool)
	.await
	.expect("Failed to query schema tables.");

	assert_eq!(count, 2);

	store.db().close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set TASKLENS_PG_DSN to run."]
async fn embeddings_round_trip_and_stay_owner_scoped() {
	let Some(base_dsn) = tasklens_testkit::env_dsn() else {
		eprintln!(
			"Skipping embeddings_round_trip_and_stay_owner_scoped; set TASKLENS_PG_DSN to run this test."
		);

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let store = bootstrap(&test_db).await;
	let now = OffsetDateTime::now_utc();
	let alice = Uuid::new_v4();
	let bob = Uuid::new_v4();
	let milk = task(alice, "Buy milk", now);
	let bread = task(bob, "Buy bread", now);

	queries::insert_task(store.db(), &milk).await.expect("Failed to insert task.");
	queries::insert_task(store.db(), &bread).await.expect("Failed to insert task.");
	store.put(&embedding(&milk, "p:m:3", vec![0.25, -0.5, 1.0])).await.expect("Failed to put.");
	store.put(&embedding(&bread, "p:m:3", vec![1.0, 0.0, 0.0])).await.expect("Failed to put.");

	let candidates = store.query_candidates(alice).await.expect("Failed to query candidates.");

	assert_eq!(candidates.len(), 1);
	assert_eq!(candidates[0].task_id, milk.task_id);
	assert_eq!(candidates[0].vector, vec![0.25, -0.5, 1.0]);
	assert_eq!(candidates[0].model_version.as_str(), "p:m:3");

	let fetched = store
		.fetch_tasks(alice, &[milk.task_id, bread.task_id])
		.await
		.expect("Failed to fetch tasks.");

	assert_eq!(fetched.len(), 1);
	assert_eq!(fetched[0].status, TaskStatus::InProgress);
	assert_eq!(store.owner_of(bread.task_id).await.expect("Failed to read owner."), Some(bob));

	let mut hijack = embedding(&milk, "p:m:3", vec![0.0, 1.0, 0.0]);

	hijack.owner_id = bob;

	assert!(matches!(store.put(&hijack).await, Err(Error::Conflict(_))));

	assert!(
		queries::delete_task(store.db(), alice, milk.task_id).await.expect("Failed to delete.")
	);
	assert_eq!(store.owner_of(milk.task_id).await.expect("Failed to read owner."), None);
	assert!(!store.delete(milk.task_id).await.expect("Failed to delete embedding."));

	store.db().close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set TASKLENS_PG_DSN to run."]
async fn unindexed_scan_pages_by_cursor() {
	let Some(base_dsn) = tasklens_testkit::env_dsn() else {
		eprintln!("Skipping unindexed_scan_pages_by_cursor; set TASKLENS_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let store = bootstrap(&test_db).await;
	let now = OffsetDateTime::now_utc();
	let owner = Uuid::new_v4();
	let version = ModelVersion::new("p:m:3");
	let indexed = task(owner, "indexed", now - Duration::minutes(3));
	let first = task(owner, "first", now - Duration::minutes(2));
	let second = task(owner, "second", now - Duration::minutes(1));

	for t in [&indexed, &first, &second] {
		queries::insert_task(store.db(), t).await.expect("Failed to insert task.");
	}

	store.put(&embedding(&indexed, "p:m:3", vec![1.0, 0.0, 0.0])).await.expect("Failed to put.");

	let page = store.list_unindexed(&version, None, 1).await.expect("Failed to list.");

	assert_eq!(page.len(), 1);
	assert_eq!(page[0].task.task_id, first.task_id);

	let cursor = Some(IndexCursor::of(&page[0].task));
	let page = store.list_unindexed(&version, cursor, 10).await.expect("Failed to list.");

	assert_eq!(page.len(), 1);
	assert_eq!(page[0].task.task_id, second.task_id);

	assert!(
		queries::update_task_title(store.db(), owner, indexed.task_id, "renamed", now)
			.await
			.expect("Failed to update title.")
	);

	let page = store.list_unindexed(&version, None, 10).await.expect("Failed to list.");
	let renamed = page
		.iter()
		.find(|item| item.task.task_id == indexed.task_id)
		.expect("Renamed task must be listed.");

	assert_eq!(renamed.model_version.as_ref(), Some(&version));
	assert_ne!(renamed.content_hash.as_deref(), Some(tasklens_domain::content_hash("renamed").as_str()));

	store.mark_indexed(indexed.task_id, now).await.expect("Failed to mark indexed.");

	let page = store.list_unindexed(&version, None, 10).await.expect("Failed to list.");

	assert!(page.iter().all(|item| item.task.task_id != indexed.task_id));

	store.db().close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
