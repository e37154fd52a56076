use std::{sync::Arc, time::Duration};

use axum::{
	Router,
	body::{self, Body},
	http::{Request, Response, StatusCode, header::RETRY_AFTER},
};
use serde_json::Value;
use time::OffsetDateTime;
use tower::util::ServiceExt;
use uuid::Uuid;

use tasklens_api::{
	routes::{self, USER_ID_HEADER},
	state::AppState,
};
use tasklens_config::{Config, EmbeddingProviderConfig};
use tasklens_domain::{ModelVersion, Priority, TaskRecord, TaskStatus};
use tasklens_service::{BoxFuture, EmbeddingProvider, TaskLensService};
use tasklens_storage::{
	TaskDirectory, VectorStore,
	memory::MemoryStore,
	models::{EmbeddingRecord, IndexCursor, StoredEmbedding, UnindexedTask},
};

const BASE_CONFIG: &str = r#"
[service]
http_bind = "127.0.0.1:0"
log_level = "info"
request_timeout_ms = 2000

[storage.postgres]
dsn = "postgres://postgres@127.0.0.1/unused"
pool_max_conns = 1

[providers.embedding]
provider_id = "stub"
api_base = "http://127.0.0.1:1"
api_key = "test-key"
path = "/embeddings"
model = "stub-embed"
dimensions = 3
timeout_ms = 200

[search]
top_k = 5

[search.cache]
enabled = false

[security]
bind_localhost_only = true
"#;

fn config() -> Config {
	tasklens_config::parse(BASE_CONFIG).expect("Test config must be valid.")
}

/// Every text embeds to the same vector after `delay`.
struct FixedEmbedding {
	delay: Duration,
}
impl EmbeddingProvider for FixedEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, tasklens_providers::Result<Vec<Vec<f32>>>> {
		let out: Vec<Vec<f32>> = vec![vec![1.0, 0.0, 0.0]; texts.len()];
		let delay = self.delay;

		Box::pin(async move {
			tokio::time::sleep(delay).await;

			Ok(out)
		})
	}
}

/// Refuses every text with a reply body that must stay server-side.
struct RejectingEmbedding;
impl EmbeddingProvider for RejectingEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		_texts: &'a [String],
	) -> BoxFuture<'a, tasklens_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(async {
			Err::<Vec<Vec<f32>>, _>(tasklens_providers::Error::Rejected {
				status: 400,
				message: r#"{"error":"org-internal-acct-42 quota tier"}"#.to_string(),
			})
		})
	}
}

/// Fails every read with a detail that must never reach the client.
struct BrokenStore;
impl BrokenStore {
	fn fail<'a, T: Send + 'a>() -> BoxFuture<'a, tasklens_storage::Result<T>> {
		Box::pin(async {
			Err::<T, _>(tasklens_storage::Error::InvalidRow("secret row detail".to_string()))
		})
	}
}
impl VectorStore for BrokenStore {
	fn put<'a>(&'a self, _record: &'a EmbeddingRecord) -> BoxFuture<'a, tasklens_storage::Result<()>> {
		Self::fail()
	}

	fn delete(&self, _task_id: Uuid) -> BoxFuture<'_, tasklens_storage::Result<bool>> {
		Self::fail()
	}

	fn owner_of(&self, _task_id: Uuid) -> BoxFuture<'_, tasklens_storage::Result<Option<Uuid>>> {
		Self::fail()
	}

	fn query_candidates(
		&self,
		_owner_id: Uuid,
	) -> BoxFuture<'_, tasklens_storage::Result<Vec<StoredEmbedding>>> {
		Self::fail()
	}
}
impl TaskDirectory for BrokenStore {
	fn get_task(
		&self,
		_owner_id: Uuid,
		_task_id: Uuid,
	) -> BoxFuture<'_, tasklens_storage::Result<Option<TaskRecord>>> {
		Self::fail()
	}

	fn fetch_tasks<'a>(
		&'a self,
		_owner_id: Uuid,
		_task_ids: &'a [Uuid],
	) -> BoxFuture<'a, tasklens_storage::Result<Vec<TaskRecord>>> {
		Self::fail()
	}

	fn list_unindexed<'a>(
		&'a self,
		_model_version: &'a ModelVersion,
		_after: Option<IndexCursor>,
		_limit: u32,
	) -> BoxFuture<'a, tasklens_storage::Result<Vec<UnindexedTask>>> {
		Self::fail()
	}

	fn mark_indexed(
		&self,
		_task_id: Uuid,
		_source_updated_at: OffsetDateTime,
	) -> BoxFuture<'_, tasklens_storage::Result<()>> {
		Self::fail()
	}
}

fn app_with(cfg: Config, store: &MemoryStore, delay: Duration) -> Router {
	let service =
		TaskLensService::with_provider(cfg, store.clone(), Arc::new(FixedEmbedding { delay }));

	routes::router(AppState::from_service(service))
}

fn app(store: &MemoryStore) -> Router {
	app_with(config(), store, Duration::ZERO)
}

fn search_request(user: Option<&str>, body: &str) -> Request<Body> {
	let mut builder = Request::builder()
		.method("POST")
		.uri("/v1/tasks/search")
		.header("content-type", "application/json");

	if let Some(user) = user {
		builder = builder.header(USER_ID_HEADER, user);
	}

	builder.body(Body::from(body.to_string())).expect("Failed to build request.")
}

fn embedding_request(method: &str, user: Uuid, task_id: &str) -> Request<Body> {
	Request::builder()
		.method(method)
		.uri(format!("/v1/tasks/{task_id}/embedding"))
		.header(USER_ID_HEADER, user.to_string())
		.body(Body::empty())
		.expect("Failed to build request.")
}

async fn json_body(response: Response<Body>) -> Value {
	let body = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");

	serde_json::from_slice(&body).expect("Failed to parse response.")
}

fn task(owner_id: Uuid, title: &str) -> TaskRecord {
	let now = OffsetDateTime::now_utc();

	TaskRecord {
		task_id: Uuid::new_v4(),
		owner_id,
		title: title.to_string(),
		priority: Priority::High,
		status: TaskStatus::InProgress,
		created_at: now,
		updated_at: now,
	}
}

#[tokio::test]
async fn health_ok() {
	let response = app(&MemoryStore::new())
		.oneshot(Request::builder().uri("/health").body(Body::empty()).expect("Failed to build."))
		.await
		.expect("Failed to call /health.");

	assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn search_without_identity_is_unauthenticated() {
	for user in [None, Some("not-a-uuid"), Some("00000000-0000-0000-0000-000000000000")] {
		let response = app(&MemoryStore::new())
			.oneshot(search_request(user, r#"{"query":"milk"}"#))
			.await
			.expect("Failed to call search.");

		assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
		assert_eq!(json_body(response).await["error_code"], "UNAUTHENTICATED");
	}
}

#[tokio::test]
async fn blank_query_is_unprocessable() {
	let user = Uuid::new_v4().to_string();
	let response = app(&MemoryStore::new())
		.oneshot(search_request(Some(&user), r#"{"query":"   "}"#))
		.await
		.expect("Failed to call search.");

	assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
	assert_eq!(json_body(response).await["error_code"], "EMPTY_QUERY");
}

#[tokio::test]
async fn malformed_body_is_invalid_request() {
	let user = Uuid::new_v4().to_string();
	let response = app(&MemoryStore::new())
		.oneshot(search_request(Some(&user), r#"{"text":"milk"}"#))
		.await
		.expect("Failed to call search.");

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	assert_eq!(json_body(response).await["error_code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn indexed_tasks_are_searchable_by_their_owner_only() {
	let store = MemoryStore::new();
	let alice = Uuid::new_v4();
	let t = task(alice, "Buy milk");

	store.upsert_task(t.clone());

	let response = app(&store)
		.oneshot(embedding_request("PUT", alice, &t.task_id.to_string()))
		.await
		.expect("Failed to call index.");

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(json_body(response).await["model_version"], "stub:stub-embed:3");

	let body = serde_json::json!({ "query": "milk", "user_id": Uuid::new_v4() }).to_string();
	let response = app(&store)
		.oneshot(search_request(Some(&alice.to_string()), &body))
		.await
		.expect("Failed to call search.");

	assert_eq!(response.status(), StatusCode::OK);

	let json = json_body(response).await;

	assert_eq!(json["items"][0]["task_id"], t.task_id.to_string());
	assert_eq!(json["items"][0]["title"], "Buy milk");
	assert_eq!(json["items"][0]["priority"], "high");
	assert_eq!(json["items"][0]["status"], "in-progress");
	assert_eq!(json["items"][0]["similarity"], 1.0);

	let other = Uuid::new_v4().to_string();
	let response = app(&store)
		.oneshot(search_request(Some(&other), r#"{"query":"milk"}"#))
		.await
		.expect("Failed to call search.");

	assert_eq!(json_body(response).await["items"], serde_json::json!([]));
}

#[tokio::test]
async fn removing_another_owners_embedding_is_not_found() {
	let store = MemoryStore::new();
	let alice = Uuid::new_v4();
	let t = task(alice, "Call John");

	store.upsert_task(t.clone());

	let task_id = t.task_id.to_string();
	let response = app(&store)
		.oneshot(embedding_request("PUT", alice, &task_id))
		.await
		.expect("Failed to call index.");

	assert_eq!(response.status(), StatusCode::OK);

	let response = app(&store)
		.oneshot(embedding_request("DELETE", Uuid::new_v4(), &task_id))
		.await
		.expect("Failed to call remove.");

	assert_eq!(response.status(), StatusCode::NOT_FOUND);
	assert_eq!(json_body(response).await["error_code"], "NOT_FOUND");

	let response = app(&store)
		.oneshot(embedding_request("DELETE", alice, &task_id))
		.await
		.expect("Failed to call remove.");

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(json_body(response).await["removed"], true);
}

#[tokio::test]
async fn malformed_task_id_is_invalid_request() {
	let response = app(&MemoryStore::new())
		.oneshot(embedding_request("PUT", Uuid::new_v4(), "not-a-uuid"))
		.await
		.expect("Failed to call index.");

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	assert_eq!(json_body(response).await["error_code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn slow_embedder_is_upstream_unavailable_with_retry_after() {
	let user = Uuid::new_v4().to_string();
	let response = app_with(config(), &MemoryStore::new(), Duration::from_secs(1))
		.oneshot(search_request(Some(&user), r#"{"query":"milk"}"#))
		.await
		.expect("Failed to call search.");

	assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
	assert_eq!(
		response.headers().get(RETRY_AFTER).and_then(|value| value.to_str().ok()),
		Some("1")
	);
	assert_eq!(json_body(response).await["error_code"], "UPSTREAM_UNAVAILABLE");
}

#[tokio::test]
async fn elapsed_request_deadline_is_upstream_unavailable() {
	let mut cfg = config();

	cfg.service.request_timeout_ms = 20;
	cfg.providers.embedding.timeout_ms = 5_000;

	let user = Uuid::new_v4().to_string();
	let response = app_with(cfg, &MemoryStore::new(), Duration::from_millis(500))
		.oneshot(search_request(Some(&user), r#"{"query":"milk"}"#))
		.await
		.expect("Failed to call search.");

	assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
	assert_eq!(json_body(response).await["error_code"], "UPSTREAM_UNAVAILABLE");
}

#[tokio::test]
async fn storage_failure_is_internal_without_detail() {
	let service = TaskLensService::with_provider(
		config(),
		BrokenStore,
		Arc::new(FixedEmbedding { delay: Duration::ZERO }),
	);
	let user = Uuid::new_v4().to_string();
	let response = routes::router(AppState::from_service(service))
		.oneshot(search_request(Some(&user), r#"{"query":"milk"}"#))
		.await
		.expect("Failed to call search.");

	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

	let json = json_body(response).await;

	assert_eq!(json["error_code"], "INTERNAL");
	assert!(!json["message"].as_str().unwrap_or_default().contains("secret"));
}

#[tokio::test]
async fn provider_rejection_does_not_leak_provider_reply() {
	let store = MemoryStore::new();
	let alice = Uuid::new_v4();
	let t = task(alice, "Renew passport");

	store.upsert_task(t.clone());

	let service =
		TaskLensService::with_provider(config(), store.clone(), Arc::new(RejectingEmbedding));
	let response = routes::router(AppState::from_service(service))
		.oneshot(embedding_request("PUT", alice, &t.task_id.to_string()))
		.await
		.expect("Failed to call index.");

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);

	let json = json_body(response).await;
	let message = json["message"].as_str().unwrap_or_default();

	assert_eq!(json["error_code"], "INVALID_REQUEST");
	assert!(!message.contains("org-internal-acct-42"));
	assert!(!message.contains("quota tier"));
	assert_eq!(store.embedding_count(), 0);
}

#[tokio::test]
async fn gateway_token_is_required_when_configured() {
	let mut cfg = config();

	cfg.security.api_auth_token = Some("gateway-secret".to_string());

	let store = MemoryStore::new();
	let user = Uuid::new_v4().to_string();
	let response = app_with(cfg.clone(), &store, Duration::ZERO)
		.oneshot(search_request(Some(&user), r#"{"query":"milk"}"#))
		.await
		.expect("Failed to call search.");

	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

	let mut request = search_request(Some(&user), r#"{"query":"milk"}"#);

	request
		.headers_mut()
		.insert("authorization", "Bearer gateway-secret".parse().expect("Valid header value."));

	let response =
		app_with(cfg, &store, Duration::ZERO).oneshot(request).await.expect("Failed to call search.");

	assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set TASKLENS_PG_DSN to run."]
async fn postgres_backed_app_serves_requests() {
	let Some(base_dsn) = tasklens_testkit::env_dsn() else {
		eprintln!("Skipping postgres_backed_app_serves_requests; set TASKLENS_PG_DSN to run.");

		return;
	};

	tasklens_testkit::with_test_db(&base_dsn, |test_db| {
		let dsn = test_db.dsn().to_string();

		async move {
			let mut cfg = config();

			cfg.storage.postgres.dsn = dsn;

			let state = AppState::new(cfg).await.expect("Failed to initialize app state.");
			let app = routes::router(state.clone());
			let user = Uuid::new_v4();
			let response = app
				.clone()
				.oneshot(embedding_request("PUT", user, &Uuid::new_v4().to_string()))
				.await
				.expect("Failed to call index.");

			assert_eq!(response.status(), StatusCode::NOT_FOUND);

			let response = app
				.oneshot(search_request(Some(&user.to_string()), r#"{"query":"milk"}"#))
				.await
				.expect("Failed to call search.");

			assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

			state.close().await;

			Ok(())
		}
	})
	.await
	.expect("Test database lifecycle failed.");
}
