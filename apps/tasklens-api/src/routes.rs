use std::time::Duration;

use axum::{
	Json, Router,
	extract::{
		Path, State,
		rejection::{JsonRejection, PathRejection},
	},
	http::{
		HeaderMap, HeaderValue, StatusCode,
		header::{AUTHORIZATION, RETRY_AFTER},
	},
	response::{IntoResponse, Response},
	routing::{get, post, put},
};
use serde::Serialize;
use uuid::Uuid;

use crate::state::AppState;
use tasklens_domain::CallerIdentity;
use tasklens_service::{
	Error as ServiceError, IndexResponse, RemoveResponse, SearchRequest, SearchResponse,
};

/// Verified caller id forwarded by the auth gateway.
pub const USER_ID_HEADER: &str = "x-tasklens-user-id";

const UPSTREAM_RETRY_AFTER_SECS: &str = "1";

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/tasks/search", post(search))
		.route("/v1/tasks/{task_id}/embedding", put(index_task).delete(remove_task))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn search(
	State(state): State<AppState>,
	headers: HeaderMap,
	payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
	let caller = resolve_caller(&state, &headers)?;
	let Json(payload) = payload.map_err(|err| ApiError::invalid_request(err.body_text()))?;
	let service = state.service.clone();
	let deadline = Duration::from_millis(state.service.cfg.service.request_timeout_ms);
	// A dropped handler detaches the task; the search still finishes and its result is discarded.
	let handle = tokio::spawn(async move { service.search(caller, payload).await });
	let response = match tokio::time::timeout(deadline, handle).await {
		Ok(Ok(result)) => result?,
		Ok(Err(err)) => return Err(ServiceError::Internal { message: err.to_string() }.into()),
		Err(_) =>
			return Err(ServiceError::Upstream {
				message: "Request deadline elapsed.".to_string(),
			}
			.into()),
	};

	Ok(Json(response))
}

async fn index_task(
	State(state): State<AppState>,
	headers: HeaderMap,
	task_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<IndexResponse>, ApiError> {
	let caller = resolve_caller(&state, &headers)?;
	let Path(task_id) = task_id.map_err(|err| ApiError::invalid_request(err.body_text()))?;
	let response = state.service.index_task(caller, task_id).await?;

	Ok(Json(response))
}

async fn remove_task(
	State(state): State<AppState>,
	headers: HeaderMap,
	task_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<RemoveResponse>, ApiError> {
	let caller = resolve_caller(&state, &headers)?;
	let Path(task_id) = task_id.map_err(|err| ApiError::invalid_request(err.body_text()))?;
	let response = state.service.remove_task(caller, task_id).await?;

	Ok(Json(response))
}

/// Checks the gateway token when one is configured, then reads the forwarded user id. A missing
/// or malformed id yields `None`, which the service rejects.
fn resolve_caller(
	state: &AppState,
	headers: &HeaderMap,
) -> Result<Option<CallerIdentity>, ApiError> {
	if let Some(token) = state.service.cfg.security.api_auth_token.as_deref() {
		let presented = headers
			.get(AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.and_then(|value| value.strip_prefix("Bearer "));

		if presented != Some(token) {
			return Err(ServiceError::Unauthenticated.into());
		}
	}

	let caller = headers
		.get(USER_ID_HEADER)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| Uuid::parse_str(value.trim()).ok())
		.and_then(CallerIdentity::verified);

	Ok(caller)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: &'static str,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: &'static str,
	message: String,
	retry_after: bool,
}
impl ApiError {
	fn new(status: StatusCode, error_code: &'static str, message: impl Into<String>) -> Self {
		Self { status, error_code, message: message.into(), retry_after: false }
	}

	fn invalid_request(message: impl Into<String>) -> Self {
		Self::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message)
	}
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::Unauthenticated => Self::new(
				StatusCode::UNAUTHORIZED,
				"UNAUTHENTICATED",
				"Caller identity is missing or unverified.",
			),
			ServiceError::EmptyQuery => Self::new(
				StatusCode::UNPROCESSABLE_ENTITY,
				"EMPTY_QUERY",
				"Query must contain non-whitespace text within the length limit.",
			),
			ServiceError::InvalidRequest { message } => Self::invalid_request(message),
			ServiceError::NotFound { message } =>
				Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message),
			ServiceError::Upstream { message } => {
				tracing::warn!(error = %message, "Responding with upstream unavailable.");

				Self {
					retry_after: true,
					..Self::new(
						StatusCode::SERVICE_UNAVAILABLE,
						"UPSTREAM_UNAVAILABLE",
						"Search is temporarily unavailable. Retry shortly.",
					)
				}
			},
			ServiceError::Internal { message } => {
				tracing::error!(error = %message, "Responding with internal error.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", "Internal error.")
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };
		let mut response = (self.status, Json(body)).into_response();

		if self.retry_after {
			response
				.headers_mut()
				.insert(RETRY_AFTER, HeaderValue::from_static(UPSTREAM_RETRY_AFTER_SECS));
		}

		response
	}
}
