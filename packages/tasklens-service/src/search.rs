pub mod ranking;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EmbeddingError, Error, Result, TaskLensService, search::ranking::RankCandidate};
use tasklens_domain::{CallerIdentity, Priority, TaskRecord, TaskStatus};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SearchRequest {
	pub query: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SearchItem {
	pub task_id: Uuid,
	pub title: String,
	pub priority: Priority,
	pub status: TaskStatus,
	/// Cosine similarity clamped into [0, 1].
	pub similarity: f32,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct SearchResponse {
	pub items: Vec<SearchItem>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchStage {
	Validating,
	Embedding,
	Fetching,
	Ranking,
	Done,
}
impl SearchStage {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Validating => "validating",
			Self::Embedding => "embedding",
			Self::Fetching => "fetching",
			Self::Ranking => "ranking",
			Self::Done => "done",
		}
	}
}

impl TaskLensService {
	/// Ranks the caller's own tasks against a free-text query. Either every stage succeeds or
	/// the caller gets an error and no items.
	pub async fn search(
		&self,
		caller: Option<CallerIdentity>,
		req: SearchRequest,
	) -> Result<SearchResponse> {
		let Some(caller) = caller else {
			return Err(failed(SearchStage::Validating, Error::Unauthenticated));
		};
		let query = req.query.trim();

		if query.is_empty() {
			return Err(failed(SearchStage::Validating, Error::EmptyQuery));
		}

		tracing::debug!(stage = SearchStage::Embedding.as_str(), %caller, "Search stage.");

		let embedded = self.embedder.embed(query).await.map_err(|err| {
			let err = match err {
				EmbeddingError::Unavailable { message } => Error::Upstream { message },
				EmbeddingError::InvalidInput { .. } => Error::EmptyQuery,
			};

			failed(SearchStage::Embedding, err)
		})?;

		tracing::debug!(stage = SearchStage::Fetching.as_str(), %caller, "Search stage.");

		let owner_id = caller.user_id();
		let stored = self
			.vectors
			.query_candidates(owner_id)
			.await
			.map_err(|err| failed(SearchStage::Fetching, Error::internal(err)))?;
		let task_ids: Vec<Uuid> = stored.iter().map(|candidate| candidate.task_id).collect();
		let mut tasks: HashMap<Uuid, TaskRecord> = self
			.tasks
			.fetch_tasks(owner_id, &task_ids)
			.await
			.map_err(|err| failed(SearchStage::Fetching, Error::internal(err)))?
			.into_iter()
			.map(|task| (task.task_id, task))
			.collect();
		let candidates: Vec<RankCandidate> = stored
			.into_iter()
			.filter_map(|candidate| {
				let task = tasks.get(&candidate.task_id)?;

				(candidate.content_hash == tasklens_domain::content_hash(task.title.trim())).then(
					|| RankCandidate {
						task_id: candidate.task_id,
						vector: candidate.vector,
						model_version: candidate.model_version,
						updated_at: task.updated_at,
					},
				)
			})
			.collect();

		tracing::debug!(
			stage = SearchStage::Ranking.as_str(),
			%caller,
			candidates = candidates.len(),
			"Search stage."
		);

		let ranked = ranking::rank(
			&embedded.vector,
			candidates,
			&embedded.model_version,
			self.cfg.search.top_k,
		);
		let mut items = Vec::with_capacity(ranked.len());

		for hit in ranked {
			let Some(task) = tasks.remove(&hit.task_id) else {
				return Err(failed(
					SearchStage::Ranking,
					Error::internal(format!("Ranked task {} has no task row.", hit.task_id)),
				));
			};

			items.push(SearchItem {
				task_id: task.task_id,
				title: task.title,
				priority: task.priority,
				status: task.status,
				similarity: hit.display_similarity(),
			});
		}

		tracing::debug!(
			stage = SearchStage::Done.as_str(),
			%caller,
			items = items.len(),
			"Search stage."
		);

		Ok(SearchResponse { items })
	}
}

fn failed(stage: SearchStage, err: Error) -> Error {
	match &err {
		Error::Upstream { .. } =>
			tracing::warn!(stage = stage.as_str(), error = %err, "Search failed."),
		Error::Internal { .. } =>
			tracing::error!(stage = stage.as_str(), error = %err, "Search failed."),
		_ => tracing::info!(stage = stage.as_str(), error = %err, "Search rejected."),
	}

	err
}
