use std::cmp::Ordering;

use time::OffsetDateTime;
use uuid::Uuid;

use tasklens_domain::ModelVersion;

/// Squared norms at or below this are treated as zero vectors. Provider embeddings are unit or
/// near-unit length, so anything this small is a degenerate reply.
const MIN_SQUARED_NORM: f32 = 1e-12;

#[derive(Clone, Debug)]
pub struct RankCandidate {
	pub task_id: Uuid,
	pub vector: Vec<f32>,
	pub model_version: ModelVersion,
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ranked {
	pub task_id: Uuid,
	/// Raw cosine in [-1, 1]; ordering uses this value.
	pub similarity: f32,
	pub updated_at: OffsetDateTime,
}
impl Ranked {
	pub fn display_similarity(&self) -> f32 {
		self.similarity.clamp(0.0, 1.0)
	}
}

/// Scores candidates from `expected` against `query` and keeps the best `top_k`.
pub fn rank(
	query: &[f32],
	candidates: Vec<RankCandidate>,
	expected: &ModelVersion,
	top_k: u32,
) -> Vec<Ranked> {
	let mut ranked: Vec<Ranked> = candidates
		.into_iter()
		.filter(|candidate| &candidate.model_version == expected)
		.filter_map(|candidate| {
			cosine_similarity(query, &candidate.vector).map(|similarity| Ranked {
				task_id: candidate.task_id,
				similarity,
				updated_at: candidate.updated_at,
			})
		})
		.collect();

	ranked.sort_by(|a, b| {
		cmp_f32_desc(a.similarity, b.similarity)
			.then_with(|| b.updated_at.cmp(&a.updated_at))
			.then_with(|| a.task_id.cmp(&b.task_id))
	});
	ranked.truncate(top_k as usize);

	ranked
}

/// `None` when either side has zero magnitude, the lengths differ, or the result is not finite.
pub fn cosine_similarity(lhs: &[f32], rhs: &[f32]) -> Option<f32> {
	if lhs.is_empty() || lhs.len() != rhs.len() {
		return None;
	}

	let mut dot = 0.0_f32;
	let mut lhs_norm = 0.0_f32;
	let mut rhs_norm = 0.0_f32;

	for (l, r) in lhs.iter().zip(rhs.iter()) {
		dot += l * r;
		lhs_norm += l * l;
		rhs_norm += r * r;
	}

	if lhs_norm <= MIN_SQUARED_NORM || rhs_norm <= MIN_SQUARED_NORM {
		return None;
	}

	let similarity = dot / (lhs_norm.sqrt() * rhs_norm.sqrt());

	similarity.is_finite().then(|| similarity.clamp(-1.0, 1.0))
}

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}
