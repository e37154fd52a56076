use std::{
	collections::HashMap,
	sync::Mutex,
	time::{Duration, Instant},
};

use tasklens_domain::ModelVersion;

const CACHE_SCHEMA_VERSION: u32 = 1;

struct CacheEntry {
	vector: Vec<f32>,
	inserted_at: Instant,
}

/// In-process TTL cache for successful embeddings, bounded by entry count.
pub(crate) struct EmbeddingCache {
	ttl: Duration,
	max_entries: usize,
	entries: Mutex<HashMap<blake3::Hash, CacheEntry>>,
}
impl EmbeddingCache {
	pub(crate) fn new(ttl: Duration, max_entries: usize) -> Self {
		Self { ttl, max_entries, entries: Mutex::new(HashMap::new()) }
	}

	pub(crate) fn get(&self, key: &blake3::Hash) -> Option<Vec<f32>> {
		let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());
		let entry = entries.get(key)?;

		if entry.inserted_at.elapsed() >= self.ttl {
			entries.remove(key);

			return None;
		}

		Some(entry.vector.clone())
	}

	pub(crate) fn insert(&self, key: blake3::Hash, vector: Vec<f32>) {
		let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());
		let ttl = self.ttl;

		entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);

		if entries.len() >= self.max_entries
			&& !entries.contains_key(&key)
			&& let Some(oldest) =
				entries.iter().min_by_key(|(_, entry)| entry.inserted_at).map(|(key, _)| *key)
		{
			entries.remove(&oldest);
		}

		entries.insert(key, CacheEntry { vector, inserted_at: Instant::now() });
	}

	#[cfg(test)]
	fn len(&self) -> usize {
		self.entries.lock().unwrap_or_else(|err| err.into_inner()).len()
	}
}

pub(crate) fn cache_key(model_version: &ModelVersion, text: &str) -> blake3::Hash {
	let mut hasher = blake3::Hasher::new();
	let version = model_version.as_str();

	hasher.update(&CACHE_SCHEMA_VERSION.to_le_bytes());
	hasher.update(&(version.len() as u64).to_le_bytes());
	hasher.update(version.as_bytes());
	hasher.update(text.as_bytes());

	hasher.finalize()
}
