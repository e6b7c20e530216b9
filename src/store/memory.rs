//! Process-local [`CredentialStore`] with timer-driven expiry.
//!
//! Every write is stamped with a monotonically increasing generation and schedules a one-shot
//! deletion task on the current tokio runtime. The task only removes the entry when the generation
//! still matches, so an overwrite is never evicted by the timer of the value it replaced.
//!
//! Outside a tokio runtime no timer is spawned: reads still honor the deadline, and expired
//! entries are swept on the next write.

// std
use std::sync::{
	Weak,
	atomic::{AtomicU64, Ordering},
};
// crates.io
use tokio::{
	runtime::Handle,
	time::{self, Instant},
};
// self
use crate::{
	_prelude::*,
	store::{CredentialStore, StoreFuture},
};

type StoreMap = Arc<RwLock<HashMap<String, Entry>>>;

// Issuer TTLs are hours at most; the cap keeps deadline arithmetic far from overflow.
const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Clone, Debug)]
struct Entry {
	value: String,
	generation: u64,
	expires_at: Instant,
}

/// Thread-safe storage backend that keeps credentials in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
	entries: StoreMap,
	generation: Arc<AtomicU64>,
}
impl MemoryStore {
	/// Number of live entries, including ones whose deletion timer has not fired yet.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns `true` when the store holds no entries.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	fn get_now(map: &StoreMap, key: &str) -> Option<String> {
		let now = Instant::now();

		map.read().get(key).filter(|entry| entry.expires_at > now).map(|entry| entry.value.clone())
	}

	fn set_now(&self, key: &str, value: &str, ttl: StdDuration) -> u64 {
		let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
		let entry = Entry { value: value.to_owned(), generation, expires_at: Instant::now() + ttl };

		self.entries.write().insert(key.to_owned(), entry);

		generation
	}

	fn evict_now(map: &RwLock<HashMap<String, Entry>>, key: &str, generation: u64) {
		let mut guard = map.write();

		if guard.get(key).is_some_and(|entry| entry.generation == generation) {
			guard.remove(key);
		}
	}

	fn insert(&self, key: &str, value: &str, ttl_secs: u64) {
		let ttl = StdDuration::from_secs(ttl_secs.min(MAX_TTL_SECS));

		match Handle::try_current() {
			Ok(handle) => {
				let generation = self.set_now(key, value, ttl);

				self.schedule_eviction(&handle, key.to_owned(), generation, ttl);
			},
			Err(_) => {
				let now = Instant::now();

				self.entries.write().retain(|_, entry| entry.expires_at > now);
				self.set_now(key, value, ttl);
			},
		}
	}

	fn schedule_eviction(&self, handle: &Handle, key: String, generation: u64, ttl: StdDuration) {
		let map: Weak<RwLock<HashMap<String, Entry>>> = Arc::downgrade(&self.entries);

		handle.spawn(async move {
			time::sleep(ttl).await;

			if let Some(map) = map.upgrade() {
				Self::evict_now(&map, &key, generation);
			}
		});
	}
}
impl CredentialStore for MemoryStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move { Ok(Self::get_now(&self.entries, key)) })
	}

	fn set<'a>(&'a self, key: &'a str, value: &'a str, ttl_secs: u64) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.insert(key, value, ttl_secs);

			Ok(())
		})
	}
}
