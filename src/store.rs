//! Credential cache contract and the built-in local and shared backends.

pub mod memory;
#[cfg(feature = "redis")] pub mod redis;

pub use memory::MemoryStore;
#[cfg(feature = "redis")] pub use redis::RedisStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Key/value cache with per-entry TTL used for access tokens and tickets.
///
/// A broker holds exactly one store for its whole lifetime; the local and the shared backend are
/// interchangeable behind this trait.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Reads the value cached under `key`, if it has not expired.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Caches `value` under `key` for `ttl_secs` seconds, replacing any earlier value.
	fn set<'a>(&'a self, key: &'a str, value: &'a str, ttl_secs: u64) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
