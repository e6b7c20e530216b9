//! Shared [`CredentialStore`] backed by Redis, which enforces TTLs natively via `SET .. EX`.

// crates.io
use redis::{AsyncCommands, Client, RedisError, aio::ConnectionManager};
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	store::{CredentialStore, StoreError, StoreFuture},
};

/// Redis-backed store shared by every process pointing at the same server.
///
/// The connection manager reconnects on its own; the store adds no locking of its own.
#[derive(Clone)]
pub struct RedisStore {
	manager: ConnectionManager,
}
impl RedisStore {
	/// Opens a client for `url` (`redis://host:port/db`) and establishes a managed connection.
	pub async fn connect(url: &str) -> Result<Self, ConfigError> {
		let client = Client::open(url).map_err(ConfigError::external_store_connect)?;
		let manager =
			ConnectionManager::new(client).await.map_err(ConfigError::external_store_connect)?;

		Ok(Self { manager })
	}

	/// Wraps an existing connection manager.
	pub fn with_manager(manager: ConnectionManager) -> Self {
		Self { manager }
	}

	fn backend_error(op: &str, key: &str, e: RedisError) -> StoreError {
		StoreError::Backend { message: format!("Redis {op} for `{key}` failed: {e}") }
	}
}
impl CredentialStore for RedisStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		let mut conn = self.manager.clone();

		Box::pin(async move {
			conn.get::<_, Option<String>>(key).await.map_err(|e| Self::backend_error("GET", key, e))
		})
	}

	fn set<'a>(&'a self, key: &'a str, value: &'a str, ttl_secs: u64) -> StoreFuture<'a, ()> {
		let mut conn = self.manager.clone();

		Box::pin(async move {
			conn.set_ex::<_, _, ()>(key, value, ttl_secs)
				.await
				.map_err(|e| Self::backend_error("SET", key, e))
		})
	}
}
impl Debug for RedisStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("RedisStore(..)")
	}
}
