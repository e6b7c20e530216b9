//! Runs against a live server: `JSAPI_BROKER_REDIS_URL=redis://127.0.0.1/ cargo test -- --ignored`.
#![cfg(feature = "redis")]

// std
use std::{env, time::Duration};
// self
use jsapi_broker::store::{CredentialStore, RedisStore};

async fn connect() -> RedisStore {
	let url = env::var("JSAPI_BROKER_REDIS_URL").expect("JSAPI_BROKER_REDIS_URL must be set.");

	RedisStore::connect(&url).await.expect("Redis should be reachable.")
}

#[tokio::test]
#[ignore = "requires a Redis server"]
async fn redis_round_trip_and_native_expiry() {
	let store = connect().await;
	let key = format!("jsapi-broker-it:{}", std::process::id());

	store.set(&key, "v", 1).await.expect("Redis SET EX should succeed.");

	assert_eq!(
		store.get(&key).await.expect("Redis GET should succeed.").as_deref(),
		Some("v")
	);

	tokio::time::sleep(Duration::from_millis(1_500)).await;

	assert_eq!(store.get(&key).await.expect("Redis GET should succeed."), None);
}
