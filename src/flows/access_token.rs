//! Access-token resolution.
//!
//! [`Broker::access_token`] serves the cached token when one is live and otherwise calls the
//! issuer with `grant_type=client_credential`. Misses are single-flight per cache key, so a burst
//! of callers for the same application costs one issuer round trip.

// self
use crate::{
	_prelude::*,
	flows::{Broker, common},
	http::IssuerHttpClient,
	issuer::{self, Credential},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

impl<C> Broker<C>
where
	C: ?Sized + IssuerHttpClient,
{
	/// Resolves the access token for `app_key`, or `None` when it cannot be obtained.
	///
	/// Empty and unregistered keys return `None` without touching the network. Every other failure
	/// is reported through the broker's diagnostic sink.
	pub async fn access_token(&self, app_key: &str) -> Option<String> {
		self.try_access_token(app_key).await.ok()
	}

	/// [`Broker::access_token`] with the failure reason.
	pub async fn try_access_token(&self, app_key: &str) -> Result<String> {
		const KIND: FlowKind = FlowKind::AccessToken;

		let span = FlowSpan::new(KIND, "access_token", app_key);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let registration = self.registration(app_key)?;
				let cache_key = registration.token_cache_key.as_str();

				if let Some(token) = self.cached(KIND, cache_key).await {
					return Ok(token);
				}

				let guard = common::flow_guard(self, KIND, cache_key);
				let _singleflight = guard.lock().await;

				// Another caller may have filled the cache while this one waited.
				if let Some(token) = self.cached(KIND, cache_key).await {
					return Ok(token);
				}

				let query = issuer::token_query(&registration.app_id, registration.secret.expose());

				self.fetch_with_retry(Credential::AccessToken, &registration, &query).await
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}

#[cfg(test)]
mod tests {
	// self
	use crate::{_preludet::*, obs::Diagnostic};

	const TOKEN_OK: &str = "{\"access_token\":\"fresh-token\",\"expires_in\":7200}";
	const TOKEN_IP_DENIED: &str = "{\"errcode\":40164,\"errmsg\":\"invalid ip 1.2.3.4\"}";

	#[tokio::test]
	async fn unknown_or_empty_key_makes_no_calls() {
		let (broker, client, _, sink) = scripted_broker([]);

		assert_eq!(broker.access_token("").await, None);
		assert_eq!(broker.access_token("nobody").await, None);
		assert!(matches!(
			broker.try_access_token("nobody").await,
			Err(Error::UnknownApplication { .. })
		));
		assert_eq!(client.calls(), 0);
		assert!(sink.events().is_empty(), "Unknown applications are silent.");
	}

	#[tokio::test]
	async fn cached_token_skips_issuer() {
		let (broker, client, store, _) = scripted_broker([]);

		store.set(TOKEN_CACHE_KEY, "cached-token", 60).await.expect("Seeding should succeed.");

		assert_eq!(broker.access_token(APP_KEY).await.as_deref(), Some("cached-token"));
		assert_eq!(client.calls(), 0);
	}

	#[tokio::test]
	async fn miss_fetches_and_caches_with_issuer_ttl() {
		let (broker, client, store, _) = scripted_broker([ok(TOKEN_OK)]);

		assert_eq!(broker.access_token(APP_KEY).await.as_deref(), Some("fresh-token"));
		assert_eq!(broker.access_token(APP_KEY).await.as_deref(), Some("fresh-token"));
		assert_eq!(client.calls(), 1);
		assert_eq!(
			store.get(TOKEN_CACHE_KEY).await.expect("Store reads should succeed."),
			Some("fresh-token".into())
		);

		let request = &client.requests()[0];

		assert_eq!(request.url, TOKEN_URL);
		assert_eq!(
			request.query,
			vec![
				("grant_type".to_owned(), "client_credential".to_owned()),
				("appid".to_owned(), APP_ID.to_owned()),
				("secret".to_owned(), APP_SECRET.to_owned()),
			]
		);
	}

	#[tokio::test]
	async fn retries_until_the_issuer_succeeds() {
		for failures in 1..MAX_ATTEMPTS {
			let mut script = vec![ok(TOKEN_IP_DENIED); failures as usize];

			script.push(ok(TOKEN_OK));

			let (broker, client, _, sink) = scripted_broker(script);

			assert_eq!(broker.access_token(APP_KEY).await.as_deref(), Some("fresh-token"));
			assert_eq!(client.calls(), failures as usize + 1);

			let rejections = sink.events();

			assert_eq!(rejections.len(), failures as usize);
			assert!(rejections.iter().all(|event| matches!(
				event,
				Diagnostic::IssuerRejected { errcode: 40164, hint: Some(_), .. }
			)));
		}
	}

	#[tokio::test]
	async fn gives_up_after_max_attempts() {
		let (broker, client, _, sink) = scripted_broker(vec![ok(TOKEN_IP_DENIED); 20]);
		let err = broker
			.try_access_token(APP_KEY)
			.await
			.expect_err("A permanently rejecting issuer should exhaust the retries.");

		assert!(matches!(
			&err,
			Error::RetriesExhausted { attempts: MAX_ATTEMPTS, last_response: Some(body), .. }
				if body == TOKEN_IP_DENIED
		));
		assert_eq!(client.calls(), MAX_ATTEMPTS as usize);

		let exhausted = sink
			.events()
			.into_iter()
			.filter(|event| matches!(event, Diagnostic::RetriesExhausted { .. }))
			.count();

		assert_eq!(exhausted, 1);
	}

	#[tokio::test]
	async fn transport_failures_are_warnings_and_retried() {
		let (broker, client, _, sink) =
			scripted_broker([network_error(), status(502), ok("<html>"), ok(TOKEN_OK)]);

		assert_eq!(broker.access_token(APP_KEY).await.as_deref(), Some("fresh-token"));
		assert_eq!(client.calls(), 4);

		let events = sink.events();

		assert_eq!(events.len(), 3);
		assert!(events.iter().all(|event| matches!(event, Diagnostic::AttemptFailed { .. })));
	}

	#[tokio::test]
	async fn concurrent_misses_share_one_fetch() {
		let (broker, client, _, _) = scripted_broker([ok(TOKEN_OK)]);
		let (first, second) =
			tokio::join!(broker.access_token(APP_KEY), broker.access_token(APP_KEY));

		assert_eq!(first.as_deref(), Some("fresh-token"));
		assert_eq!(second.as_deref(), Some("fresh-token"));
		assert_eq!(client.calls(), 1);
	}
}
