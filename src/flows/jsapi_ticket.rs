//! JS API ticket resolution.
//!
//! A ticket miss first resolves the application's access token (from cache or issuer) and then
//! calls the ticket endpoint with `type=jsapi`. Without a token the ticket endpoint is never
//! called.

// self
use crate::{
	_prelude::*,
	flows::{Broker, common},
	http::IssuerHttpClient,
	issuer::{self, Credential},
	obs::{self, Diagnostic, FlowKind, FlowOutcome, FlowSpan},
};

impl<C> Broker<C>
where
	C: ?Sized + IssuerHttpClient,
{
	/// Resolves the JS API ticket for `app_key`, or `None` when it cannot be obtained.
	pub async fn jsapi_ticket(&self, app_key: &str) -> Option<String> {
		self.try_jsapi_ticket(app_key).await.ok()
	}

	/// [`Broker::jsapi_ticket`] with the failure reason.
	pub async fn try_jsapi_ticket(&self, app_key: &str) -> Result<String> {
		const KIND: FlowKind = FlowKind::JsApiTicket;

		let span = FlowSpan::new(KIND, "jsapi_ticket", app_key);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let registration = self.registration(app_key)?;
				let cache_key = registration.ticket_cache_key.as_str();

				if let Some(ticket) = self.cached(KIND, cache_key).await {
					return Ok(ticket);
				}

				let guard = common::flow_guard(self, KIND, cache_key);
				let _singleflight = guard.lock().await;

				if let Some(ticket) = self.cached(KIND, cache_key).await {
					return Ok(ticket);
				}

				let Ok(access_token) = self.try_access_token(app_key).await else {
					self.diagnostics
						.emit(&Diagnostic::MissingAccessToken { app_key: app_key.to_owned() });

					return Err(Error::MissingAccessToken { app_key: app_key.to_owned() });
				};
				let query = issuer::ticket_query(&access_token);

				self.fetch_with_retry(Credential::JsApiTicket, &registration, &query).await
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}
