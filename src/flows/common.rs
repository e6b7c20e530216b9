//! Shared helpers for the credential flows (cache access, single-flight guards, bounded retries).

// self
use crate::{
	_prelude::*,
	app::AppRegistration,
	flows::Broker,
	http::IssuerHttpClient,
	issuer::{self, Credential, Issued, IssuerReply},
	obs::{self, Diagnostic, FlowKind, FlowOutcome},
};

/// Upper bound on issuer calls per resolution, counting the first one.
pub const MAX_ATTEMPTS: u32 = 10;

impl<C> Broker<C>
where
	C: ?Sized + IssuerHttpClient,
{
	/// Reads a cached credential; store failures are reported and treated as misses.
	pub(crate) async fn cached(&self, kind: FlowKind, cache_key: &str) -> Option<String> {
		match self.store.get(cache_key).await {
			Ok(Some(value)) => {
				obs::record_flow_outcome(kind, FlowOutcome::CacheHit);

				Some(value)
			},
			Ok(None) => None,
			Err(e) => {
				self.diagnostics.emit(&Diagnostic::StoreFailed {
					kind,
					cache_key: cache_key.to_owned(),
					message: e.to_string(),
				});

				None
			},
		}
	}

	/// Calls the issuer until it hands out `credential`, at most [`MAX_ATTEMPTS`] times.
	///
	/// Every attempt is awaited to completion before its result is inspected. The issued value is
	/// cached under the registration's key for the issuer-reported lifetime.
	pub(crate) async fn fetch_with_retry(
		&self,
		credential: Credential,
		registration: &AppRegistration,
		query: &[(&str, &str)],
	) -> Result<String> {
		let kind = credential.kind();
		let app_key = registration.app_key.as_ref();
		let url = credential.endpoint(&self.endpoints);
		let mut last_response = None;

		for attempt in 1..=MAX_ATTEMPTS {
			let response = match self.http_client.get(url, query).await {
				Ok(response) => response,
				Err(e) => {
					self.attempt_failed(kind, app_key, attempt, &e);

					continue;
				},
			};

			last_response = Some(response.body_text());

			match issuer::decode_reply(credential, &response) {
				Ok(IssuerReply::Issued(issued)) => {
					self.cache(credential, registration, &issued).await;

					return Ok(issued.value);
				},
				Ok(IssuerReply::Rejected { errcode, errmsg }) => {
					let hint = match credential {
						Credential::AccessToken => obs::issuer_hint(errcode),
						Credential::JsApiTicket => None,
					};

					self.diagnostics.emit(&Diagnostic::IssuerRejected {
						kind,
						app_key: app_key.to_owned(),
						attempt,
						errcode,
						errmsg,
						hint,
					});
				},
				Err(e) => self.attempt_failed(kind, app_key, attempt, &e),
			}
		}

		self.diagnostics.emit(&Diagnostic::RetriesExhausted {
			kind,
			app_key: app_key.to_owned(),
			attempts: MAX_ATTEMPTS,
			last_response: last_response.clone(),
		});

		Err(Error::RetriesExhausted { kind, attempts: MAX_ATTEMPTS, last_response })
	}

	async fn cache(&self, credential: Credential, registration: &AppRegistration, issued: &Issued) {
		let cache_key = match credential {
			Credential::AccessToken => &registration.token_cache_key,
			Credential::JsApiTicket => &registration.ticket_cache_key,
		};

		if let Err(e) = self.store.set(cache_key, &issued.value, issued.expires_in).await {
			self.diagnostics.emit(&Diagnostic::StoreFailed {
				kind: credential.kind(),
				cache_key: cache_key.clone(),
				message: e.to_string(),
			});
		}
	}

	fn attempt_failed(&self, kind: FlowKind, app_key: &str, attempt: u32, error: &dyn StdError) {
		self.diagnostics.emit(&Diagnostic::AttemptFailed {
			kind,
			app_key: app_key.to_owned(),
			attempt,
			message: render_error_chain(error),
		});
	}
}

/// Returns (and creates on demand) the single-flight guard for a flow + cache key.
///
/// Guards are namespaced by flow so a ticket miss can take the token guard even when both
/// credentials share a cache key.
pub(crate) fn flow_guard<C>(
	broker: &Broker<C>,
	kind: FlowKind,
	cache_key: &str,
) -> Arc<AsyncMutex<()>>
where
	C: ?Sized + IssuerHttpClient,
{
	let mut guards = broker.flow_guards.lock();

	guards
		.entry(format!("{kind}/{cache_key}"))
		.or_insert_with(|| Arc::new(AsyncMutex::new(())))
		.clone()
}

fn render_error_chain(error: &dyn StdError) -> String {
	let mut rendered = error.to_string();
	let mut source = error.source();

	while let Some(cause) = source {
		rendered.push_str(": ");
		rendered.push_str(&cause.to_string());

		source = cause.source();
	}

	rendered
}
