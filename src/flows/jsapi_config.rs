//! Signed JS-SDK configuration (`wx.config`) built on top of the ticket flow.

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	flows::Broker,
	http::IssuerHttpClient,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	signature,
};

const NONCE_LEN: usize = 16;

/// Parameters a web page passes to `wx.config`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsApiConfig {
	/// Issuer application identifier.
	pub app_id: String,
	/// Unix timestamp (seconds) the signature was computed at.
	pub timestamp: i64,
	/// Random nonce included in the signature.
	pub nonce_str: String,
	/// Lowercase hex SHA-1 signature.
	pub signature: String,
}

impl<C> Broker<C>
where
	C: ?Sized + IssuerHttpClient,
{
	/// Signs a JS-SDK configuration for the page at `url`, or `None` when no ticket is available.
	pub async fn jsapi_config(&self, app_key: &str, url: &str) -> Option<JsApiConfig> {
		self.try_jsapi_config(app_key, url).await.ok()
	}

	/// [`Broker::jsapi_config`] with the failure reason.
	pub async fn try_jsapi_config(&self, app_key: &str, url: &str) -> Result<JsApiConfig> {
		const KIND: FlowKind = FlowKind::JsApiConfig;

		let span = FlowSpan::new(KIND, "jsapi_config", app_key);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let registration = self.registration(app_key)?;
				let ticket = self.try_jsapi_ticket(app_key).await?;
				let nonce_str = nonce(NONCE_LEN);
				let timestamp = OffsetDateTime::now_utc().unix_timestamp();
				let signature = sign_jsapi_config(&ticket, &nonce_str, timestamp, url)?;

				Ok(JsApiConfig {
					app_id: registration.app_id.to_string(),
					timestamp,
					nonce_str,
					signature,
				})
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}

/// Signs `jsapi_ticket`, `noncestr`, `timestamp`, and `url` (without its fragment).
pub fn sign_jsapi_config(
	ticket: &str,
	nonce_str: &str,
	timestamp: i64,
	url: &str,
) -> Result<String> {
	let page = url.split_once('#').map_or(url, |(page, _)| page);
	let fields = signature::signature_fields([
		("jsapi_ticket", Value::from(ticket)),
		("noncestr", Value::from(nonce_str)),
		("timestamp", Value::from(timestamp)),
		("url", Value::from(page)),
	]);

	signature::try_compute_signature(&fields)
}

fn nonce(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}
