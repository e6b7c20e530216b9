//! Broker configuration intake.
//!
//! The document is plain JSON so it can come from any loader:
//!
//! ```json
//! {
//!   "externalStore": "redis://localhost:6379",
//!   "apps": {
//!     "myApp": {
//!       "appid": "wx123",
//!       "secret": "…",
//!       "tokenKey": "access_token",
//!       "ticketKey": "tools_ticket"
//!     }
//!   }
//! }
//! ```
//!
//! Unknown fields are ignored, and anything that is not a non-empty object yields the empty
//! default.

// self
use crate::{
	_prelude::*,
	app::{AppId, AppKey, AppRegistration, AppRegistry, AppSecret},
	error::ConfigError,
	issuer::{DEFAULT_TICKET_ENDPOINT, DEFAULT_TOKEN_ENDPOINT, IssuerEndpoints},
};

/// Top-level broker configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerConfig {
	/// Redis connection URL; selects the shared store when present.
	#[serde(default, alias = "redis")]
	pub external_store: Option<String>,
	/// Registered applications keyed by application key.
	#[serde(default)]
	pub apps: BTreeMap<String, AppConfig>,
	/// Issuer endpoint overrides.
	#[serde(default)]
	pub endpoints: EndpointsConfig,
}
impl BrokerConfig {
	/// Decodes a JSON document.
	pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(document);
		let value: Value = serde_path_to_error::deserialize(&mut de)?;

		Self::from_value(value)
	}

	/// Decodes an already-parsed JSON value.
	pub fn from_value(value: Value) -> Result<Self, ConfigError> {
		if value.as_object().is_none_or(|map| map.is_empty()) {
			return Ok(Self::default());
		}

		Ok(serde_path_to_error::deserialize(value)?)
	}

	/// Applies `other` on top of `self`; fields present in `other` win.
	pub fn merge(mut self, other: Self) -> Self {
		if other.external_store.is_some() {
			self.external_store = other.external_store;
		}
		if !other.apps.is_empty() {
			self.apps = other.apps;
		}
		if other.endpoints.token.is_some() {
			self.endpoints.token = other.endpoints.token;
		}
		if other.endpoints.ticket.is_some() {
			self.endpoints.ticket = other.endpoints.ticket;
		}

		self
	}

	/// Validates every app entry and builds the registry.
	pub fn registry(&self) -> Result<AppRegistry, ConfigError> {
		self.apps
			.iter()
			.map(|(key, app)| app.registration(key))
			.collect::<Result<Vec<_>, _>>()
			.map(|registrations| registrations.into_iter().collect())
	}

	/// Resolves the issuer endpoints, falling back to the WeChat defaults.
	pub fn issuer_endpoints(&self) -> Result<IssuerEndpoints, ConfigError> {
		IssuerEndpoints::parse(
			self.endpoints.token.as_deref().unwrap_or(DEFAULT_TOKEN_ENDPOINT),
			self.endpoints.ticket.as_deref().unwrap_or(DEFAULT_TICKET_ENDPOINT),
		)
	}
}

/// One application entry.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
	/// Issuer application identifier.
	#[serde(rename = "appid", alias = "appId")]
	pub app_id: String,
	/// Issuer application secret.
	pub secret: AppSecret,
	/// Access-token cache key; defaults to `<app_key>:access_token`.
	#[serde(default, rename = "tokenKey", alias = "tokenCacheKey")]
	pub token_key: Option<String>,
	/// Ticket cache key; defaults to `<app_key>:jsapi_ticket`.
	#[serde(default, rename = "ticketKey", alias = "ticketCacheKey")]
	pub ticket_key: Option<String>,
}
impl AppConfig {
	fn registration(&self, app_key: &str) -> Result<AppRegistration, ConfigError> {
		let mut registration = AppRegistration::new(
			AppKey::new(app_key)?,
			AppId::new(&self.app_id)?,
			self.secret.clone(),
		);

		if let Some(key) = &self.token_key {
			registration = registration.with_token_cache_key(key);
		}
		if let Some(key) = &self.ticket_key {
			registration = registration.with_ticket_cache_key(key);
		}

		Ok(registration)
	}
}

/// Optional issuer URL overrides.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct EndpointsConfig {
	/// Access-token endpoint.
	#[serde(default)]
	pub token: Option<String>,
	/// JS API ticket endpoint.
	#[serde(default)]
	pub ticket: Option<String>,
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn decodes_documented_shape() {
		let config = BrokerConfig::from_json_str(
			r#"{
				"redis": "redis://localhost:6379",
				"apps": {
					"myApp": {
						"appid": "wx1",
						"secret": "s1",
						"tokenKey": "access_token",
						"ticketKey": "tools_ticket"
					},
					"blog": { "appId": "wx2", "secret": "s2" }
				},
				"unknown": true
			}"#,
		)
		.expect("Documented configuration should decode.");

		assert_eq!(config.external_store.as_deref(), Some("redis://localhost:6379"));

		let registry = config.registry().expect("Registry should build.");
		let my_app = registry.get("myApp").expect("myApp should be registered.");
		let blog = registry.get("blog").expect("blog should be registered.");

		assert_eq!(my_app.token_cache_key, "access_token");
		assert_eq!(my_app.ticket_cache_key, "tools_ticket");
		assert_eq!(my_app.secret.expose(), "s1");
		assert_eq!(blog.token_cache_key, "blog:access_token");
	}

	#[test]
	fn empty_or_non_object_input_is_default() {
		for value in [json!({}), json!([]), json!(null), json!("redis://x")] {
			let config = BrokerConfig::from_value(value).expect("Non-object input is a no-op.");

			assert!(config.external_store.is_none());
			assert!(config.apps.is_empty());
		}
	}

	#[test]
	fn decode_errors_report_the_field_path() {
		let err = BrokerConfig::from_value(json!({ "apps": { "myApp": { "secret": "s" } } }))
			.expect_err("Missing appid should be rejected.");

		assert!(
			matches!(
				&err,
				ConfigError::InvalidDocument { path, .. } if path.starts_with("apps.myApp")
			),
			"Unexpected error: {err:?}"
		);
	}

	#[test]
	fn app_keys_are_opaque_but_app_ids_are_checked() {
		let config = BrokerConfig::from_value(json!({
			"apps": { "my app": { "appid": "wx1", "secret": "s" } }
		}))
		.expect("Document should decode.");
		let registry = config.registry().expect("Keys with spaces should register.");

		assert_eq!(
			registry.get("my app").map(|app| app.token_cache_key.clone()).as_deref(),
			Some("my app:access_token")
		);

		let config = BrokerConfig::from_value(json!({
			"apps": { "shop": { "appid": "wx 1", "secret": "s" } }
		}))
		.expect("Document should decode.");

		assert!(matches!(config.registry(), Err(ConfigError::InvalidIdentifier(_))));
	}

	#[test]
	fn merge_prefers_later_fields() {
		let base = BrokerConfig::from_value(json!({
			"apps": { "a": { "appid": "wx1", "secret": "s" } },
			"endpoints": { "token": "http://127.0.0.1/token" }
		}))
		.expect("Base document should decode.");
		let overlay = BrokerConfig::from_value(json!({ "externalStore": "redis://cache" }))
			.expect("Overlay document should decode.");
		let merged = base.merge(overlay);

		assert_eq!(merged.external_store.as_deref(), Some("redis://cache"));
		assert!(merged.apps.contains_key("a"));

		let endpoints = merged.issuer_endpoints().expect("Endpoints should parse.");

		assert_eq!(endpoints.token.as_str(), "http://127.0.0.1/token");
		assert_eq!(endpoints.ticket.as_str(), DEFAULT_TICKET_ENDPOINT);
	}
}
