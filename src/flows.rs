//! Credential flows powered by a single broker state object.

pub mod common;

mod access_token;
mod jsapi_config;
mod jsapi_ticket;

pub use common::MAX_ATTEMPTS;
pub use jsapi_config::*;

// self
use crate::{
	_prelude::*,
	app::{AppRegistration, AppRegistry},
	config::BrokerConfig,
	error::ConfigError,
	http::IssuerHttpClient,
	issuer::IssuerEndpoints,
	obs::{DiagnosticSink, TracingSink},
	store::{CredentialStore, MemoryStore},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Broker specialized for the crate's default reqwest transport.
pub type ReqwestBroker = Broker<ReqwestHttpClient>;

/// Resolves access tokens and JS API tickets for the registered applications.
///
/// The broker owns the HTTP client, the credential store selected at construction, the app
/// registry, and the diagnostic sink. Clones share all of them, so one broker can be handed to
/// every request handler. Misses are single-flight per cache key: concurrent callers wait for the
/// in-flight fetch and then read its result from the store.
#[derive(Clone)]
pub struct Broker<C>
where
	C: ?Sized + IssuerHttpClient,
{
	/// HTTP client used for every issuer request.
	pub http_client: Arc<C>,
	/// Credential cache; fixed for the broker's lifetime.
	pub store: Arc<dyn CredentialStore>,
	/// Registered applications.
	pub registry: Arc<AppRegistry>,
	/// Issuer URLs.
	pub endpoints: IssuerEndpoints,
	/// Receiver of rejection, retry, and exhaustion events.
	pub diagnostics: Arc<dyn DiagnosticSink>,
	flow_guards: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}
impl<C> Broker<C>
where
	C: ?Sized + IssuerHttpClient,
{
	/// Creates a broker around a caller-provided transport.
	pub fn with_http_client(
		store: Arc<dyn CredentialStore>,
		registry: AppRegistry,
		endpoints: IssuerEndpoints,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			store,
			registry: Arc::new(registry),
			endpoints,
			diagnostics: Arc::new(TracingSink),
			flow_guards: Default::default(),
		}
	}

	/// Replaces the diagnostic sink (defaults to [`TracingSink`]).
	pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
		self.diagnostics = sink;

		self
	}

	/// Builds a broker from configuration and a caller-provided transport.
	///
	/// `externalStore` selects [`RedisStore`](crate::store::RedisStore) and connects to it;
	/// otherwise a fresh [`MemoryStore`] is used.
	pub async fn configure_with_http_client(
		config: &BrokerConfig,
		http_client: impl Into<Arc<C>>,
	) -> Result<Self> {
		let registry = config.registry()?;
		let endpoints = config.issuer_endpoints()?;
		let store = connect_store(config.external_store.as_deref()).await?;

		Ok(Self::with_http_client(store, registry, endpoints, http_client))
	}

	fn registration(&self, app_key: &str) -> Result<Arc<AppRegistration>> {
		self.registry
			.get(app_key)
			.ok_or_else(|| Error::UnknownApplication { app_key: app_key.to_owned() })
	}
}
#[cfg(feature = "reqwest")]
impl Broker<ReqwestHttpClient> {
	/// Creates a broker that provisions its own reqwest transport.
	pub fn new(
		store: Arc<dyn CredentialStore>,
		registry: AppRegistry,
		endpoints: IssuerEndpoints,
	) -> Self {
		Self::with_http_client(store, registry, endpoints, ReqwestHttpClient::default())
	}

	/// Builds a reqwest-backed broker from configuration.
	pub async fn configure(config: &BrokerConfig) -> Result<Self> {
		Self::configure_with_http_client(config, ReqwestHttpClient::default()).await
	}
}
impl<C> Debug for Broker<C>
where
	C: ?Sized + IssuerHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("endpoints", &self.endpoints)
			.field("apps", &self.registry.len())
			.finish()
	}
}

async fn connect_store(
	external_store: Option<&str>,
) -> Result<Arc<dyn CredentialStore>, ConfigError> {
	match external_store {
		None => Ok(Arc::new(MemoryStore::default())),
		#[cfg(feature = "redis")]
		Some(url) => Ok(Arc::new(crate::store::RedisStore::connect(url).await?)),
		#[cfg(not(feature = "redis"))]
		Some(url) => Err(ConfigError::ExternalStoreUnsupported { descriptor: url.to_owned() }),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::*;

	#[tokio::test]
	async fn configure_without_external_store_uses_memory() {
		let config = BrokerConfig::from_value(serde_json::json!({
			"apps": { "myApp": { "appid": "wx1", "secret": "s" } }
		}))
		.expect("Configuration should decode.");
		let client = ScriptedHttpClient::default();
		let broker = Broker::<ScriptedHttpClient>::configure_with_http_client(&config, client)
			.await
			.expect("Broker should build without an external store.");

		broker.store.set("probe", "v", 60).await.expect("Memory store writes should succeed.");

		assert_eq!(
			broker.store.get("probe").await.expect("Memory store reads should succeed."),
			Some("v".into())
		);
		assert!(format!("{broker:?}").contains("apps: 1"));
	}

	#[tokio::test]
	async fn configure_rejects_invalid_endpoints() {
		let config = BrokerConfig::from_value(serde_json::json!({
			"endpoints": { "token": "::not-a-url" }
		}))
		.expect("Configuration should decode.");
		let client = ScriptedHttpClient::default();
		let err = Broker::<ScriptedHttpClient>::configure_with_http_client(&config, client)
			.await
			.expect_err("Invalid endpoints should fail configuration.");

		assert!(matches!(
			err,
			Error::Config(ConfigError::InvalidEndpoint { endpoint: "token", .. })
		));
	}
}
