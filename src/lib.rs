//! Access-token and JS API ticket broker for WeChat-style credential issuers: dual-backend TTL
//! caching, bounded retries, single-flight fetches, and canonical SHA-1 signing.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod app;
pub mod config;
pub mod error;
pub mod flows;
pub mod http;
pub mod issuer;
pub mod obs;
pub mod signature;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test` crate
	//! feature.

	pub use crate::_prelude::*;
	pub use crate::{
		flows::{Broker, MAX_ATTEMPTS},
		store::CredentialStore,
	};

	// std
	use std::collections::VecDeque;
	// self
	use crate::{
		app::{AppId, AppKey, AppRegistration, AppRegistry, AppSecret},
		error::TransportError,
		http::{IssuerFuture, IssuerHttpClient, IssuerResponse},
		issuer::IssuerEndpoints,
		obs::{Diagnostic, DiagnosticSink},
		store::{MemoryStore, StoreError, StoreFuture},
	};

	/// Application key registered by [`scripted_broker`].
	pub const APP_KEY: &str = "myApp";
	/// Issuer app id registered by [`scripted_broker`].
	pub const APP_ID: &str = "wx-test-app";
	/// Issuer secret registered by [`scripted_broker`].
	pub const APP_SECRET: &str = "test-secret";
	/// Access-token cache key of [`APP_KEY`].
	pub const TOKEN_CACHE_KEY: &str = "myApp:access_token";
	/// Ticket cache key of [`APP_KEY`].
	pub const TICKET_CACHE_KEY: &str = "myApp:jsapi_ticket";
	/// Token endpoint used by [`scripted_broker`].
	pub const TOKEN_URL: &str = "https://issuer.test/cgi-bin/token";
	/// Ticket endpoint used by [`scripted_broker`].
	pub const TICKET_URL: &str = "https://issuer.test/cgi-bin/ticket/getticket";

	/// One scripted transport outcome.
	#[derive(Clone, Debug)]
	pub enum Scripted {
		/// Respond with the given status + body.
		Response(IssuerResponse),
		/// Fail at the network level.
		NetworkError,
	}

	/// `200 OK` with `body`.
	pub fn ok(body: &str) -> Scripted {
		Scripted::Response(IssuerResponse::ok(body))
	}

	/// Empty response with `status`.
	pub fn status(status: u16) -> Scripted {
		Scripted::Response(IssuerResponse { status, body: Vec::new() })
	}

	/// Network-level failure.
	pub fn network_error() -> Scripted {
		Scripted::NetworkError
	}

	/// Request observed by [`ScriptedHttpClient`].
	#[derive(Clone, Debug, PartialEq, Eq)]
	pub struct RecordedRequest {
		/// Requested URL without query.
		pub url: String,
		/// Query parameters in request order.
		pub query: Vec<(String, String)>,
	}

	/// Transport that replays a fixed script and records every request.
	///
	/// Once the script runs out every call fails at the network level.
	#[derive(Debug, Default)]
	pub struct ScriptedHttpClient {
		script: Mutex<VecDeque<Scripted>>,
		requests: Mutex<Vec<RecordedRequest>>,
	}
	impl ScriptedHttpClient {
		/// Creates a client replaying `script` in order.
		pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
			Self { script: Mutex::new(script.into_iter().collect()), requests: Default::default() }
		}

		/// Number of requests performed so far.
		pub fn calls(&self) -> usize {
			self.requests.lock().len()
		}

		/// Requests performed so far.
		pub fn requests(&self) -> Vec<RecordedRequest> {
			self.requests.lock().clone()
		}
	}
	impl IssuerHttpClient for ScriptedHttpClient {
		fn get<'a>(&'a self, url: &'a Url, query: &'a [(&'a str, &'a str)]) -> IssuerFuture<'a> {
			Box::pin(async move {
				self.requests.lock().push(RecordedRequest {
					url: url.to_string(),
					query: query.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect(),
				});

				let next = self.script.lock().pop_front();

				match next {
					Some(Scripted::Response(response)) => Ok(response),
					Some(Scripted::NetworkError) | None => Err(TransportError::network(
						std::io::Error::other("scripted network failure"),
					)),
				}
			})
		}
	}

	/// Sink that keeps every diagnostic for later assertions.
	#[derive(Debug, Default)]
	pub struct RecordingSink(Mutex<Vec<Diagnostic>>);
	impl RecordingSink {
		/// Diagnostics emitted so far.
		pub fn events(&self) -> Vec<Diagnostic> {
			self.0.lock().clone()
		}
	}
	impl DiagnosticSink for RecordingSink {
		fn emit(&self, diagnostic: &Diagnostic) {
			self.0.lock().push(diagnostic.clone());
		}
	}

	/// Store whose reads and writes always fail with [`StoreError::Backend`].
	///
	/// Messages start with `GET` or `SET` so tests can tell the two paths apart.
	#[derive(Debug, Default)]
	pub struct FailingStore;
	impl CredentialStore for FailingStore {
		fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
			Box::pin(async move {
				Err(StoreError::Backend { message: format!("GET `{key}` refused") })
			})
		}

		fn set<'a>(&'a self, key: &'a str, _: &'a str, _: u64) -> StoreFuture<'a, ()> {
			Box::pin(async move {
				Err(StoreError::Backend { message: format!("SET `{key}` refused") })
			})
		}
	}

	/// Broker plus handles on its transport, store, and sink.
	pub type ScriptedFixture =
		(Broker<ScriptedHttpClient>, Arc<ScriptedHttpClient>, Arc<MemoryStore>, Arc<RecordingSink>);

	/// Registration for [`APP_KEY`] with the default cache keys.
	pub fn test_registration() -> AppRegistration {
		AppRegistration::new(
			AppKey::new(APP_KEY).expect("Test app key should be valid."),
			AppId::new(APP_ID).expect("Test app id should be valid."),
			AppSecret::new(APP_SECRET),
		)
	}

	/// Broker with [`test_registration`], a memory store, a scripted transport, and a recording
	/// sink.
	pub fn scripted_broker(script: impl IntoIterator<Item = Scripted>) -> ScriptedFixture {
		scripted_broker_with(test_registration(), script)
	}

	/// [`scripted_broker`] backed by a [`FailingStore`].
	pub fn failing_store_broker(
		script: impl IntoIterator<Item = Scripted>,
	) -> (Broker<ScriptedHttpClient>, Arc<ScriptedHttpClient>, Arc<RecordingSink>) {
		let client = Arc::new(ScriptedHttpClient::new(script));
		let sink = Arc::new(RecordingSink::default());
		let endpoints = IssuerEndpoints::parse(TOKEN_URL, TICKET_URL)
			.expect("Test endpoints should parse successfully.");
		let broker = Broker::<ScriptedHttpClient>::with_http_client(
			Arc::new(FailingStore),
			AppRegistry::default().with(test_registration()),
			endpoints,
			client.clone(),
		)
		.with_diagnostics(sink.clone());

		(broker, client, sink)
	}

	/// [`scripted_broker`] with a caller-provided registration.
	pub fn scripted_broker_with(
		registration: AppRegistration,
		script: impl IntoIterator<Item = Scripted>,
	) -> ScriptedFixture {
		let store = Arc::new(MemoryStore::default());
		let client = Arc::new(ScriptedHttpClient::new(script));
		let sink = Arc::new(RecordingSink::default());
		let endpoints = IssuerEndpoints::parse(TOKEN_URL, TICKET_URL)
			.expect("Test endpoints should parse successfully.");
		let broker = Broker::<ScriptedHttpClient>::with_http_client(
			store.clone(),
			AppRegistry::default().with(registration),
			endpoints,
			client.clone(),
		)
		.with_diagnostics(sink.clone());

		(broker, client, store, sink)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "redis")] pub use redis;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
