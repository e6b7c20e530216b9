//! Broker-level error types shared across flows, issuers, and configuration.

// self
use crate::{_prelude::*, obs::FlowKind};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by the `try_*` APIs.
///
/// The `Option`-returning APIs collapse every variant into `None` after emitting a diagnostic.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS, HTTP status).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The application key is empty or not registered.
	#[error("Application `{app_key}` is not registered.")]
	UnknownApplication {
		/// Key supplied by the caller.
		app_key: String,
	},
	/// Every bounded attempt failed.
	#[error("Gave up resolving the {kind} after {attempts} attempts.")]
	RetriesExhausted {
		/// Credential being requested.
		kind: FlowKind,
		/// Number of attempts performed.
		attempts: u32,
		/// Raw body of the last issuer response, if any arrived.
		last_response: Option<String>,
	},
	/// The ticket flow could not obtain an access token.
	#[error("Access token is missing for application `{app_key}`.")]
	MissingAccessToken {
		/// Application the ticket was requested for.
		app_key: String,
	},
	/// A signature field has an empty key or a falsy value.
	#[error("Signature input contains an empty key or value.")]
	InvalidSignatureInput,
}

/// Configuration and validation failures raised while building a broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Configuration document does not match the expected shape.
	#[error("Configuration is invalid at `{path}`.")]
	InvalidDocument {
		/// Path of the offending field.
		path: String,
		/// Underlying decoding failure.
		#[source]
		source: serde_json::Error,
	},
	/// Issuer endpoint override is not a valid URL.
	#[error("The {endpoint} endpoint is not a valid URL.")]
	InvalidEndpoint {
		/// Endpoint label (`token` or `ticket`).
		endpoint: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Application key or app id failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::app::IdentifierError),
	/// An external store was configured but the crate was built without the `redis` feature.
	#[error("External store `{descriptor}` requires the `redis` feature.")]
	ExternalStoreUnsupported {
		/// Connection descriptor from the configuration.
		descriptor: String,
	},
	/// The external store client could not be created or connected.
	#[error("External store could not be connected.")]
	ExternalStoreConnect {
		/// Underlying client failure.
		#[source]
		source: BoxError,
	},
}
impl ConfigError {
	/// Wraps an external store client failure inside [`ConfigError`].
	pub fn external_store_connect(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::ExternalStoreConnect { source: Box::new(src) }
	}
}
impl From<serde_path_to_error::Error<serde_json::Error>> for ConfigError {
	fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
		let path = e.path().to_string();

		Self::InvalidDocument { path, source: e.into_inner() }
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Issuer responded with a body that could not be decoded.
	#[error("Issuer returned malformed JSON for the {kind} request.")]
	ResponseParse {
		/// Credential being requested.
		kind: FlowKind,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// Raw body, for diagnostics.
		body: String,
	},
	/// Issuer responded with JSON that carries neither a credential nor an `errcode`.
	#[error("Issuer returned an unrecognized {kind} response.")]
	UnrecognizedResponse {
		/// Credential being requested.
		kind: FlowKind,
		/// Raw body, for diagnostics.
		body: String,
	},
}
/// Transport-level failures (network, HTTP status).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the issuer.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Issuer answered with a non-success HTTP status.
	#[error("Issuer answered with HTTP status {status}.")]
	Status {
		/// HTTP status code.
		status: u16,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	// The request URL carries `secret` or `access_token` in its query.
	fn from(e: ReqwestError) -> Self {
		Self::network(e.without_url())
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;

	#[test]
	fn transport_error_converts_into_broker_error_with_source() {
		let broker_error: Error =
			TransportError::network(std::io::Error::other("connection reset")).into();

		assert!(matches!(broker_error, Error::Transport(TransportError::Network { .. })));

		// `transparent` forwards straight to the transport error's own source.
		let source = StdError::source(&broker_error)
			.expect("Broker error should expose the original network error.");

		assert_eq!(source.to_string(), "connection reset");
	}

	#[test]
	fn config_error_keeps_document_path() {
		type Nested = HashMap<String, HashMap<String, HashMap<String, String>>>;

		let mut de = serde_json::Deserializer::from_str("{\"apps\":{\"x\":{\"appid\":7}}}");
		let err = serde_path_to_error::deserialize::<_, Nested>(&mut de)
			.expect_err("Numeric appid should fail to decode as a string.");
		let config_error = ConfigError::from(err);

		assert!(matches!(
			&config_error,
			ConfigError::InvalidDocument { path, .. } if path == "apps.x.appid"
		));
	}

	#[test]
	fn exhaustion_message_names_the_flow() {
		let err = Error::RetriesExhausted {
			kind: FlowKind::JsApiTicket,
			attempts: 10,
			last_response: None,
		};

		assert_eq!(err.to_string(), "Gave up resolving the jsapi_ticket after 10 attempts.");
	}
}
