//! Transport primitives for issuer calls.
//!
//! The broker only ever issues `GET` requests with a query string and reads back a status code
//! and a body, so [`IssuerHttpClient`] is that narrow. [`ReqwestHttpClient`] is the
//! default implementation; tests and custom stacks plug in their own.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`IssuerHttpClient::get`].
pub type IssuerFuture<'a> =
	Pin<Box<dyn Future<Output = Result<IssuerResponse, TransportError>> + 'a + Send>>;

/// Raw issuer answer before any decoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuerResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response body bytes.
	pub body: Vec<u8>,
}
impl IssuerResponse {
	/// Builds a `200 OK` response around `body`.
	pub fn ok(body: impl Into<Vec<u8>>) -> Self {
		Self { status: 200, body: body.into() }
	}

	/// Whether the status is in the 2xx range.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Body rendered as (lossy) UTF-8 for diagnostics.
	pub fn body_text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

/// Abstraction over HTTP transports capable of calling the credential issuer.
///
/// Implementations must be `Send + Sync + 'static` so one client can be shared across broker
/// clones, and the returned futures must be `Send` so flows can hop executors.
pub trait IssuerHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Performs `GET url?query` and returns the status and body.
	///
	/// Only transport-level problems are errors; non-2xx statuses come back as responses.
	fn get<'a>(&'a self, url: &'a Url, query: &'a [(&'a str, &'a str)]) -> IssuerFuture<'a>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl IssuerHttpClient for ReqwestHttpClient {
	fn get<'a>(&'a self, url: &'a Url, query: &'a [(&'a str, &'a str)]) -> IssuerFuture<'a> {
		Box::pin(async move {
			let response = self.0.get(url.clone()).query(query).send().await?;
			let status = response.status().as_u16();
			let body = response.bytes().await?.to_vec();

			Ok(IssuerResponse { status, body })
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn response_helpers_classify_status() {
		let ok = IssuerResponse::ok("{}");
		let teapot = IssuerResponse { status: 418, body: b"nope".to_vec() };

		assert!(ok.is_success());
		assert!(!teapot.is_success());
		assert_eq!(teapot.body_text(), "nope");
	}
}
