//! Issuer endpoints, request parameters, and response decoding.
//!
//! Both endpoints answer `200 OK` with JSON whether they succeed or not. A usable answer carries
//! the credential plus a positive `expires_in`; a refusal carries a non-zero `errcode`. The ticket
//! endpoint also sends `errcode: 0` next to a successful ticket, which is not a refusal.

// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransientError, TransportError},
	http::IssuerResponse,
	obs::FlowKind,
};

/// Default access-token endpoint.
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://api.weixin.qq.com/cgi-bin/token";
/// Default JS API ticket endpoint.
pub const DEFAULT_TICKET_ENDPOINT: &str = "https://api.weixin.qq.com/cgi-bin/ticket/getticket";

/// Issuer URLs the broker calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuerEndpoints {
	/// Access-token endpoint.
	pub token: Url,
	/// JS API ticket endpoint.
	pub ticket: Url,
}
impl IssuerEndpoints {
	/// Parses both endpoints.
	pub fn parse(token: &str, ticket: &str) -> Result<Self, ConfigError> {
		let token = Url::parse(token)
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "token", source })?;
		let ticket = Url::parse(ticket)
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "ticket", source })?;

		Ok(Self { token, ticket })
	}

	/// Production WeChat endpoints.
	pub fn wechat() -> Result<Self, ConfigError> {
		Self::parse(DEFAULT_TOKEN_ENDPOINT, DEFAULT_TICKET_ENDPOINT)
	}
}

/// Credential kinds the issuer hands out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Credential {
	/// `access_token` from the token endpoint.
	AccessToken,
	/// `ticket` from the ticket endpoint.
	JsApiTicket,
}
impl Credential {
	/// Flow label used in diagnostics and metrics.
	pub const fn kind(self) -> FlowKind {
		match self {
			Self::AccessToken => FlowKind::AccessToken,
			Self::JsApiTicket => FlowKind::JsApiTicket,
		}
	}

	/// Endpoint serving this credential.
	pub fn endpoint(self, endpoints: &IssuerEndpoints) -> &Url {
		match self {
			Self::AccessToken => &endpoints.token,
			Self::JsApiTicket => &endpoints.ticket,
		}
	}
}

/// Credential value and lifetime decoded from a successful answer.
#[derive(Clone, PartialEq, Eq)]
pub struct Issued {
	/// Token or ticket string.
	pub value: String,
	/// Lifetime in seconds; always positive.
	pub expires_in: u64,
}
impl Debug for Issued {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Issued")
			.field("value", &"<redacted>")
			.field("expires_in", &self.expires_in)
			.finish()
	}
}

/// Decoded issuer answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IssuerReply {
	/// The credential was issued.
	Issued(Issued),
	/// The issuer refused with an error code.
	Rejected {
		/// Issuer error code (non-zero).
		errcode: i64,
		/// Issuer error message.
		errmsg: String,
	},
}

#[derive(Debug, Deserialize)]
struct ReplyBody {
	#[serde(default)]
	access_token: Option<String>,
	#[serde(default)]
	ticket: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
	#[serde(default)]
	errcode: Option<i64>,
	#[serde(default)]
	errmsg: Option<String>,
}

/// Query parameters for the access-token request.
pub fn token_query<'a>(app_id: &'a str, secret: &'a str) -> [(&'a str, &'a str); 3] {
	[("grant_type", "client_credential"), ("appid", app_id), ("secret", secret)]
}

/// Query parameters for the JS API ticket request.
pub fn ticket_query(access_token: &str) -> [(&str, &str); 2] {
	[("access_token", access_token), ("type", "jsapi")]
}

/// Classifies a raw issuer response.
pub fn decode_reply(credential: Credential, response: &IssuerResponse) -> Result<IssuerReply> {
	if !response.is_success() {
		return Err(TransportError::Status { status: response.status }.into());
	}

	let kind = credential.kind();
	let mut de = serde_json::Deserializer::from_slice(&response.body);
	let body: ReplyBody = serde_path_to_error::deserialize(&mut de).map_err(|source| {
		TransientError::ResponseParse { kind, source, body: response.body_text() }
	})?;
	let value = match credential {
		Credential::AccessToken => body.access_token,
		Credential::JsApiTicket => body.ticket,
	};
	let expires_in =
		body.expires_in.and_then(|secs| u64::try_from(secs).ok()).filter(|&secs| secs > 0);

	match (value.filter(|v| !v.is_empty()), expires_in, body.errcode) {
		(Some(value), Some(expires_in), _) => Ok(IssuerReply::Issued(Issued { value, expires_in })),
		(_, _, Some(errcode)) if errcode != 0 =>
			Ok(IssuerReply::Rejected { errcode, errmsg: body.errmsg.unwrap_or_default() }),
		_ => Err(TransientError::UnrecognizedResponse { kind, body: response.body_text() }.into()),
	}
}
