//! Leveled diagnostic events emitted by the credential flows and the sinks that consume them.
//!
//! The `Option`-returning broker APIs never surface errors, so these events are the only record
//! of why a credential could not be resolved. The broker owns one [`DiagnosticSink`], injected via
//! `Broker::with_diagnostics`; [`TracingSink`] is the default.

// self
use crate::{_prelude::*, obs::FlowKind};

/// Severity attached to a [`Diagnostic`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DiagnosticLevel {
	/// Recoverable problem; the flow keeps going.
	Warn,
	/// The issuer refused a request or the flow gave up.
	Error,
}

/// Diagnostic event produced while resolving a credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
	/// The issuer answered with an `errcode`.
	IssuerRejected {
		/// Credential being requested.
		kind: FlowKind,
		/// Application the request was made for.
		app_key: String,
		/// 1-based attempt number.
		attempt: u32,
		/// Issuer error code.
		errcode: i64,
		/// Issuer error message.
		errmsg: String,
		/// Operator guidance for well-known codes.
		hint: Option<&'static str>,
	},
	/// An attempt failed before the issuer produced a usable answer (network, HTTP status, body).
	AttemptFailed {
		/// Credential being requested.
		kind: FlowKind,
		/// Application the request was made for.
		app_key: String,
		/// 1-based attempt number.
		attempt: u32,
		/// Rendered failure.
		message: String,
	},
	/// The credential store could not be read or written.
	StoreFailed {
		/// Credential being cached.
		kind: FlowKind,
		/// Store key involved.
		cache_key: String,
		/// Rendered failure.
		message: String,
	},
	/// All bounded attempts failed.
	RetriesExhausted {
		/// Credential being requested.
		kind: FlowKind,
		/// Application the request was made for.
		app_key: String,
		/// Attempts performed.
		attempts: u32,
		/// Raw body of the last issuer response.
		last_response: Option<String>,
	},
	/// The ticket flow could not obtain an access token.
	MissingAccessToken {
		/// Application the ticket was requested for.
		app_key: String,
	},
}
impl Diagnostic {
	/// Severity used when the event is logged.
	pub fn level(&self) -> DiagnosticLevel {
		match self {
			Self::AttemptFailed { .. } | Self::StoreFailed { .. } => DiagnosticLevel::Warn,
			Self::IssuerRejected { .. }
			| Self::RetriesExhausted { .. }
			| Self::MissingAccessToken { .. } => DiagnosticLevel::Error,
		}
	}
}
impl Display for Diagnostic {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::IssuerRejected { kind, attempt, errcode, errmsg, hint, .. } => {
				write!(
					f,
					"Issuer rejected {kind} attempt {attempt} with errcode {errcode}: {errmsg}"
				)?;

				if let Some(hint) = hint {
					write!(f, " ({hint})")?;
				}

				Ok(())
			},
			Self::AttemptFailed { kind, attempt, message, .. } =>
				write!(f, "Attempt {attempt} to fetch the {kind} failed: {message}"),
			Self::StoreFailed { kind, cache_key, message } =>
				write!(f, "Credential store failed for {kind} key `{cache_key}`: {message}"),
			Self::RetriesExhausted { kind, attempts, last_response, .. } => write!(
				f,
				"Gave up on the {kind} after {attempts} attempts; last response: {}",
				last_response.as_deref().unwrap_or("<none>")
			),
			Self::MissingAccessToken { app_key } =>
				write!(f, "Access token is missing for application `{app_key}`"),
		}
	}
}

/// Consumer of [`Diagnostic`] events.
pub trait DiagnosticSink
where
	Self: Send + Sync,
{
	/// Handles one event; must not block.
	fn emit(&self, diagnostic: &Diagnostic);
}

/// Routes diagnostics to `tracing` (no-op without the `tracing` feature).
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;
impl DiagnosticSink for TracingSink {
	fn emit(&self, diagnostic: &Diagnostic) {
		#[cfg(feature = "tracing")]
		{
			match diagnostic.level() {
				DiagnosticLevel::Warn => tracing::warn!(event = ?diagnostic, "{diagnostic}"),
				DiagnosticLevel::Error => tracing::error!(event = ?diagnostic, "{diagnostic}"),
			}
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = diagnostic;
		}
	}
}

/// Operator guidance for issuer error codes with a well-known cause.
pub fn issuer_hint(errcode: i64) -> Option<&'static str> {
	match errcode {
		40002 => Some("make sure grant_type is client_credential"),
		40164 => Some("the caller IP is not allow-listed; add it to the API IP allow-list"),
		_ => None,
	}
}
