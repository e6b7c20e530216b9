//! Names an application goes by: the caller-facing key and the issuer's `appid`.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

/// Longest accepted [`AppKey`], in bytes.
pub const APP_KEY_MAX_LEN: usize = 256;
/// Longest accepted [`AppId`], in bytes.
pub const APP_ID_MAX_LEN: usize = 64;

/// Error returned when an application key or app id is rejected.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum IdentifierError {
	/// The value was empty.
	#[error("{kind} cannot be empty.")]
	Empty {
		/// `AppKey` or `AppId`.
		kind: &'static str,
	},
	/// The value is longer than the kind allows.
	#[error("{kind} exceeds {max} bytes.")]
	TooLong {
		/// `AppKey` or `AppId`.
		kind: &'static str,
		/// Maximum permitted length in bytes.
		max: usize,
	},
	/// The value contains a character the kind does not allow.
	#[error("{kind} contains the disallowed character {found:?}.")]
	InvalidCharacter {
		/// `AppKey` or `AppId`.
		kind: &'static str,
		/// First offending character.
		found: char,
	},
}

/// Logical key callers use to select a registered application.
///
/// The key is opaque: any non-empty text without control characters is accepted, spaces
/// included. It also prefixes the default cache keys.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AppKey(String);
impl AppKey {
	/// Validates and wraps an application key.
	pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
		let value = value.into();

		check_len("AppKey", &value, APP_KEY_MAX_LEN)?;

		match value.chars().find(|c| c.is_control()) {
			Some(found) => Err(IdentifierError::InvalidCharacter { kind: "AppKey", found }),
			None => Ok(Self(value)),
		}
	}
}

/// Issuer-assigned application identifier, sent verbatim as the `appid` query parameter.
///
/// Only printable ASCII is accepted; issuer app ids look like `wx` followed by hex digits.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct AppId(String);
impl AppId {
	/// Validates and wraps an issuer app id.
	pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
		let value = value.into();

		check_len("AppId", &value, APP_ID_MAX_LEN)?;

		match value.chars().find(|c| !c.is_ascii_graphic()) {
			Some(found) => Err(IdentifierError::InvalidCharacter { kind: "AppId", found }),
			None => Ok(Self(value)),
		}
	}
}

macro_rules! impl_str_views {
	($($name:ident),+) => {$(
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &str {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, "{}({:?})", stringify!($name), self.0)
			}
		}
	)+};
}
impl_str_views!(AppKey, AppId);

fn check_len(kind: &'static str, value: &str, max: usize) -> Result<(), IdentifierError> {
	if value.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if value.len() > max {
		return Err(IdentifierError::TooLong { kind, max });
	}

	Ok(())
}
