//! Canonical SHA-1 signatures over arbitrary field sets.
//!
//! The canonical string sorts the original keys, lower-cases them, and joins `key=value` pairs
//! with `&` without percent-encoding anything. Receivers verify signatures against exactly this
//! form, so values are emitted verbatim even when they contain `&`, `=`, or non-ASCII text.

// crates.io
use serde_json::{Map, Number, Value};
use sha1::{Digest, Sha1};
// self
use crate::_prelude::*;

/// Field set accepted by [`compute_signature`].
pub type SignatureFields = Map<String, Value>;

/// Builds a [`SignatureFields`] map from key/value pairs.
pub fn signature_fields<I, K, V>(pairs: I) -> SignatureFields
where
	I: IntoIterator<Item = (K, V)>,
	K: Into<String>,
	V: Into<Value>,
{
	pairs.into_iter().map(|(key, value)| (key.into(), value.into())).collect()
}

/// Lowercase hex SHA-1 of the canonical string, or `None` for a missing or invalid field set.
///
/// A field set is invalid when any key is empty or any value is falsy: `""`, `0`, `false`, or
/// `null`. No partial signature is ever produced.
pub fn compute_signature(fields: Option<&SignatureFields>) -> Option<String> {
	try_compute_signature(fields?).ok()
}

/// [`compute_signature`] with the failure reported as [`Error::InvalidSignatureInput`].
pub fn try_compute_signature(fields: &SignatureFields) -> Result<String> {
	let canonical = canonical_string(fields)?;

	Ok(hex::encode(Sha1::digest(canonical.as_bytes())))
}

/// Builds the string that [`try_compute_signature`] hashes.
pub fn canonical_string(fields: &SignatureFields) -> Result<String> {
	let mut keys = fields.keys().collect::<Vec<_>>();

	keys.sort();

	// Keys colliding after lower-casing keep the first position and the last value.
	let mut pairs = Vec::<(String, &Value)>::with_capacity(keys.len());

	for key in keys {
		let value = &fields[key];

		if key.is_empty() || is_falsy(value) {
			return Err(Error::InvalidSignatureInput);
		}

		let lowered = key.to_lowercase();

		match pairs.iter_mut().find(|(existing, _)| *existing == lowered) {
			Some(slot) => slot.1 = value,
			None => pairs.push((lowered, value)),
		}
	}

	Ok(pairs.iter().map(|(key, value)| render_pair(key, value)).collect::<Vec<_>>().join("&"))
}

fn is_falsy(value: &Value) -> bool {
	match value {
		Value::Null => true,
		Value::Bool(flag) => !flag,
		Value::Number(number) => number.as_f64().is_some_and(|n| n == 0.0),
		Value::String(text) => text.is_empty(),
		Value::Array(_) | Value::Object(_) => false,
	}
}

fn render_pair(key: &str, value: &Value) -> String {
	match value {
		Value::Array(items) => items
			.iter()
			.map(|item| format!("{key}={}", render_scalar(item)))
			.collect::<Vec<_>>()
			.join("&"),
		_ => format!("{key}={}", render_scalar(value)),
	}
}

fn render_scalar(value: &Value) -> String {
	match value {
		Value::String(text) => text.clone(),
		Value::Number(number) => render_number(number),
		Value::Bool(flag) => flag.to_string(),
		Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
	}
}

fn render_number(number: &Number) -> String {
	match number.as_f64() {
		// `1.0` renders as `1`, matching integral JSON numbers.
		Some(float) if number.is_f64() => float.to_string(),
		_ => number.to_string(),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn fields(value: Value) -> SignatureFields {
		match value {
			Value::Object(map) => map,
			other => panic!("Signature fixture must be an object, got {other}."),
		}
	}

	fn sha1_hex(input: &str) -> String {
		hex::encode(Sha1::digest(input.as_bytes()))
	}

	#[test]
	fn sorts_keys_before_hashing() {
		let fields = fields(json!({ "b": "2", "a": "1" }));

		assert_eq!(canonical_string(&fields).expect("Fields should be valid."), "a=1&b=2");
		assert_eq!(compute_signature(Some(&fields)), Some(sha1_hex("a=1&b=2")));
	}

	#[test]
	fn known_digest_matches() {
		let fields = signature_fields([("a", "1"), ("b", "2")]);

		assert_eq!(
			compute_signature(Some(&fields)).as_deref(),
			Some("d53cf64e768f4ef09c806bbe12258c78211b2690")
		);
	}

	#[test]
	fn missing_or_falsy_input_yields_none() {
		assert_eq!(compute_signature(None), None);

		for value in [
			json!({ "a": "1", "b": "" }),
			json!({ "a": 0 }),
			json!({ "a": 0.0 }),
			json!({ "a": false }),
			json!({ "a": null }),
		] {
			assert_eq!(compute_signature(Some(&fields(value.clone()))), None, "{value} is falsy.");
		}

		assert_eq!(compute_signature(Some(&signature_fields([("", "1")]))), None);
		assert!(matches!(
			try_compute_signature(&fields(json!({ "a": "" }))),
			Err(Error::InvalidSignatureInput)
		));
	}

	#[test]
	fn jsapi_config_vector_matches() {
		const TICKET: &str =
			"sM4AOVdWfPE4DxkXGEs8VMCPGGVi4C3VM0P37wVUCFvkVAy_90u5h9nbSlYy3-Sl-HhTdfl2fzFy1AOcHKP7qg";

		let fields = fields(json!({
			"nonceStr": "Wm3WZYTPz0wzccnW",
			"timestamp": 1414587457,
			"url": "http://mp.weixin.qq.com?params=value",
			"jsapi_ticket": TICKET
		}));
		let canonical = canonical_string(&fields).expect("Fields should be valid.");

		assert_eq!(
			canonical,
			format!(
				"jsapi_ticket={TICKET}&noncestr=Wm3WZYTPz0wzccnW&timestamp=1414587457\
				 &url=http://mp.weixin.qq.com?params=value"
			)
		);
		assert_eq!(
			compute_signature(Some(&fields)).as_deref(),
			Some("0f9de62fce790f9a083d5c99e95740ceb90c27ed")
		);
	}

	#[test]
	fn colliding_keys_keep_first_position_and_last_value() {
		let fields = fields(json!({ "B": "upper", "a": "1", "b": "lower" }));

		assert_eq!(canonical_string(&fields).expect("Fields should be valid."), "b=lower&a=1");
	}

	#[test]
	fn scalars_and_arrays_render_like_query_strings() {
		let fields =
			fields(json!({ "f": 1.5, "n": 1.0, "t": true, "v": ["x", 2], "o": { "k": 1 } }));

		assert_eq!(
			canonical_string(&fields).expect("Fields should be valid."),
			"f=1.5&n=1&o=&t=true&v=x&v=2"
		);
	}

	#[test]
	fn identical_input_is_deterministic() {
		let fields = signature_fields([("noncestr", "abc"), ("timestamp", "1")]);

		assert_eq!(compute_signature(Some(&fields)), compute_signature(Some(&fields.clone())));
	}
}
