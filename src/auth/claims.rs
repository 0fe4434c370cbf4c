//! Identity-token claim decoding.
//!
//! Signatures are deliberately not verified: the id token arrives over the vendor's own
//! TLS-protected token endpoint and the client has no key source to verify against. The
//! decoded claims identify the account (the `sub` claim becomes the `X-GUID` header); they
//! are never used as an authorization decision.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::{Map, Value};
// self
use crate::{_prelude::*, error::LoginError};

/// Claims carried by the vendor's identity token.
#[derive(Clone, Debug, PartialEq)]
pub struct IdTokenClaims {
	subject: String,
	claims: Map<String, Value>,
}
impl IdTokenClaims {
	/// Decodes the payload segment of a compact JWT without checking its signature.
	pub fn decode_unverified(token: &str) -> Result<Self, LoginError> {
		let mut segments = token.split('.');
		let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
			(Some(_), Some(payload), Some(_), None) => payload,
			_ => return Err(invalid("expected three dot-separated segments")),
		};
		let bytes = URL_SAFE_NO_PAD
			.decode(payload.trim_end_matches('='))
			.map_err(|e| invalid(format!("payload is not base64url: {e}")))?;
		let claims: Map<String, Value> = serde_json::from_slice(&bytes)
			.map_err(|e| invalid(format!("payload is not a JSON object: {e}")))?;
		let subject = claims
			.get("sub")
			.and_then(Value::as_str)
			.filter(|sub| !sub.is_empty())
			.ok_or_else(|| invalid("the `sub` claim is missing"))?
			.to_owned();

		Ok(Self { subject, claims })
	}

	/// Returns the `sub` claim (the account GUID).
	pub fn subject(&self) -> &str {
		&self.subject
	}

	/// Looks up an arbitrary claim.
	pub fn get(&self, name: &str) -> Option<&Value> {
		self.claims.get(name)
	}

	/// Returns all claims, including `sub`.
	pub fn as_map(&self) -> &Map<String, Value> {
		&self.claims
	}
}

fn invalid(reason: impl Into<String>) -> LoginError {
	LoginError::InvalidIdToken { reason: reason.into() }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::unsigned_jwt;

	#[test]
	fn decodes_subject_and_keeps_other_claims() {
		let token = unsigned_jwt(&serde_json::json!({
			"sub": "guid-1234",
			"aud": "oneappsdkclient",
			"email": "driver@example.com",
		}));
		let claims = IdTokenClaims::decode_unverified(&token)
			.expect("Unsigned fixture token should decode.");

		assert_eq!(claims.subject(), "guid-1234");
		assert_eq!(claims.get("aud").and_then(Value::as_str), Some("oneappsdkclient"));
		assert_eq!(claims.as_map().len(), 3);
	}

	#[test]
	fn tolerates_padded_payload_segment() {
		let token = unsigned_jwt(&serde_json::json!({ "sub": "ab" }));
		let mut parts: Vec<String> = token.split('.').map(str::to_owned).collect();

		parts[1].push_str("==");

		let claims = IdTokenClaims::decode_unverified(&parts.join("."))
			.expect("Padded payload should still decode.");

		assert_eq!(claims.subject(), "ab");
	}

	#[test]
	fn rejects_malformed_tokens() {
		assert!(IdTokenClaims::decode_unverified("not-a-jwt").is_err());
		assert!(IdTokenClaims::decode_unverified("a.%%%.c").is_err());

		let missing_sub = unsigned_jwt(&serde_json::json!({ "aud": "x" }));

		assert!(matches!(
			IdTokenClaims::decode_unverified(&missing_sub),
			Err(LoginError::InvalidIdToken { .. })
		));
	}
}
