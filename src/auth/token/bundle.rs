//! Immutable token bundle snapshots and the unix timestamp type they are stamped with.

// self
use crate::{
	_prelude::*,
	auth::{IdTokenClaims, token::secret::TokenSecret},
	error::LoginError,
};

/// Unix timestamp in fractional seconds.
///
/// Persisted token files store `expires_at`/`updated_at` as floating-point seconds, so the
/// value is kept verbatim instead of being converted to a calendar type; converting back and
/// forth would not reproduce the stored bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnixTime(f64);
impl UnixTime {
	/// Wraps raw seconds since the unix epoch.
	pub const fn from_secs(secs: f64) -> Self {
		Self(secs)
	}

	/// Reads the current UTC clock.
	pub fn now() -> Self {
		Self::from_datetime(OffsetDateTime::now_utc())
	}

	/// Converts a calendar instant.
	pub fn from_datetime(instant: OffsetDateTime) -> Self {
		Self(instant.unix_timestamp_nanos() as f64 / 1_000_000_000.)
	}

	/// Returns the raw seconds since the unix epoch.
	pub const fn as_secs(self) -> f64 {
		self.0
	}

	/// Converts to a calendar instant, if the value is representable.
	pub fn to_datetime(self) -> Option<OffsetDateTime> {
		if !self.0.is_finite() {
			return None;
		}

		OffsetDateTime::from_unix_timestamp_nanos((self.0 * 1_000_000_000.) as i128).ok()
	}

	/// Shifts the timestamp by a signed duration.
	pub fn offset(self, delta: Duration) -> Self {
		Self(self.0 + delta.as_seconds_f64())
	}

	/// Shifts the timestamp by signed whole seconds.
	pub fn offset_secs(self, secs: i64) -> Self {
		Self(self.0 + secs as f64)
	}
}
impl Display for UnixTime {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}", self.0)
	}
}

/// Lifecycle status for a token bundle at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// The access token is still valid.
	Active,
	/// The access token reached `expires_at`.
	Expired,
}

/// Access/refresh/identity token triple plus expiry bookkeeping.
///
/// Bundles are never mutated; a refresh replaces the whole value. The serialized shape
/// (`access_token`, `refresh_token`, `id_token`, `expires_at`, `updated_at`, `guid`) is the
/// persisted token file layout.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBundle {
	/// Bearer token sent on every API call; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token used for the `refresh_token` grant.
	pub refresh_token: TokenSecret,
	/// Identity token whose `sub` claim names the account.
	pub id_token: TokenSecret,
	/// Instant the access token stops being valid.
	pub expires_at: UnixTime,
	/// Instant the bundle was issued by the vendor.
	pub updated_at: UnixTime,
	/// Account GUID derived from the identity token's `sub` claim.
	#[serde(rename = "guid")]
	pub subject_id: String,
}
impl TokenBundle {
	/// Builds a bundle from a fresh token response, deriving the subject from the id token.
	pub fn issue(
		access_token: impl Into<String>,
		refresh_token: impl Into<String>,
		id_token: impl Into<String>,
		expires_in: Duration,
		issued_at: UnixTime,
	) -> Result<Self, LoginError> {
		let id_token = TokenSecret::new(id_token);
		let claims = IdTokenClaims::decode_unverified(id_token.expose())?;

		Ok(Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: TokenSecret::new(refresh_token),
			id_token,
			expires_at: issued_at.offset(expires_in),
			updated_at: issued_at,
			subject_id: claims.subject().to_owned(),
		})
	}

	/// Decodes the identity token's claims without signature verification.
	pub fn claims(&self) -> Result<IdTokenClaims, LoginError> {
		IdTokenClaims::decode_unverified(self.id_token.expose())
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: UnixTime) -> TokenStatus {
		if instant >= self.expires_at { TokenStatus::Expired } else { TokenStatus::Active }
	}

	/// Returns `true` if the bundle has expired at the provided instant.
	pub fn is_expired_at(&self, instant: UnixTime) -> bool {
		matches!(self.status_at(instant), TokenStatus::Expired)
	}
}
impl Debug for TokenBundle {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenBundle")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("id_token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.field("updated_at", &self.updated_at)
			.field("subject_id", &self.subject_id)
			.finish()
	}
}
