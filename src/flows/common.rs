//! Shared session types: configuration, proactive refresh policy, credentials, and the
//! token-update hook.

// self
use crate::{
	_prelude::*,
	auth::{TokenBundle, TokenSecret, UnixTime},
	error::BoxError,
	http::DEFAULT_REQUEST_TIMEOUT,
};

/// Callback invoked with every bundle produced by a code exchange or refresh.
///
/// Failures are logged and swallowed; they never abort the flow that produced the bundle.
pub type TokenCallback = Arc<dyn Fn(&TokenBundle) -> Result<(), BoxError> + Send + Sync>;

/// Tunables for an [`AuthSession`](crate::flows::AuthSession).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
	/// Signed proactive refresh setting; see [`RefreshPolicy::from_secs`].
	pub refresh_secs: i64,
	/// Upper bound on challenge/response rounds during username/password login.
	pub max_challenge_rounds: usize,
	/// Timeout applied to every HTTP request issued by the session.
	pub request_timeout: Duration,
}
impl SessionConfig {
	/// Default signed refresh setting (refresh five minutes after issue).
	pub const DEFAULT_REFRESH_SECS: i64 = 300;
	/// Default challenge round limit.
	pub const DEFAULT_MAX_CHALLENGE_ROUNDS: usize = 10;

	/// Overrides the signed proactive refresh setting.
	pub fn with_refresh_secs(mut self, refresh_secs: i64) -> Self {
		self.refresh_secs = refresh_secs;

		self
	}

	/// Overrides the challenge round limit.
	pub fn with_max_challenge_rounds(mut self, rounds: usize) -> Self {
		self.max_challenge_rounds = rounds;

		self
	}

	/// Overrides the per-request timeout.
	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Returns the proactive refresh policy derived from `refresh_secs`.
	pub fn refresh_policy(&self) -> RefreshPolicy {
		RefreshPolicy::from_secs(self.refresh_secs)
	}
}
impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			refresh_secs: Self::DEFAULT_REFRESH_SECS,
			max_challenge_rounds: Self::DEFAULT_MAX_CHALLENGE_ROUNDS,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
		}
	}
}

/// When a still-valid bundle should be refreshed ahead of expiry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshPolicy {
	/// Refresh once the bundle is older than the given age.
	Periodic(Duration),
	/// Refresh once expiry is closer than the given lead time.
	NearExpiry(Duration),
	/// Refresh on every freshness check.
	Always,
}
impl RefreshPolicy {
	/// Maps the signed seconds setting onto a policy.
	///
	/// Positive values measure from `updated_at`, negative values measure backwards from
	/// `expires_at`, and zero refreshes unconditionally.
	pub fn from_secs(refresh_secs: i64) -> Self {
		match refresh_secs {
			0 => Self::Always,
			secs if secs > 0 => Self::Periodic(Duration::seconds(secs)),
			secs => Self::NearExpiry(Duration::seconds(secs).abs()),
		}
	}

	/// Returns `true` when the bundle should be refreshed at `now`.
	pub fn should_refresh(&self, bundle: &TokenBundle, now: UnixTime) -> bool {
		match self {
			Self::Periodic(age) => now > bundle.updated_at.offset(*age),
			Self::NearExpiry(lead) => now > bundle.expires_at.offset(-*lead),
			Self::Always => true,
		}
	}
}

/// Username/password pair answered during the challenge loop.
#[derive(Clone)]
pub struct Credentials {
	/// Account user name.
	pub username: String,
	/// Account password.
	pub password: TokenSecret,
}
impl Credentials {
	/// Creates a credential pair.
	pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
		Self { username: username.into(), password: TokenSecret::new(password) }
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.finish()
	}
}
