//! Client-level error types shared across the session, dispatcher, limiter, and stores.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error used where the concrete failure type is not part of the contract.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// No session was ever established (no token bundle loaded or exchanged).
	#[error("Session is not logged in.")]
	NotLoggedIn,
	/// A session existed but its tokens expired and could not be refreshed.
	#[error("Session tokens expired and could not be refreshed.")]
	TokenExpired {
		/// Failure reported by the refresh attempt.
		#[source]
		source: Box<Error>,
	},
	/// Authorization or token exchange failed.
	#[error(transparent)]
	Login(#[from] LoginError),
	/// Vendor API returned an error status or an unreadable envelope.
	#[error(transparent)]
	Api(#[from] ApiError),
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Rate limiter rejected a request as misconfigured.
	#[error(transparent)]
	RateLimit(#[from] crate::rate_limit::LimiterError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeouts).
	#[error(transparent)]
	Transport(#[from] TransportError),
}
impl Error {
	pub(crate) fn token_expired(source: Error) -> Self {
		Self::TokenExpired { source: Box::new(source) }
	}
}

/// Stage of the login handshake that produced a [`LoginError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoginStage {
	/// Username/password challenge rounds against the authenticate endpoint.
	Authenticate,
	/// Session-cookie exchange for an authorization code.
	Authorize,
	/// Authorization code exchange at the token endpoint.
	CodeExchange,
	/// Refresh token exchange at the token endpoint.
	Refresh,
}
impl LoginStage {
	/// Returns a stable label suitable for messages and span fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LoginStage::Authenticate => "authenticate",
			LoginStage::Authorize => "authorize",
			LoginStage::CodeExchange => "code_exchange",
			LoginStage::Refresh => "refresh",
		}
	}
}
impl Display for LoginStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Authorization and token exchange failures.
#[derive(Debug, ThisError)]
pub enum LoginError {
	/// The vendor answered with an unexpected HTTP status.
	#[error("The {stage} step was rejected with HTTP status {status:?}.")]
	Rejected {
		/// Handshake stage that failed.
		stage: LoginStage,
		/// HTTP status code, when a response was received.
		status: Option<u16>,
	},
	/// The challenge loop ended without the vendor issuing a session token.
	#[error("Authentication did not complete within {rounds} challenge rounds.")]
	ChallengeRoundsExceeded {
		/// Number of rounds attempted.
		rounds: usize,
	},
	/// The authenticate endpoint returned a body that is not a JSON object.
	#[error("Authenticate endpoint returned an unreadable challenge.")]
	MalformedChallenge {
		/// Underlying JSON failure.
		#[source]
		source: serde_json::Error,
	},
	/// The authorize response did not redirect to a parseable location.
	#[error("Authorize response is missing a usable redirect location.")]
	MissingRedirect,
	/// The authorize redirect did not carry a `code` query parameter.
	#[error("Authorize redirect does not carry an authorization code: {location}.")]
	MissingAuthorizationCode {
		/// Redirect location returned by the vendor.
		location: String,
	},
	/// The token endpoint response could not be turned into a token bundle.
	#[error("Token endpoint returned an unusable response during {stage}: {reason}.")]
	InvalidTokenResponse {
		/// Handshake stage that failed.
		stage: LoginStage,
		/// Human-readable reason.
		reason: String,
	},
	/// The identity token could not be decoded.
	#[error("Identity token is malformed: {reason}.")]
	InvalidIdToken {
		/// Human-readable reason.
		reason: String,
	},
}

/// Failures surfaced by vendor API calls.
#[derive(Debug, ThisError)]
pub enum ApiError {
	/// The vendor answered with a non-2xx status.
	#[error("Vendor API returned HTTP status {status}: {body}.")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Raw response body.
		body: String,
	},
	/// The response body was not a `{status, payload}` envelope.
	#[error("Vendor API response is not a valid envelope.")]
	MalformedEnvelope {
		/// Raw response body.
		body: String,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}

/// Configuration and validation failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Vendor descriptor contains an invalid URL.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Vendor descriptor failed validation or could not resolve a path.
	#[error(transparent)]
	Descriptor(#[from] crate::vendor::VendorDescriptorError),
	/// A header name or value supplied by the caller is not valid HTTP.
	#[error("Header `{name}` cannot be sent.")]
	InvalidHeader {
		/// Offending header name.
		name: String,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	BodySerialization(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the vendor.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request did not complete within the configured timeout.
	#[error("Request to the vendor timed out.")]
	Timeout {
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the vendor.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout { source: Box::new(e) } } else { Self::network(e) }
	}
}

/// Maps reqwest failures into the client taxonomy.
pub(crate) fn map_reqwest_error(err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::http_client_build(err).into();
	}

	TransportError::from(err).into()
}
