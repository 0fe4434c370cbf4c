//! Async client core for a vehicle telematics cloud: an OAuth2 session that logs in with a
//! username/password challenge loop and keeps its tokens fresh, disk-persisted leaky-bucket
//! quotas for the vendor's rate-limited endpoints, and a dispatcher that routes logical vehicle
//! operations onto the right API generation.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod dispatch;
pub mod error;
pub mod flows;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod rate_limit;
pub mod router;
pub mod store;
pub mod vendor;
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and fixture helpers shared by unit and integration tests.

	pub use crate::_prelude::*;

	// crates.io
	use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
	use serde_json::Value;
	// self
	use crate::{
		auth::{TokenBundle, TokenSecret, UnixTime},
		flows::{AuthSession, SessionConfig},
		http::VendorHttpClient,
		vendor::VendorDescriptor,
	};

	/// API key configured on [`mock_descriptor`].
	pub const MOCK_API_KEY: &str = "test-api-key";
	/// Client id configured on [`mock_descriptor`].
	pub const MOCK_CLIENT_ID: &str = "test-client";
	/// Redirect URI configured on [`mock_descriptor`].
	pub const MOCK_REDIRECT_URI: &str = "com.example.app:/oauth2Callback";

	/// Encodes an unsigned compact JWT carrying `claims`.
	pub fn unsigned_jwt(claims: &Value) -> String {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
		let payload = URL_SAFE_NO_PAD.encode(claims.to_string());

		format!("{header}.{payload}.c2lnbmF0dXJl")
	}

	/// Encodes an unsigned identity token for the given subject.
	pub fn unsigned_id_token(subject: &str) -> String {
		unsigned_jwt(&serde_json::json!({ "sub": subject, "aud": MOCK_CLIENT_ID }))
	}

	/// Builds a bundle for subject `guid-test` with the given timestamps.
	pub fn bundle_at(updated_at: UnixTime, expires_at: UnixTime) -> TokenBundle {
		TokenBundle {
			access_token: TokenSecret::new("access-test"),
			refresh_token: TokenSecret::new("refresh-test"),
			id_token: TokenSecret::new(unsigned_id_token("guid-test")),
			expires_at,
			updated_at,
			subject_id: "guid-test".into(),
		}
	}

	/// Builds a descriptor whose endpoints all live under `base`.
	pub fn mock_descriptor(base: &str) -> VendorDescriptor {
		let base = Url::parse(&format!("{}/", base.trim_end_matches('/')))
			.expect("Mock server base URL should parse.");
		let join = |path: &str| base.join(path).expect("Mock endpoint path should resolve.");

		VendorDescriptor::builder()
			.authenticate_endpoint(join("json/authenticate"))
			.authorize_endpoint(join("oauth2/authorize"))
			.token_endpoint(join("oauth2/access_token"))
			.api_gateway(join("api/"))
			.api_key(MOCK_API_KEY)
			.client_id(MOCK_CLIENT_ID)
			.redirect_uri(Url::parse(MOCK_REDIRECT_URI).expect("Mock redirect URI should parse."))
			.scope("openid profile write")
			.build()
			.expect("Mock descriptor should build.")
	}

	/// Builds an HTTP client that accepts the self-signed certificates produced by `httpmock`
	/// and, like the production client, never follows redirects.
	pub fn test_http_client() -> VendorHttpClient {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.timeout(std::time::Duration::from_secs(10))
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		VendorHttpClient::with_client(client)
	}

	/// Builds a logged-out session against a mock server.
	pub fn test_session(base: &str, config: SessionConfig) -> AuthSession {
		AuthSession::with_http_client(mock_descriptor(base), config, test_http_client())
			.expect("Test session should build.")
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		path::{Path, PathBuf},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError, Method};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
