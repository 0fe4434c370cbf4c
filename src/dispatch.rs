//! Authenticated vendor API dispatch.
//!
//! [`ApiClient`] derives the auth headers from the session on every call, merges caller
//! overrides, optionally waits on a [`TokenBucketLimiter`], and unwraps the vendor's
//! `{status, payload}` envelope.

mod vehicle;

// crates.io
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	error::{ApiError, ConfigError, map_reqwest_error},
	flows::AuthSession,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	rate_limit::TokenBucketLimiter,
	router::RoutedRequest,
};

const X_API_KEY: &str = "x-api-key";
const X_GUID: &str = "x-guid";

#[derive(Debug, Deserialize)]
struct Envelope {
	status: Value,
	payload: Value,
}

/// Vendor API client bound to one [`AuthSession`].
///
/// Status, engine-status, and telemetry reads wait on the status limiter; refresh-status
/// requests wait on the refresh limiter. Either limiter may be absent, in which case the
/// corresponding calls are never gated.
#[derive(Clone, Debug)]
pub struct ApiClient {
	session: AuthSession,
	status_limiter: Option<Arc<TokenBucketLimiter>>,
	refresh_limiter: Option<Arc<TokenBucketLimiter>>,
}
impl ApiClient {
	/// Creates an ungated client.
	pub fn new(session: AuthSession) -> Self {
		Self { session, status_limiter: None, refresh_limiter: None }
	}

	/// Gates status, engine-status, and telemetry reads.
	pub fn with_status_limiter(mut self, limiter: Arc<TokenBucketLimiter>) -> Self {
		self.status_limiter = Some(limiter);

		self
	}

	/// Gates refresh-status requests.
	pub fn with_refresh_limiter(mut self, limiter: Arc<TokenBucketLimiter>) -> Self {
		self.refresh_limiter = Some(limiter);

		self
	}

	/// Session the client authenticates with.
	pub fn session(&self) -> &AuthSession {
		&self.session
	}

	/// Limiter gating status reads, if any.
	pub fn status_limiter(&self) -> Option<&Arc<TokenBucketLimiter>> {
		self.status_limiter.as_ref()
	}

	/// Limiter gating refresh-status requests, if any.
	pub fn refresh_limiter(&self) -> Option<&Arc<TokenBucketLimiter>> {
		self.refresh_limiter.as_ref()
	}

	/// Sends an ungated request and returns the envelope payload.
	///
	/// `header_overrides` replace same-named auth headers.
	pub async fn request(
		&self,
		method: Method,
		endpoint: &str,
		header_overrides: &[(String, String)],
		body: Option<&Value>,
	) -> Result<Value> {
		self.dispatch(method, endpoint, header_overrides, body, None).await
	}

	/// Sends an ungated routed request.
	pub async fn execute(&self, request: &RoutedRequest) -> Result<Value> {
		self.execute_gated(request, None).await
	}

	pub(crate) async fn execute_gated(
		&self,
		request: &RoutedRequest,
		gate: Option<&TokenBucketLimiter>,
	) -> Result<Value> {
		self.dispatch(
			request.method.clone(),
			request.path,
			&request.headers,
			request.body.as_ref(),
			gate,
		)
		.await
	}

	async fn dispatch(
		&self,
		method: Method,
		endpoint: &str,
		header_overrides: &[(String, String)],
		body: Option<&Value>,
		gate: Option<&TokenBucketLimiter>,
	) -> Result<Value> {
		const KIND: FlowKind = FlowKind::ApiRequest;

		let span = FlowSpan::new(KIND, "dispatch");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let mut headers = self.headers(header_overrides).await?;

				if let Some(limiter) = gate {
					limiter.acquire(1.).await?;

					// The wait can outlive the access token.
					headers = self.headers(header_overrides).await?;
				}

				let url = self.session.descriptor.api_url(endpoint).map_err(ConfigError::from)?;

				tracing::debug!(%method, %url, "Calling vendor API.");

				let mut request = self.session.http_client.request(method, url).headers(headers);

				if let Some(body) = body {
					let bytes = serde_json::to_vec(body).map_err(ConfigError::from)?;

					request = request
						.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
						.body(bytes);
				}

				let response = request.send().await.map_err(map_reqwest_error)?;
				let status = response.status();
				let text = response.text().await.map_err(map_reqwest_error)?;

				if !status.is_success() {
					return Err(ApiError::Status { status: status.as_u16(), body: text }.into());
				}

				unwrap_envelope(text)
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}

	async fn headers(&self, overrides: &[(String, String)]) -> Result<HeaderMap> {
		let bundle = self.session.ensure_fresh().await?;
		let mut headers = HeaderMap::new();

		headers.insert(
			AUTHORIZATION,
			header_value("Authorization", &format!("Bearer {}", bundle.access_token.expose()))?,
		);
		headers.insert(
			HeaderName::from_static(X_API_KEY),
			header_value(X_API_KEY, &self.session.descriptor.api_key)?,
		);
		headers.insert(HeaderName::from_static(X_GUID), header_value(X_GUID, &bundle.subject_id)?);

		for (name, value) in overrides {
			let header = HeaderName::from_bytes(name.as_bytes())
				.map_err(|_| ConfigError::InvalidHeader { name: name.clone() })?;

			headers.insert(header, header_value(name, value)?);
		}

		Ok(headers)
	}
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
	HeaderValue::from_str(value)
		.map_err(|_| ConfigError::InvalidHeader { name: name.to_owned() }.into())
}

fn unwrap_envelope(body: String) -> Result<Value> {
	let mut deserializer = serde_json::Deserializer::from_str(&body);

	match serde_path_to_error::deserialize::<_, Envelope>(&mut deserializer) {
		Ok(envelope) => {
			tracing::debug!(status = %envelope.status, "Vendor API responded.");

			Ok(envelope.payload)
		},
		Err(source) => {
			tracing::error!(
				body = %body,
				path = %source.path(),
				"Vendor API response is not an envelope."
			);

			Err(ApiError::MalformedEnvelope { body, source }.into())
		},
	}
}
