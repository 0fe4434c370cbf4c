//! Username/password login: challenge rounds, authorize redirect capture, and code exchange.
//!
//! The authenticate endpoint drives a callback-style conversation. The client posts `{}`,
//! fills the returned `NameCallback`/`PasswordCallback` inputs, and re-posts the whole
//! document until the response carries a `tokenId`. That session token is then presented as
//! the `iPlanetDirectoryPro` cookie to the authorize endpoint, whose `302` redirect holds
//! the authorization code.

// crates.io
use reqwest::{
	StatusCode,
	header::{CONTENT_TYPE, COOKIE, HeaderValue, LOCATION},
};
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::TokenBundle,
	error::{ConfigError, LoginError, LoginStage, map_reqwest_error},
	flows::{AuthSession, Credentials},
	oauth::PLAIN_PKCE_VERIFIER,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

const ACCEPT_API_VERSION: &str = "Accept-API-Version";
const SESSION_COOKIE: &str = "iPlanetDirectoryPro";
const USER_NAME_PROMPT: &str = "User Name";

impl AuthSession {
	/// Logs in with a username/password pair and installs the resulting bundle.
	pub async fn login(&self, credentials: &Credentials) -> Result<TokenBundle> {
		let code = self.authorize(credentials).await?;

		self.request_tokens(&code).await
	}

	/// Runs the challenge loop and returns the authorization code from the redirect.
	pub async fn authorize(&self, credentials: &Credentials) -> Result<String> {
		const KIND: FlowKind = FlowKind::Authorize;

		let span = FlowSpan::new(KIND, "authorize");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let token_id = self.authenticate(credentials).await?;

				self.capture_authorization_code(&token_id).await
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}

	/// Exchanges an authorization code for tokens and installs them.
	pub async fn request_tokens(&self, code: &str) -> Result<TokenBundle> {
		const KIND: FlowKind = FlowKind::CodeExchange;

		let span = FlowSpan::new(KIND, "request_tokens");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				let bundle = self.token_endpoint.exchange_code(code).await?;

				Ok(self.install_tokens(bundle))
			})
			.await;

		obs::record_result(KIND, &result);

		result
	}

	async fn authenticate(&self, credentials: &Credentials) -> Result<String> {
		let rounds = self.config.max_challenge_rounds;
		let mut challenge = Value::Object(Default::default());

		for round in 1..=rounds {
			answer_callbacks(&mut challenge, credentials);

			let body = serde_json::to_vec(&challenge).map_err(ConfigError::from)?;
			let response = self
				.http_client
				.post(self.descriptor.endpoints.authenticate.clone())
				.header(ACCEPT_API_VERSION, self.accept_api_version()?)
				.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
				.body(body)
				.send()
				.await
				.map_err(map_reqwest_error)?;
			let status = response.status();
			let bytes = response.bytes().await.map_err(map_reqwest_error)?;

			if status != StatusCode::OK {
				tracing::info!(
					round,
					status = status.as_u16(),
					body = %String::from_utf8_lossy(&bytes),
					"Authenticate round was rejected."
				);

				return Err(LoginError::Rejected {
					stage: LoginStage::Authenticate,
					status: Some(status.as_u16()),
				}
				.into());
			}

			challenge = serde_json::from_slice(&bytes)
				.map_err(|source| LoginError::MalformedChallenge { source })?;

			if let Some(token_id) = challenge.get("tokenId").and_then(Value::as_str) {
				tracing::debug!(round, "Authenticate loop issued a session token.");

				return Ok(token_id.to_owned());
			}
		}

		tracing::error!(
			rounds,
			last = %challenge,
			"Authenticate loop ended without a session token."
		);

		Err(LoginError::ChallengeRoundsExceeded { rounds }.into())
	}

	async fn capture_authorization_code(&self, token_id: &str) -> Result<String> {
		let client = &self.descriptor.client;
		let mut url = self.descriptor.endpoints.authorize.clone();

		url.query_pairs_mut()
			.append_pair("client_id", &client.client_id)
			.append_pair("scope", &client.scope)
			.append_pair("response_type", "code")
			.append_pair("redirect_uri", client.redirect_uri.as_str())
			.append_pair("code_challenge", PLAIN_PKCE_VERIFIER)
			.append_pair("code_challenge_method", PLAIN_PKCE_VERIFIER);

		let cookie = HeaderValue::from_str(&format!("{SESSION_COOKIE}={token_id}"))
			.map_err(|_| ConfigError::InvalidHeader { name: COOKIE.to_string() })?;
		let response = self
			.http_client
			.get(url)
			.header(ACCEPT_API_VERSION, self.accept_api_version()?)
			.header(COOKIE, cookie)
			.send()
			.await
			.map_err(map_reqwest_error)?;
		let status = response.status();

		if status != StatusCode::FOUND {
			tracing::error!(status = status.as_u16(), "Authorize did not redirect.");

			return Err(LoginError::Rejected {
				stage: LoginStage::Authorize,
				status: Some(status.as_u16()),
			}
			.into());
		}

		let location = response
			.headers()
			.get(LOCATION)
			.and_then(|value| value.to_str().ok())
			.ok_or(LoginError::MissingRedirect)?
			.to_owned();

		authorization_code(&location)
	}

	fn accept_api_version(&self) -> Result<HeaderValue> {
		HeaderValue::from_str(&self.descriptor.accept_api_version).map_err(|_| {
			ConfigError::InvalidHeader { name: ACCEPT_API_VERSION.into() }.into()
		})
	}
}

/// Fills the user name and password inputs of a challenge document in place.
fn answer_callbacks(challenge: &mut Value, credentials: &Credentials) {
	let Some(callbacks) = challenge.get_mut("callbacks").and_then(Value::as_array_mut) else {
		return;
	};

	for callback in callbacks {
		let answer = match callback.get("type").and_then(Value::as_str) {
			Some("NameCallback")
				if callback.pointer("/output/0/value").and_then(Value::as_str)
					== Some(USER_NAME_PROMPT) =>
				credentials.username.as_str(),
			Some("PasswordCallback") => credentials.password.expose(),
			_ => continue,
		};

		if let Some(slot) = callback.pointer_mut("/input/0/value") {
			*slot = Value::String(answer.to_owned());
		}
	}
}

/// Extracts the `code` query parameter from the authorize redirect target.
fn authorization_code(location: &str) -> Result<String> {
	let redirect = Url::parse(location).map_err(|_| {
		tracing::error!(location, "Authorize redirect is not a URL.");

		LoginError::MissingRedirect
	})?;

	redirect
		.query_pairs()
		.find_map(|(key, value)| (key == "code").then(|| value.into_owned()))
		.ok_or_else(|| {
			tracing::error!(location, "Authorize redirect carries no code.");

			LoginError::MissingAuthorizationCode { location: location.to_owned() }.into()
		})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn callbacks_are_answered_in_place() {
		let mut challenge = serde_json::json!({
			"authId": "abc",
			"callbacks": [
				{
					"type": "NameCallback",
					"output": [{ "name": "prompt", "value": "User Name" }],
					"input": [{ "name": "IDToken1", "value": "" }],
				},
				{
					"type": "NameCallback",
					"output": [{ "name": "prompt", "value": "One Time Code" }],
					"input": [{ "name": "IDToken2", "value": "" }],
				},
				{
					"type": "PasswordCallback",
					"output": [{ "name": "prompt", "value": "Password" }],
					"input": [{ "name": "IDToken3", "value": "" }],
				},
			],
		});

		answer_callbacks(&mut challenge, &Credentials::new("driver", "hunter2"));

		assert_eq!(challenge["callbacks"][0]["input"][0]["value"], "driver");
		assert_eq!(challenge["callbacks"][1]["input"][0]["value"], "");
		assert_eq!(challenge["callbacks"][2]["input"][0]["value"], "hunter2");
		assert_eq!(challenge["authId"], "abc");
	}

	#[test]
	fn empty_challenge_is_left_untouched() {
		let mut challenge = serde_json::json!({});

		answer_callbacks(&mut challenge, &Credentials::new("driver", "hunter2"));

		assert_eq!(challenge, serde_json::json!({}));
	}

	#[test]
	fn code_is_read_from_custom_scheme_redirect() {
		let code = authorization_code("com.toyota.oneapp:/oauth2Callback?code=abc123&iss=x")
			.expect("Redirect with a code should parse.");

		assert_eq!(code, "abc123");

		let err = authorization_code("com.toyota.oneapp:/oauth2Callback?error=denied")
			.expect_err("Redirect without a code must fail.");

		assert!(matches!(err, Error::Login(LoginError::MissingAuthorizationCode { .. })));
	}
}
