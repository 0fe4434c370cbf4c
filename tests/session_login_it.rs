// crates.io
use httpmock::prelude::*;
use serde_json::{Value, json};
// self
use telematics_client::{
	_preludet::*,
	error::LoginError,
	flows::{Credentials, SessionConfig},
	store::{MemoryStore, TokenStore},
};

const USERNAME: &str = "driver@example.com";
const PASSWORD: &str = "hunter2";

fn challenge() -> Value {
	json!({
		"authId": "auth-1",
		"callbacks": [
			{
				"type": "NameCallback",
				"output": [{ "name": "prompt", "value": "User Name" }],
				"input": [{ "name": "IDToken1", "value": "" }]
			},
			{
				"type": "PasswordCallback",
				"output": [{ "name": "prompt", "value": "Password" }],
				"input": [{ "name": "IDToken2", "value": "" }]
			}
		]
	})
}

#[tokio::test]
async fn login_walks_challenge_authorize_and_code_exchange() {
	let server = MockServer::start_async().await;
	let first_round = server
		.mock_async(|when, then| {
			when.method(POST).path("/json/authenticate").json_body(json!({}));
			then.status(200).header("content-type", "application/json").json_body(challenge());
		})
		.await;
	let second_round = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/json/authenticate")
				.body_includes(USERNAME)
				.body_includes(PASSWORD);
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "tokenId": "session-1", "successUrl": "/console" }));
		})
		.await;
	let authorize = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/oauth2/authorize")
				.query_param("client_id", MOCK_CLIENT_ID)
				.query_param("response_type", "code")
				.query_param("code_challenge_method", "plain")
				.header("cookie", "iPlanetDirectoryPro=session-1");
			then.status(302).header("location", format!("{MOCK_REDIRECT_URI}?code=code-1"));
		})
		.await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth2/access_token")
				.body_includes("grant_type=authorization_code")
				.body_includes("code=code-1")
				.body_includes("code_verifier=plain");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"access_token": "access-1",
				"token_type": "bearer",
				"expires_in": 3600,
				"refresh_token": "refresh-1",
				"id_token": unsigned_id_token("guid-1"),
			}));
		})
		.await;
	let store = MemoryStore::default();
	let session = test_session(&server.base_url(), SessionConfig::default())
		.with_store(Arc::new(store.clone()));
	let bundle = session
		.login(&Credentials::new(USERNAME, PASSWORD))
		.await
		.expect("Login against the mock vendor should succeed.");

	first_round.assert_async().await;
	second_round.assert_async().await;
	authorize.assert_async().await;
	token.assert_async().await;

	assert_eq!(bundle.access_token.expose(), "access-1");
	assert_eq!(bundle.subject_id, "guid-1");
	assert!(session.logged_in());

	let stored = store
		.load_tokens()
		.expect("Memory store should load.")
		.expect("Login should have saved the bundle through the update hook.");

	assert_eq!(stored.refresh_token.expose(), "refresh-1");
	assert!(
		(stored.expires_at.as_secs() - stored.updated_at.as_secs() - 3600.).abs() < 1e-6,
		"Expiry should be issued_at plus expires_in."
	);
}

#[tokio::test]
async fn login_gives_up_after_max_challenge_rounds() {
	let server = MockServer::start_async().await;
	let authenticate = server
		.mock_async(|when, then| {
			when.method(POST).path("/json/authenticate");
			then.status(200).header("content-type", "application/json").json_body(challenge());
		})
		.await;
	let session =
		test_session(&server.base_url(), SessionConfig::default().with_max_challenge_rounds(3));
	let err = session
		.login(&Credentials::new(USERNAME, PASSWORD))
		.await
		.expect_err("A challenge loop that never issues a token should fail.");

	assert!(matches!(err, Error::Login(LoginError::ChallengeRoundsExceeded { rounds: 3 })));
	assert!(!session.logged_in());

	authenticate.assert_calls_async(3).await;
}

#[tokio::test]
async fn authorize_without_redirect_is_rejected() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/json/authenticate");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!({ "tokenId": "session-2" }));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/oauth2/authorize");
			then.status(200).body("<html>login page</html>");
		})
		.await;

	let session = test_session(&server.base_url(), SessionConfig::default());
	let err = session
		.authorize(&Credentials::new(USERNAME, PASSWORD))
		.await
		.expect_err("Authorize must insist on a redirect.");

	assert!(matches!(err, Error::Login(LoginError::Rejected { status: Some(200), .. })));
}

#[tokio::test]
async fn rejected_credentials_surface_the_status() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/json/authenticate");
			then.status(401).json_body(json!({ "code": 401, "reason": "Unauthorized" }));
		})
		.await;

	let session = test_session(&server.base_url(), SessionConfig::default());
	let err = session
		.login(&Credentials::new(USERNAME, "wrong"))
		.await
		.expect_err("A 401 from authenticate should fail the login.");

	assert!(matches!(err, Error::Login(LoginError::Rejected { status: Some(401), .. })));
}
