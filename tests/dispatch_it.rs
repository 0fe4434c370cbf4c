// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use telematics_client::{
	_preludet::*,
	auth::{DeviceId, UnixTime},
	dispatch::ApiClient,
	error::ApiError,
	flows::{AuthSession, SessionConfig},
	rate_limit::{RateLimiterConfig, TokenBucketLimiter},
	reqwest::Method as HttpMethod,
};

const VIN: &str = "JTMAB3FV0PD000001";

fn logged_in_session(server: &MockServer) -> AuthSession {
	let session = test_session(&server.base_url(), SessionConfig::default());
	let now = UnixTime::now();

	session.set_tokens(bundle_at(now, now.offset_secs(3600)));
	session.set_device_id(DeviceId::new("device-test").expect("Fixture id should be valid."));

	session
}

fn limiter(
	dir: &tempfile::TempDir,
	name: &str,
	max: f64,
	deficit: f64,
) -> Arc<TokenBucketLimiter> {
	let config = RateLimiterConfig::new(max, Duration::DAY, deficit, dir.path().join(name));

	Arc::new(TokenBucketLimiter::open(config).expect("Limiter fixture should open."))
}

#[tokio::test]
async fn requests_carry_auth_headers_and_unwrap_the_envelope() {
	let server = MockServer::start_async().await;
	let status = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v1/global/remote/status")
				.header("authorization", "Bearer access-test")
				.header("x-api-key", MOCK_API_KEY)
				.header("x-guid", "guid-test")
				.header("vin", VIN);
			then.status(200).header("content-type", "application/json").json_body(json!({
				"status": { "messages": [{ "responseCode": "OVIP-0000" }] },
				"payload": { "doorLockState": "locked" },
			}));
		})
		.await;
	let client = ApiClient::new(logged_in_session(&server));
	let payload = client
		.get_vehicle_status(VIN, "17CYPLUS")
		.await
		.expect("Status read should succeed.");

	assert_eq!(payload, json!({ "doorLockState": "locked" }));

	status.assert_async().await;
}

#[tokio::test]
async fn header_overrides_replace_derived_headers() {
	let server = MockServer::start_async().await;
	let vehicles = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v2/vehicle/guid").header("x-guid", "guid-override");
			then.status(200).json_body(json!({ "status": "ok", "payload": [{ "vin": VIN }] }));
		})
		.await;
	let client = ApiClient::new(logged_in_session(&server));
	let payload = client
		.request(
			HttpMethod::GET,
			"/v2/vehicle/guid",
			&[("X-GUID".to_owned(), "guid-override".to_owned())],
			None,
		)
		.await
		.expect("Overridden request should succeed.");

	assert_eq!(payload[0]["vin"], VIN);

	vehicles.assert_async().await;
}

#[tokio::test]
async fn foreign_absolute_endpoints_are_refused_before_sending() {
	let server = MockServer::start_async().await;
	let any = server
		.mock_async(|_when, then| {
			then.status(200).json_body(json!({ "status": "ok", "payload": {} }));
		})
		.await;
	let client = ApiClient::new(logged_in_session(&server));
	let err = client
		.request(HttpMethod::GET, "https://elsewhere.example/v2/vehicle/guid", &[], None)
		.await
		.expect_err("Credentials should never be sent off the gateway.");

	assert!(matches!(err, Error::Config(_)));

	any.assert_calls_async(0).await;
}

#[tokio::test]
async fn non_success_status_is_an_api_error() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/one/vehicle");
			then.status(503).body("maintenance");
		})
		.await;

	let client = ApiClient::new(logged_in_session(&server));
	let err = client.get_vehicle_detail(VIN).await.expect_err("A 503 should fail the call.");

	match err {
		Error::Api(ApiError::Status { status, body }) => {
			assert_eq!(status, 503);
			assert_eq!(body, "maintenance");
		},
		other => panic!("Expected an API status error, got {other:?}."),
	}
}

#[tokio::test]
async fn body_without_envelope_is_malformed() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/vehiclehealth/status");
			then.status(200).json_body(json!({ "unexpected": true }));
		})
		.await;

	let client = ApiClient::new(logged_in_session(&server));
	let err = client
		.get_vehicle_health_status(VIN)
		.await
		.expect_err("A body without payload should fail.");

	assert!(matches!(err, Error::Api(ApiError::MalformedEnvelope { .. })));
}

#[tokio::test]
async fn logged_out_client_fails_before_sending() {
	let server = MockServer::start_async().await;
	let any = server
		.mock_async(|_when, then| {
			then.status(200).json_body(json!({ "status": "ok", "payload": {} }));
		})
		.await;
	let client = ApiClient::new(test_session(&server.base_url(), SessionConfig::default()));

	assert!(matches!(client.get_user_vehicle_list().await, Err(Error::NotLoggedIn)));

	any.assert_calls_async(0).await;
}

#[tokio::test]
async fn unsupported_generation_and_command_are_soft_errors() {
	let server = MockServer::start_async().await;
	let any = server
		.mock_async(|_when, then| {
			then.status(200).json_body(json!({ "status": "ok", "payload": {} }));
		})
		.await;
	let client = ApiClient::new(logged_in_session(&server));
	let generation = client
		.get_vehicle_status(VIN, "21MM")
		.await
		.expect("Unknown generations are reported as payloads.");

	assert_eq!(
		generation,
		json!({ "error": { "code": "400", "message": "Unsupported Vehicle Generation" } })
	);

	let command = client
		.remote_request(VIN, "sound-horn", None, "17CY")
		.await
		.expect("Unsupported commands are reported as payloads.");

	assert_eq!(command, json!({ "error": { "code": "400", "message": "Unsupported Command" } }));

	any.assert_calls_async(0).await;
}

#[tokio::test]
async fn door_lock_is_encoded_per_generation() {
	let server = MockServer::start_async().await;
	let current = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/v1/global/remote/command")
				.header("vin", VIN)
				.json_body(json!({ "command": "door-lock" }));
			then.status(200)
				.json_body(json!({ "status": "ok", "payload": { "returnCode": "000000" } }));
		})
		.await;
	let legacy = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/v1/legacy/remote/command")
				.header("x-brand", "T")
				.json_body(json!({
					"guid": "guid-test",
					"deviceId": "device-test",
					"vin": VIN,
					"command": { "code": "DL", "value": 1 },
				}));
			then.status(200)
				.json_body(json!({ "status": "ok", "payload": { "returnCode": "000000" } }));
		})
		.await;
	let client = ApiClient::new(logged_in_session(&server));

	client
		.remote_request(VIN, "door-lock", None, "17CYPLUS")
		.await
		.expect("Current-generation lock should succeed.");
	client
		.remote_request(VIN, "door-lock", None, "17CY")
		.await
		.expect("Legacy lock should succeed.");

	current.assert_async().await;
	legacy.assert_async().await;
}

#[tokio::test]
async fn refresh_status_sends_the_legacy_device_type() {
	let server = MockServer::start_async().await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/legacy/remote/refresh-status").json_body(json!({
				"guid": "guid-test",
				"deviceId": "device-test",
				"deviceType": "Android",
				"vin": VIN,
			}));
			then.status(200).json_body(json!({ "status": "ok", "payload": { "accepted": true } }));
		})
		.await;
	let dir = tempfile::tempdir().expect("Temp dir should be created.");
	let limiter = limiter(&dir, "refresh", 20., 5.);
	let client = ApiClient::new(logged_in_session(&server)).with_refresh_limiter(limiter.clone());
	let payload = client
		.send_refresh_status(VIN, "17CY")
		.await
		.expect("Refresh-status should succeed.");

	assert_eq!(payload, json!({ "accepted": true }));
	assert!((limiter.fill_level() - 16.).abs() < 0.05);

	refresh.assert_async().await;
}

#[tokio::test]
async fn refresh_if_capacity_skips_when_the_quota_is_exhausted() {
	let server = MockServer::start_async().await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/global/remote/refresh-status");
			then.status(200).json_body(json!({ "status": "ok", "payload": {} }));
		})
		.await;
	let dir = tempfile::tempdir().expect("Temp dir should be created.");
	let exhausted = limiter(&dir, "exhausted", 20., 0.);
	let client = ApiClient::new(logged_in_session(&server)).with_refresh_limiter(exhausted);

	assert_eq!(
		client
			.send_refresh_status_if_capacity(VIN, "17CYPLUS")
			.await
			.expect("An exhausted quota is not an error."),
		None
	);

	refresh.assert_calls_async(0).await;

	let available = limiter(&dir, "available", 20., 5.);
	let client = ApiClient::new(logged_in_session(&server)).with_refresh_limiter(available);

	assert_eq!(
		client
			.send_refresh_status_if_capacity(VIN, "17CYPLUS")
			.await
			.expect("Refresh with capacity should succeed."),
		Some(json!({}))
	);

	refresh.assert_calls_async(1).await;
}

#[tokio::test]
async fn telemetry_is_gated_by_the_status_limiter() {
	let server = MockServer::start_async().await;
	let telemetry = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v2/telemetry")
				.header("generation", "17CY")
				.header("x-brand", "T");
			then.status(200).json_body(json!({ "status": "ok", "payload": { "odometer": 1 } }));
		})
		.await;
	let dir = tempfile::tempdir().expect("Temp dir should be created.");
	let limiter = limiter(&dir, "status", 400., 50.);
	let client = ApiClient::new(logged_in_session(&server)).with_status_limiter(limiter.clone());

	client.get_telemetry(VIN, "17CY").await.expect("Telemetry read should succeed.");

	assert!((limiter.fill_level() - 351.).abs() < 0.05);

	telemetry.assert_async().await;
}

#[tokio::test]
async fn tokens_are_refreshed_when_they_expire_during_a_limiter_wait() {
	let server = MockServer::start_async().await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth2/access_token")
				.body_includes("grant_type=refresh_token");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"access_token": "access-2",
				"token_type": "bearer",
				"expires_in": 3600,
				"refresh_token": "refresh-2",
				"id_token": unsigned_id_token("guid-test"),
			}));
		})
		.await;
	let status = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v1/global/remote/status")
				.header("authorization", "Bearer access-2");
			then.status(200).json_body(json!({ "status": "ok", "payload": { "fresh": true } }));
		})
		.await;
	let session = test_session(&server.base_url(), SessionConfig::default());
	let now = UnixTime::now();

	// Fresh when the call starts, expired once the two second wait is over.
	session.set_tokens(bundle_at(now, now.offset_secs(1)));
	session.set_device_id(DeviceId::new("device-test").expect("Fixture id should be valid."));

	let dir = tempfile::tempdir().expect("Temp dir should be created.");
	let config = RateLimiterConfig::new(1., Duration::seconds(2), 0., dir.path().join("status"));
	let limiter = Arc::new(TokenBucketLimiter::open(config).expect("Limiter fixture should open."));
	let client = ApiClient::new(session).with_status_limiter(limiter);
	let payload = client
		.get_vehicle_status(VIN, "17CYPLUS")
		.await
		.expect("The delayed read should use a refreshed token.");

	assert_eq!(payload, json!({ "fresh": true }));

	token.assert_calls_async(1).await;
	status.assert_async().await;
}
