//! Token endpoint facade built on the `oauth2` crate.
//!
//! The vendor issues an identity token alongside the access/refresh pair, so responses are
//! parsed with [`IdTokenFields`] as the extra-fields type. The client is public (no secret);
//! `client_id` travels in the form body and PKCE runs in `plain` mode with the literal
//! verifier `plain`.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, AuthorizationCode, Client, ClientId, EndpointNotSet, EndpointSet, ExtraTokenFields,
	HttpClientError, PkceCodeVerifier, RedirectUrl, RefreshToken, RequestTokenError,
	StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
		BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	auth::{TokenBundle, TokenSecret, UnixTime},
	error::{ConfigError, LoginError, LoginStage, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, VendorHttpClient},
	vendor::VendorDescriptor,
};

/// PKCE verifier and challenge value the vendor's mobile client registration expects.
pub const PLAIN_PKCE_VERIFIER: &str = "plain";

/// Token response carrying the vendor's identity token.
pub type IdTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

type VendorOAuthClient = Client<
	BasicErrorResponse,
	IdTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;
type VendorRequestTokenError =
	RequestTokenError<HttpClientError<ReqwestError>, BasicErrorResponse>;

/// Extra token response fields returned by the vendor's token endpoint.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IdTokenFields {
	/// Compact JWT identifying the account.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
}
impl ExtraTokenFields for IdTokenFields {}

/// Authorization-code and refresh-token exchanges against the vendor's token endpoint.
#[derive(Clone, Debug)]
pub(crate) struct TokenEndpoint {
	oauth_client: VendorOAuthClient,
	http_client: VendorHttpClient,
	redirect_uri: String,
}
impl TokenEndpoint {
	pub(crate) fn from_descriptor(
		descriptor: &VendorDescriptor,
		http_client: VendorHttpClient,
	) -> Result<Self> {
		let token_url = TokenUrl::new(descriptor.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let redirect_uri = descriptor.client.redirect_uri.to_string();
		let redirect_url = RedirectUrl::new(redirect_uri.clone())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let oauth_client = Client::new(ClientId::new(descriptor.client.client_id.clone()))
			.set_token_uri(token_url)
			.set_redirect_uri(redirect_url)
			.set_auth_type(AuthType::RequestBody);

		Ok(Self { oauth_client, http_client, redirect_uri })
	}

	/// Exchanges an authorization code for a fresh bundle.
	pub(crate) async fn exchange_code(&self, code: &str) -> Result<TokenBundle> {
		const STAGE: LoginStage = LoginStage::CodeExchange;

		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.instrumented(meta.clone());
		let response = self
			.oauth_client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.set_pkce_verifier(PkceCodeVerifier::new(PLAIN_PKCE_VERIFIER.to_owned()))
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(STAGE, meta.take(), err))?;

		bundle_from_response(STAGE, response)
	}

	/// Runs the `refresh_token` grant.
	pub(crate) async fn refresh(&self, refresh_token: &TokenSecret) -> Result<TokenBundle> {
		const STAGE: LoginStage = LoginStage::Refresh;

		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.instrumented(meta.clone());
		let refresh_token = RefreshToken::new(refresh_token.expose().to_owned());
		let response = self
			.oauth_client
			.exchange_refresh_token(&refresh_token)
			.add_extra_param("redirect_uri", self.redirect_uri.clone())
			.add_extra_param("code_verifier", PLAIN_PKCE_VERIFIER)
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(STAGE, meta.take(), err))?;

		bundle_from_response(STAGE, response)
	}
}

fn bundle_from_response(stage: LoginStage, response: IdTokenResponse) -> Result<TokenBundle> {
	let issued_at = UnixTime::now();
	let refresh_token = response
		.refresh_token()
		.ok_or_else(|| invalid_response(stage, "the refresh_token field is missing"))?;
	let id_token = response
		.extra_fields()
		.id_token
		.as_deref()
		.ok_or_else(|| invalid_response(stage, "the id_token field is missing"))?;
	let expires_in = response
		.expires_in()
		.ok_or_else(|| invalid_response(stage, "the expires_in field is missing"))?;
	let expires_in = Duration::try_from(expires_in)
		.map_err(|_| invalid_response(stage, "the expires_in field is out of range"))?;

	TokenBundle::issue(
		response.access_token().secret().as_str(),
		refresh_token.secret().as_str(),
		id_token,
		expires_in,
		issued_at,
	)
	.map_err(Error::from)
}

fn invalid_response(stage: LoginStage, reason: &str) -> Error {
	LoginError::InvalidTokenResponse { stage, reason: reason.into() }.into()
}

fn map_request_error(
	stage: LoginStage,
	meta: Option<ResponseMetadata>,
	err: VendorRequestTokenError,
) -> Error {
	let status = meta.and_then(|meta| meta.status);

	match err {
		RequestTokenError::ServerResponse(response) => {
			tracing::info!(
				stage = stage.as_str(),
				error = %response.error(),
				"Token endpoint rejected the request."
			);

			LoginError::Rejected { stage, status }.into()
		},
		RequestTokenError::Request(error) => map_transport_error(stage, status, error),
		// Non-200 bodies that are not OAuth errors land here too.
		RequestTokenError::Parse(_, _) if status.is_some_and(|code| code != 200) =>
			LoginError::Rejected { stage, status }.into(),
		RequestTokenError::Parse(error, _) =>
			LoginError::InvalidTokenResponse { stage, reason: error.to_string() }.into(),
		RequestTokenError::Other(message) =>
			LoginError::InvalidTokenResponse { stage, reason: message }.into(),
	}
}

fn map_transport_error(
	stage: LoginStage,
	status: Option<u16>,
	err: HttpClientError<ReqwestError>,
) -> Error {
	match err {
		HttpClientError::Reqwest(inner) => crate::error::map_reqwest_error(*inner),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) =>
			LoginError::InvalidTokenResponse { stage, reason: message }.into(),
		_ => LoginError::Rejected { stage, status }.into(),
	}
}
