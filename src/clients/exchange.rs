//! Token endpoint calls for the authorization-code and refresh-token grants.
//!
//! Parameters travel in the URL query of a `POST`, not in a form body, and the response is
//! validated per grant: an authorization-code answer must carry `access_token`, `token_type`,
//! `expires_in`, and `id_token`; a refresh answer only `access_token` and `expires_in`.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, TokenSecret},
	clients::{decode_json, required},
	http::IdpHttpClient,
	oauth::{self, ApiFacade, CallOptions, Endpoint, GrantType, TransportErrorMapper},
};

/// Grant presented to the token endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenGrant {
	/// Authorization code bound to the PKCE verifier of the attempt that requested it.
	AuthorizationCode {
		/// Code received on the redirect.
		code: String,
		/// PKCE verifier of the attempt.
		code_verifier: String,
		/// Redirect URI used for the authorization request.
		redirect_uri: String,
	},
	/// Refresh token issued with an earlier access token.
	RefreshToken {
		/// Refresh token.
		refresh_token: TokenSecret,
	},
}
impl TokenGrant {
	/// Grant type sent as `grant_type`.
	pub fn grant_type(&self) -> GrantType {
		match self {
			TokenGrant::AuthorizationCode { .. } => GrantType::AuthorizationCode,
			TokenGrant::RefreshToken { .. } => GrantType::RefreshToken,
		}
	}

	fn params<'a>(&'a self, client_id: &'a ClientId) -> Vec<(&'static str, &'a str)> {
		let mut params =
			vec![("client_id", &**client_id), ("grant_type", self.grant_type().as_str())];

		match self {
			TokenGrant::AuthorizationCode { code, code_verifier, redirect_uri } => {
				params.push(("code", code.as_str()));
				params.push(("code_verifier", code_verifier.as_str()));
				params.push(("redirect_uri", redirect_uri.as_str()));
			},
			TokenGrant::RefreshToken { refresh_token } =>
				params.push(("refresh_token", refresh_token.expose())),
		}

		params
	}
}

/// Validated token endpoint answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenResult {
	/// Access token; never empty.
	pub access_token: TokenSecret,
	/// Token type; always present for authorization-code grants.
	pub token_type: Option<String>,
	/// Instant the access token expires, measured from when the response arrived.
	pub expires_at: OffsetDateTime,
	/// ID token; always present for authorization-code grants.
	pub id_token: Option<TokenSecret>,
	/// Refresh token, when the provider issued one.
	pub refresh_token: Option<TokenSecret>,
}

#[derive(Deserialize)]
struct RawTokenResponse {
	#[serde(default)]
	access_token: Option<String>,
	#[serde(default)]
	token_type: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
	#[serde(default)]
	id_token: Option<String>,
	#[serde(default)]
	refresh_token: Option<String>,
}

/// Exchanges grants at the token endpoint.
pub struct TokenExchangeClient<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	facade: ApiFacade<C, M>,
}
impl<C, M> TokenExchangeClient<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client over the provided facade.
	pub fn new(facade: ApiFacade<C, M>) -> Self {
		Self { facade }
	}

	/// Presents `grant` for `client_id` at `token_endpoint`.
	pub async fn exchange(
		&self,
		token_endpoint: &str,
		client_id: &ClientId,
		grant: &TokenGrant,
		options: &CallOptions,
	) -> Result<TokenResult> {
		let endpoint = Endpoint::Token(grant.grant_type());
		let url = oauth::with_query(
			oauth::parse_endpoint(endpoint, token_endpoint)?,
			grant.params(client_id),
		);
		let request = oauth::post_request(endpoint, &url)?;
		let body = self.facade.execute(endpoint, request, options).await?;

		parse_token_response(grant.grant_type(), &body, OffsetDateTime::now_utc())
	}
}
impl<C, M> Debug for TokenExchangeClient<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenExchangeClient(..)")
	}
}

pub(crate) fn parse_token_response(
	grant: GrantType,
	body: &[u8],
	received_at: OffsetDateTime,
) -> Result<TokenResult> {
	let endpoint = Endpoint::Token(grant);
	let raw: RawTokenResponse = decode_json(endpoint, body)?;
	let access_token = required(endpoint, "access_token", raw.access_token)?;
	let expires_in = raw.expires_in.ok_or_else(|| {
		endpoint.error(ErrorCode::InvalidResponse).with_message("Response is missing `expires_in`.")
	})?;
	let (token_type, id_token) = match grant {
		GrantType::AuthorizationCode => (
			Some(required(endpoint, "token_type", raw.token_type)?),
			Some(required(endpoint, "id_token", raw.id_token)?),
		),
		GrantType::RefreshToken => (
			raw.token_type.filter(|value| !value.is_empty()),
			raw.id_token.filter(|value| !value.is_empty()),
		),
	};

	if expires_in < 0 {
		return Err(endpoint
			.error(ErrorCode::InvalidResponse)
			.with_message(format!("Negative `expires_in` ({expires_in}).")));
	}

	let expires_at = received_at.checked_add(Duration::seconds(expires_in)).ok_or_else(|| {
		endpoint.error(ErrorCode::InvalidResponse).with_message("`expires_in` is out of range.")
	})?;

	Ok(TokenResult {
		access_token: TokenSecret::new(access_token),
		token_type,
		expires_at,
		id_token: id_token.map(TokenSecret::new),
		refresh_token: raw.refresh_token.filter(|token| !token.is_empty()).map(TokenSecret::new),
	})
}
