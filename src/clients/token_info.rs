//! ID token verification through the provider's token-info endpoint.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, IdTokenInfo, TokenSecret},
	clients::decode_json,
	http::IdpHttpClient,
	oauth::{self, ApiFacade, CallOptions, Endpoint, TransportErrorMapper},
};

const ENDPOINT: Endpoint = Endpoint::TokenInfo;

/// Token-info body: registered JWT claim names plus the provider's `svc` and `pid`.
#[derive(Deserialize)]
struct RawIdTokenInfo {
	#[serde(default)]
	aud: Option<String>,
	#[serde(default)]
	svc: Option<String>,
	#[serde(default)]
	nbf: Option<f64>,
	#[serde(default)]
	exp: Option<f64>,
	#[serde(default)]
	iat: Option<f64>,
	#[serde(default)]
	iss: Option<String>,
	#[serde(default)]
	jti: Option<String>,
	#[serde(default)]
	pid: Option<String>,
	#[serde(default)]
	sub: Option<String>,
	#[serde(default)]
	nonce: Option<String>,
}

/// Asks the identity provider to verify an ID token and return its claims.
pub struct TokenInfoClient<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	facade: ApiFacade<C, M>,
}
impl<C, M> TokenInfoClient<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client over the provided facade.
	pub fn new(facade: ApiFacade<C, M>) -> Self {
		Self { facade }
	}

	/// Verifies `id_token` and returns its claims.
	///
	/// An answer whose `nonce` differs from `expected_nonce`, or that lacks any claim, fails with
	/// `InvalidNonce`.
	pub async fn fetch(
		&self,
		verification_endpoint: &str,
		client_id: &ClientId,
		id_token: &TokenSecret,
		expected_nonce: &str,
		options: &CallOptions,
	) -> Result<IdTokenInfo> {
		let url = oauth::with_query(oauth::parse_endpoint(ENDPOINT, verification_endpoint)?, [
			("client_id", &**client_id),
			("id_token", id_token.expose()),
			("nonce", expected_nonce),
		]);
		let request = oauth::get_request(ENDPOINT, &url)?;
		let body = self.facade.execute(ENDPOINT, request, options).await?;
		let info = parse_id_token_info(&body)?;

		if info.nonce != expected_nonce {
			return Err(ENDPOINT.error(ErrorCode::InvalidNonce));
		}

		Ok(info)
	}
}
impl<C, M> Debug for TokenInfoClient<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenInfoClient(..)")
	}
}

pub(crate) fn parse_id_token_info(body: &[u8]) -> Result<IdTokenInfo> {
	let raw: RawIdTokenInfo = decode_json(ENDPOINT, body)?;

	Ok(IdTokenInfo {
		audience: claim("aud", raw.aud)?,
		service: claim("svc", raw.svc)?,
		not_valid_before: timestamp("nbf", raw.nbf)?,
		expiration: timestamp("exp", raw.exp)?,
		issue_date: timestamp("iat", raw.iat)?,
		issuer: claim("iss", raw.iss)?,
		token_id: claim("jti", raw.jti)?,
		partner_id: claim("pid", raw.pid)?,
		partner_user_id: claim("sub", raw.sub)?,
		nonce: claim("nonce", raw.nonce)?,
	})
}

/// Incomplete claims cannot be bound to the session nonce, so they fail like a mismatch.
fn unverifiable(field: &'static str) -> Error {
	ENDPOINT
		.error(ErrorCode::InvalidNonce)
		.with_message(format!("Token info carries no usable `{field}`."))
}

fn claim(field: &'static str, value: Option<String>) -> Result<String> {
	value.filter(|value| !value.is_empty()).ok_or_else(|| unverifiable(field))
}

/// Converts a Unix timestamp in (possibly fractional) seconds.
fn timestamp(field: &'static str, value: Option<f64>) -> Result<OffsetDateTime> {
	let seconds =
		value.filter(|seconds| seconds.is_finite()).ok_or_else(|| unverifiable(field))?;

	OffsetDateTime::from_unix_timestamp_nanos((seconds * 1e9) as i128)
		.map_err(|_| unverifiable(field))
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	const CLAIMS: &str = r#"{
		"aud": "partner-client",
		"svc": "PASSENGER",
		"nbf": 1735689600,
		"exp": 1735693200.0,
		"iat": 1735689600,
		"iss": "https://idp.example.com",
		"jti": "jti-1",
		"pid": "partner-1",
		"sub": "user-1",
		"nonce": "nonce-1"
	}"#;

	#[test]
	fn all_claims_are_mapped() {
		let info = parse_id_token_info(CLAIMS.as_bytes()).expect("Complete claims should parse.");

		assert_eq!(info.audience, "partner-client");
		assert_eq!(info.not_valid_before, datetime!(2025-01-01 00:00 UTC));
		assert_eq!(info.expiration, datetime!(2025-01-01 01:00 UTC));
		assert_eq!(info.token_id, "jti-1");
		assert_eq!(info.partner_user_id, "user-1");
		assert_eq!(info.nonce, "nonce-1");
	}

	#[test]
	fn empty_or_missing_claims_fail_nonce_binding() {
		for body in [
			CLAIMS.replace("\"jti-1\"", "\"\""),
			CLAIMS.replace("\"exp\"", "\"expiry\""),
			CLAIMS.replace("\"sub\"", "\"partnerUserId\""),
		] {
			let err = parse_id_token_info(body.as_bytes())
				.expect_err("Incomplete claims must be rejected.");

			assert_eq!(err.domain(), ErrorDomain::GetIdTokenInfo);
			assert_eq!(err.code(), ErrorCode::InvalidNonce);
		}
	}

	#[test]
	fn malformed_bodies_stay_invalid_responses() {
		let err = parse_id_token_info(br#"{"aud": 7}"#)
			.expect_err("A mistyped claim must be rejected.");

		assert_eq!(err.code(), ErrorCode::InvalidResponse);
	}
}
