//! Discovery document resolution.

// self
use crate::{
	_prelude::*,
	auth::ClientId,
	clients::decode_json,
	http::IdpHttpClient,
	oauth::{self, ApiFacade, CallOptions, Endpoint, TransportErrorMapper},
};

/// Client public info endpoint used when the discovery document does not advertise one.
pub const DEFAULT_CLIENT_PUBLIC_INFO_TEMPLATE: &str =
	"https://api.grab.com/grabid/v1/oauth2/clients/{client_id}/public";

const CLIENT_ID_PLACEHOLDER: &str = "{client_id}";

/// Provider endpoints resolved from the discovery document.
///
/// Values are kept as received and parsed when used, so an unusable endpoint surfaces as
/// `InvalidUrl` in the operation that needs it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServiceEndpoints {
	/// Authorization endpoint.
	pub login_uri: String,
	/// Token endpoint.
	pub exchange_uri: String,
	/// ID token verification endpoint.
	pub verify_uri: String,
	/// Client public info endpoint; may contain a `{client_id}` placeholder.
	pub client_public_info_uri: String,
}
impl ServiceEndpoints {
	/// Client public info URL for `client_id`, with the placeholder substituted.
	pub fn client_public_info_for(&self, client_id: &ClientId) -> String {
		self.client_public_info_uri.replace(CLIENT_ID_PLACEHOLDER, client_id)
	}
}

#[derive(Deserialize)]
struct DiscoveryDocument {
	authorization_endpoint: String,
	token_endpoint: String,
	id_token_verification_endpoint: String,
	#[serde(default)]
	client_public_info_endpoint: Option<String>,
}

/// Fetches [`ServiceEndpoints`] from a discovery URL.
pub struct DiscoveryClient<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	facade: ApiFacade<C, M>,
	client_public_info_fallback: String,
}
impl<C, M> DiscoveryClient<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client; `client_public_info_fallback` fills in a missing public info endpoint.
	pub fn new(facade: ApiFacade<C, M>, client_public_info_fallback: impl Into<String>) -> Self {
		Self { facade, client_public_info_fallback: client_public_info_fallback.into() }
	}

	/// Resolves the provider endpoints advertised at `discovery_url`.
	pub async fn fetch(
		&self,
		discovery_url: &str,
		options: &CallOptions,
	) -> Result<ServiceEndpoints> {
		let url = oauth::parse_endpoint(Endpoint::Discovery, discovery_url)?;
		let request = oauth::get_request(Endpoint::Discovery, &url)?;
		let body = self.facade.execute(Endpoint::Discovery, request, options).await?;

		parse_discovery_document(&body, &self.client_public_info_fallback)
	}
}
impl<C, M> Debug for DiscoveryClient<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DiscoveryClient")
			.field("client_public_info_fallback", &self.client_public_info_fallback)
			.finish()
	}
}

pub(crate) fn parse_discovery_document(body: &[u8], fallback: &str) -> Result<ServiceEndpoints> {
	let document: DiscoveryDocument = decode_json(Endpoint::Discovery, body)?;

	Ok(ServiceEndpoints {
		login_uri: document.authorization_endpoint,
		exchange_uri: document.token_endpoint,
		verify_uri: document.id_token_verification_endpoint,
		client_public_info_uri: document
			.client_public_info_endpoint
			.filter(|uri| !uri.is_empty())
			.unwrap_or_else(|| fallback.to_owned()),
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn missing_public_info_endpoint_uses_fallback() {
		let body = br#"{
			"authorization_endpoint": "https://idp/authorize",
			"token_endpoint": "https://idp/token",
			"id_token_verification_endpoint": "https://idp/tokeninfo",
			"issuer": "https://idp"
		}"#;
		let endpoints = parse_discovery_document(body, DEFAULT_CLIENT_PUBLIC_INFO_TEMPLATE)
			.expect("Complete discovery document should parse.");

		assert_eq!(
			endpoints,
			ServiceEndpoints {
				login_uri: "https://idp/authorize".into(),
				exchange_uri: "https://idp/token".into(),
				verify_uri: "https://idp/tokeninfo".into(),
				client_public_info_uri: DEFAULT_CLIENT_PUBLIC_INFO_TEMPLATE.into(),
			}
		);

		let client = ClientId::new("partner-client").expect("Client fixture should be valid.");

		assert_eq!(
			endpoints.client_public_info_for(&client),
			"https://api.grab.com/grabid/v1/oauth2/clients/partner-client/public"
		);
	}

	#[test]
	fn advertised_public_info_endpoint_wins() {
		let body = br#"{
			"authorization_endpoint": "https://idp/authorize",
			"token_endpoint": "https://idp/token",
			"id_token_verification_endpoint": "https://idp/tokeninfo",
			"client_public_info_endpoint": "https://idp/clients/{client_id}"
		}"#;
		let endpoints = parse_discovery_document(body, DEFAULT_CLIENT_PUBLIC_INFO_TEMPLATE)
			.expect("Complete discovery document should parse.");

		assert_eq!(endpoints.client_public_info_uri, "https://idp/clients/{client_id}");
	}

	#[test]
	fn missing_required_endpoint_is_invalid_response() {
		let body = br#"{"authorization_endpoint":"https://idp/authorize","token_endpoint":"https://idp/token"}"#;
		let err = parse_discovery_document(body, DEFAULT_CLIENT_PUBLIC_INFO_TEMPLATE)
			.expect_err("Missing verification endpoint must be rejected.");

		assert_eq!(err.domain(), ErrorDomain::ServiceDiscovery);
		assert_eq!(err.code(), ErrorCode::InvalidResponse);

		let err = parse_discovery_document(b"<html>", DEFAULT_CLIENT_PUBLIC_INFO_TEMPLATE)
			.expect_err("Non-JSON body must be rejected.");

		assert_eq!(err.code(), ErrorCode::InvalidResponse);
	}
}
