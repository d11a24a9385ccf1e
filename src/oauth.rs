//! Request execution for identity-service calls: per-call deadlines, cancellation, HTTP status
//! classification, and transport error mapping.

pub use oauth2;

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest,
	http::{
		Method,
		header::{CACHE_CONTROL, CONTENT_TYPE, HeaderValue},
	},
};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	error::TransportError,
	http::{IdpHttpClient, ResponseMetadata, ResponseMetadataSlot},
};

/// Deadline applied to a network call when the caller does not supply one.
pub const DEFAULT_REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(30);

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Grant types sent to the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GrantType {
	/// Authorization code + PKCE verifier.
	AuthorizationCode,
	/// Refresh token.
	RefreshToken,
}
impl GrantType {
	/// Returns the `grant_type` parameter value.
	pub const fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::RefreshToken => "refresh_token",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Identity-service endpoint a request targets; decides how failures are classified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
	/// Discovery document.
	Discovery,
	/// Token endpoint for the given grant.
	Token(GrantType),
	/// ID token verification endpoint.
	TokenInfo,
	/// Client public info endpoint (app-link descriptors).
	ClientPublicInfo,
}
impl Endpoint {
	/// Error domain reported for failures against this endpoint.
	pub const fn domain(self) -> ErrorDomain {
		match self {
			Endpoint::Discovery => ErrorDomain::ServiceDiscovery,
			Endpoint::Token(_) => ErrorDomain::ExchangeToken,
			Endpoint::TokenInfo => ErrorDomain::GetIdTokenInfo,
			Endpoint::ClientPublicInfo => ErrorDomain::AppLink,
		}
	}

	/// Code reported when the endpoint answers with a non-2xx status.
	pub const fn status_code(self) -> ErrorCode {
		match self {
			Endpoint::Discovery | Endpoint::ClientPublicInfo => ErrorCode::DiscoveryServiceFailed,
			Endpoint::Token(_) => ErrorCode::ExchangeTokenServiceFailed,
			Endpoint::TokenInfo => ErrorCode::IdTokenInfoServiceFailed,
		}
	}

	/// Code reported when the request never produced a response.
	pub const fn transport_code(self) -> ErrorCode {
		match self {
			Endpoint::TokenInfo => ErrorCode::IdTokenInfoServiceFailed,
			_ => ErrorCode::ServiceError,
		}
	}

	/// Builds an error in this endpoint's domain.
	pub fn error(self, code: ErrorCode) -> Error {
		Error::new(self.domain(), code)
	}
}

/// Per-call deadline and cancellation handle.
///
/// Cloning shares the cancellation token, so cancelling a clone cancels every call that was
/// handed the same options.
#[derive(Clone, Debug)]
pub struct CallOptions {
	/// Deadline for one network call.
	pub timeout: StdDuration,
	/// Cancels in-flight calls when triggered.
	pub cancel: CancellationToken,
}
impl CallOptions {
	/// Creates options with the given deadline and a fresh cancellation token.
	pub fn with_timeout(timeout: StdDuration) -> Self {
		Self { timeout, cancel: CancellationToken::new() }
	}

	/// Replaces the cancellation token.
	pub fn cancel_on(mut self, cancel: CancellationToken) -> Self {
		self.cancel = cancel;

		self
	}
}
impl Default for CallOptions {
	fn default() -> Self {
		Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
	}
}

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a crate error.
	fn map_transport_error(
		&self,
		endpoint: Endpoint,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		endpoint: Endpoint,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(endpoint, meta, *inner),
			HttpClientError::Http(inner) =>
				endpoint.error(ErrorCode::InvalidUrl).with_source(inner),
			HttpClientError::Io(inner) =>
				with_meta_status(endpoint.error(endpoint.transport_code()), meta)
					.with_source(TransportError::Io(inner)),
			HttpClientError::Other(message) =>
				with_meta_status(endpoint.error(endpoint.transport_code()), meta)
					.with_message(format!("HTTP client error: {message}.")),
			_ => with_meta_status(endpoint.error(endpoint.transport_code()), meta),
		}
	}
}

/// Executes identity-service requests through an [`IdpHttpClient`].
pub struct ApiFacade<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> ApiFacade<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a facade over the transport + mapper pair.
	pub fn new(http_client: impl Into<Arc<C>>, error_mapper: impl Into<Arc<M>>) -> Self {
		Self { http_client: http_client.into(), error_mapper: error_mapper.into() }
	}

	/// Sends `request` and returns the body of a 2xx response.
	///
	/// Fails with `Cancelled` when `options.cancel` fires first, `Timeout` when the deadline
	/// elapses first, the endpoint's status code (carrying the status) on a non-2xx answer, and
	/// the mapped transport error otherwise.
	pub async fn execute(
		&self,
		endpoint: Endpoint,
		request: HttpRequest,
		options: &CallOptions,
	) -> Result<Vec<u8>> {
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(meta.clone());
		let outcome = tokio::select! {
			biased;
			_ = options.cancel.cancelled() => return Err(endpoint.error(ErrorCode::Cancelled)),
			outcome = tokio::time::timeout(options.timeout, handle.call(request)) => outcome,
		};
		let response = match outcome {
			Ok(Ok(response)) => response,
			Ok(Err(e)) => {
				let meta = meta.take();

				return Err(self.error_mapper.map_transport_error(endpoint, meta.as_ref(), e));
			},
			Err(_) => return Err(endpoint.error(ErrorCode::Timeout)),
		};
		let status = response.status();

		if !status.is_success() {
			return Err(endpoint
				.error(endpoint.status_code())
				.with_status(status.as_u16())
				.with_message(status.as_u16().to_string()));
		}

		Ok(response.into_body())
	}
}
impl<C, M> Clone for ApiFacade<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: Arc::clone(&self.http_client),
			error_mapper: Arc::clone(&self.error_mapper),
		}
	}
}
impl<C, M> Debug for ApiFacade<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ApiFacade(..)")
	}
}

/// Builds a `GET` request carrying the no-cache + JSON headers every identity-service read uses.
pub(crate) fn get_request(endpoint: Endpoint, url: &Url) -> Result<HttpRequest> {
	build_request(endpoint, Method::GET, url)
}

/// Builds a `POST` request whose parameters travel in the URL query.
pub(crate) fn post_request(endpoint: Endpoint, url: &Url) -> Result<HttpRequest> {
	build_request(endpoint, Method::POST, url)
}

/// Parses an endpoint URL stored on the session; empty or malformed values fail with
/// `InvalidUrl`.
pub(crate) fn parse_endpoint(endpoint: Endpoint, raw: &str) -> Result<Url> {
	if raw.trim().is_empty() {
		return Err(endpoint.error(ErrorCode::InvalidUrl));
	}

	Url::parse(raw)
		.map_err(|e| endpoint.error(ErrorCode::InvalidUrl).with_message(raw).with_source(e))
}

/// Appends form-encoded query parameters; a literal `+` is sent as `%2B` and a space as `+`.
pub(crate) fn with_query<I, K, V>(mut url: Url, params: I) -> Url
where
	I: IntoIterator<Item = (K, V)>,
	K: AsRef<str>,
	V: AsRef<str>,
{
	{
		let mut pairs = url.query_pairs_mut();

		for (key, value) in params {
			pairs.append_pair(key.as_ref(), value.as_ref());
		}
	}

	url
}

fn build_request(endpoint: Endpoint, method: Method, url: &Url) -> Result<HttpRequest> {
	oauth2::http::Request::builder()
		.method(method)
		.uri(url.as_str())
		.header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
		.header(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))
		.body(Vec::new())
		.map_err(|e| endpoint.error(ErrorCode::InvalidUrl).with_source(e))
}

fn with_meta_status(error: Error, meta: Option<&ResponseMetadata>) -> Error {
	match meta.and_then(|meta| meta.status) {
		Some(status) => error.with_status(status),
		None => error,
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(
	endpoint: Endpoint,
	meta: Option<&ResponseMetadata>,
	err: ReqwestError,
) -> Error {
	if err.is_timeout() {
		return endpoint.error(ErrorCode::Timeout).with_source(err);
	}
	if err.is_builder() {
		return endpoint.error(ErrorCode::InvalidUrl).with_source(err);
	}

	with_meta_status(endpoint.error(endpoint.transport_code()), meta)
		.with_source(TransportError::from(err))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn endpoints_map_to_their_domains() {
		assert_eq!(Endpoint::Discovery.domain(), ErrorDomain::ServiceDiscovery);
		assert_eq!(
			Endpoint::Token(GrantType::RefreshToken).status_code(),
			ErrorCode::ExchangeTokenServiceFailed
		);
		assert_eq!(Endpoint::TokenInfo.transport_code(), ErrorCode::IdTokenInfoServiceFailed);
		assert_eq!(Endpoint::Discovery.transport_code(), ErrorCode::ServiceError);
		assert_eq!(Endpoint::ClientPublicInfo.domain(), ErrorDomain::AppLink);
	}

	#[test]
	fn query_encoding_keeps_plus_distinct_from_space() {
		let base =
			Url::parse("https://idp.example.com/token?v=2").expect("Base URL should parse.");
		let url = with_query(base, [("code", "a+b c"), ("redirect_uri", "app://cb?x=1")]);

		assert_eq!(
			url.query(),
			Some("v=2&code=a%2Bb+c&redirect_uri=app%3A%2F%2Fcb%3Fx%3D1")
		);
	}

	#[test]
	fn blank_endpoints_are_invalid_urls() {
		let err = parse_endpoint(Endpoint::TokenInfo, " ").expect_err("Blank endpoint must fail.");

		assert_eq!(err.code(), ErrorCode::InvalidUrl);
		assert_eq!(err.domain(), ErrorDomain::GetIdTokenInfo);
		assert!(parse_endpoint(Endpoint::TokenInfo, "not a url").is_err());
	}

	#[test]
	fn get_requests_disable_caching() {
		let url = Url::parse("https://idp.example.com/.well-known").expect("URL should parse.");
		let request = get_request(Endpoint::Discovery, &url).expect("Request should build.");

		assert_eq!(request.method(), Method::GET);
		assert_eq!(
			request.headers().get(CACHE_CONTROL).and_then(|value| value.to_str().ok()),
			Some("no-cache")
		);
	}
}
