//! Crate-level error types shared across clients, stores, and flows.
//!
//! Every public operation fails with one [`Error`] that pairs an [`ErrorDomain`] (which
//! operation failed) with an [`ErrorCode`] (why it failed). Callers branch on those two values;
//! the optional message and wrapped source exist for diagnostics only.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error used for wrapped transport and service failures.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Operation family that produced an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorDomain {
	/// Building a login session from configuration input.
	LoadConfiguration,
	/// Preparing or presenting the authorization request.
	Authorization,
	/// Exchanging an authorization code or refresh token.
	ExchangeToken,
	/// Verifying an ID token through the token-info endpoint.
	GetIdTokenInfo,
	/// Logging a session out.
	Logout,
	/// Resolving provider endpoints from the discovery document.
	ServiceDiscovery,
	/// Calling a protected resource; reserved for host applications.
	ProtectedResource,
	/// Resolving native app links from the client public info endpoint.
	AppLink,
}
impl ErrorDomain {
	/// Returns a stable label suitable for logs or telemetry.
	pub const fn as_str(self) -> &'static str {
		match self {
			ErrorDomain::LoadConfiguration => "load_configuration",
			ErrorDomain::Authorization => "authorization",
			ErrorDomain::ExchangeToken => "exchange_token",
			ErrorDomain::GetIdTokenInfo => "get_id_token_info",
			ErrorDomain::Logout => "logout",
			ErrorDomain::ServiceDiscovery => "service_discovery",
			ErrorDomain::ProtectedResource => "protected_resource",
			ErrorDomain::AppLink => "app_link",
		}
	}
}
impl Display for ErrorDomain {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Machine-checkable failure reason carried by every [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
	/// Identity service returned an unusable answer.
	ServiceFailed,
	/// Discovery (or client public info) endpoint answered with a non-2xx status.
	DiscoveryServiceFailed,
	/// Token-info endpoint failed.
	IdTokenInfoServiceFailed,
	/// Token endpoint answered with a non-2xx status.
	ExchangeTokenServiceFailed,
	/// Security values for the authorization request could not be generated.
	AuthorizationInitializationFailure,
	/// Redirect callback failed the state/code checks or carried a provider error.
	SecurityValidationFailed,
	/// Nothing was cached for the session being logged out.
	LogoutFailed,
	/// Session has no ID token or no verification endpoint.
	InvalidIdToken,
	/// Nonce is missing or does not match the session nonce.
	InvalidNonce,
	/// Configuration input could not be read.
	InvalidConfiguration,
	/// Client identifier is missing or malformed.
	InvalidClientId,
	/// Scope is missing or malformed.
	InvalidScope,
	/// Redirect URL is missing or malformed.
	InvalidRedirectUrl,
	/// Discovery URL is missing.
	InvalidServiceDiscoveryUrl,
	/// Authorization code is missing or malformed.
	InvalidAuthorizationCode,
	/// A URL could not be parsed or an endpoint is missing.
	InvalidUrl,
	/// Access token is missing or expired.
	InvalidAccessToken,
	/// Response body is malformed or lacks required fields.
	InvalidResponse,
	/// Transport-level failure while talking to the identity service.
	ServiceError,
	/// Network is unreachable.
	Network,
	/// Platform random source is unavailable.
	CryptoUnavailable,
	/// Per-call deadline elapsed before the response arrived.
	Timeout,
	/// Caller cancelled the operation.
	Cancelled,
	/// Unclassified failure.
	SomethingWentWrong,
	/// Protected resource rejected the access token.
	UnAuthorized,
	/// Authorization failed for an unspecified reason.
	AuthorizationFailed,
	/// Identity service is temporarily unavailable.
	ServiceUnavailable,
	/// Partner identifier is missing or malformed.
	InvalidPartnerId,
	/// No app-link descriptor matched an installed application.
	NoAppLinkAvailable,
}
impl ErrorCode {
	/// Returns a stable label suitable for logs or telemetry.
	pub const fn as_str(self) -> &'static str {
		match self {
			ErrorCode::ServiceFailed => "ServiceFailed",
			ErrorCode::DiscoveryServiceFailed => "DiscoveryServiceFailed",
			ErrorCode::IdTokenInfoServiceFailed => "IdTokenInfoServiceFailed",
			ErrorCode::ExchangeTokenServiceFailed => "ExchangeTokenServiceFailed",
			ErrorCode::AuthorizationInitializationFailure => "AuthorizationInitializationFailure",
			ErrorCode::SecurityValidationFailed => "SecurityValidationFailed",
			ErrorCode::LogoutFailed => "LogoutFailed",
			ErrorCode::InvalidIdToken => "InvalidIdToken",
			ErrorCode::InvalidNonce => "InvalidNonce",
			ErrorCode::InvalidConfiguration => "InvalidConfiguration",
			ErrorCode::InvalidClientId => "InvalidClientId",
			ErrorCode::InvalidScope => "InvalidScope",
			ErrorCode::InvalidRedirectUrl => "InvalidRedirectUrl",
			ErrorCode::InvalidServiceDiscoveryUrl => "InvalidServiceDiscoveryUrl",
			ErrorCode::InvalidAuthorizationCode => "InvalidAuthorizationCode",
			ErrorCode::InvalidUrl => "InvalidUrl",
			ErrorCode::InvalidAccessToken => "InvalidAccessToken",
			ErrorCode::InvalidResponse => "InvalidResponse",
			ErrorCode::ServiceError => "ServiceError",
			ErrorCode::Network => "Network",
			ErrorCode::CryptoUnavailable => "CryptoUnavailable",
			ErrorCode::Timeout => "Timeout",
			ErrorCode::Cancelled => "Cancelled",
			ErrorCode::SomethingWentWrong => "SomethingWentWrong",
			ErrorCode::UnAuthorized => "UnAuthorized",
			ErrorCode::AuthorizationFailed => "AuthorizationFailed",
			ErrorCode::ServiceUnavailable => "ServiceUnavailable",
			ErrorCode::InvalidPartnerId => "InvalidPartnerId",
			ErrorCode::NoAppLinkAvailable => "NoAppLinkAvailable",
		}
	}

	/// Default human-readable message used when no explicit message is attached.
	pub const fn default_message(self) -> &'static str {
		match self {
			ErrorCode::ServiceFailed
			| ErrorCode::DiscoveryServiceFailed
			| ErrorCode::ExchangeTokenServiceFailed
			| ErrorCode::ServiceError => "Identity service error.",
			ErrorCode::IdTokenInfoServiceFailed | ErrorCode::InvalidResponse =>
				"Invalid response from the identity service.",
			ErrorCode::AuthorizationInitializationFailure => "Authorization initialization failed.",
			ErrorCode::SecurityValidationFailed => "Security validation failed.",
			ErrorCode::LogoutFailed => "Logout failed.",
			ErrorCode::InvalidIdToken => "Invalid idToken.",
			ErrorCode::InvalidNonce => "Invalid Nonce.",
			ErrorCode::InvalidConfiguration => "Configuration error.",
			ErrorCode::InvalidClientId => "Invalid client id.",
			ErrorCode::InvalidScope => "Invalid scope.",
			ErrorCode::InvalidRedirectUrl => "Invalid redirect url.",
			ErrorCode::InvalidServiceDiscoveryUrl => "Invalid service discovery url.",
			ErrorCode::InvalidAuthorizationCode => "Invalid authorization code.",
			ErrorCode::InvalidUrl => "Invalid Url.",
			ErrorCode::InvalidAccessToken => "Invalid access token.",
			ErrorCode::Network => "Network unavailable.",
			ErrorCode::CryptoUnavailable => "Secure random source unavailable.",
			ErrorCode::Timeout => "Request timed out.",
			ErrorCode::Cancelled => "Request cancelled.",
			ErrorCode::SomethingWentWrong => "Something went wrong.",
			ErrorCode::UnAuthorized => "Unauthorized.",
			ErrorCode::AuthorizationFailed => "Authorization failed.",
			ErrorCode::ServiceUnavailable => "Identity service unavailable.",
			ErrorCode::InvalidPartnerId => "Invalid partner id.",
			ErrorCode::NoAppLinkAvailable => "No app link available.",
		}
	}
}
impl Display for ErrorCode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
#[error("{domain}: {code}: {}", describe(.message, .code))]
pub struct Error {
	domain: ErrorDomain,
	code: ErrorCode,
	message: Option<String>,
	status: Option<u16>,
	#[source]
	source: Option<BoxError>,
}
impl Error {
	/// Creates an error for the given domain + code without further detail.
	pub fn new(domain: ErrorDomain, code: ErrorCode) -> Self {
		Self { domain, code, message: None, status: None, source: None }
	}

	/// Attaches a human-readable message.
	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = Some(message.into());

		self
	}

	/// Attaches the HTTP status returned by the identity service.
	pub fn with_status(mut self, status: u16) -> Self {
		self.status = Some(status);

		self
	}

	/// Wraps the underlying transport or service failure.
	pub fn with_source(mut self, source: impl 'static + Send + Sync + StdError) -> Self {
		self.source = Some(Box::new(source));

		self
	}

	/// Operation family that failed.
	pub fn domain(&self) -> ErrorDomain {
		self.domain
	}

	/// Machine-checkable failure reason.
	pub fn code(&self) -> ErrorCode {
		self.code
	}

	/// Attached message, falling back to the code's default message.
	pub fn message(&self) -> &str {
		self.message.as_deref().unwrap_or(self.code.default_message())
	}

	/// HTTP status code, when the failure came from a non-2xx response.
	pub fn status(&self) -> Option<u16> {
		self.status
	}

	/// Returns true for failures caused by the network or the identity service (as opposed to
	/// local validation), which trigger the fail-closed cache purge.
	pub fn is_service_failure(&self) -> bool {
		matches!(
			self.code,
			ErrorCode::ServiceFailed
				| ErrorCode::DiscoveryServiceFailed
				| ErrorCode::IdTokenInfoServiceFailed
				| ErrorCode::ExchangeTokenServiceFailed
				| ErrorCode::ServiceError
				| ErrorCode::Network
				| ErrorCode::Timeout
				| ErrorCode::Cancelled
				| ErrorCode::InvalidResponse
				| ErrorCode::ServiceUnavailable
		)
	}
}

/// Transport-level failures (network, IO) wrapped as an [`Error`] source.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the identity service.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the identity service.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

fn describe<'a>(message: &'a Option<String>, code: &ErrorCode) -> &'a str {
	message.as_deref().unwrap_or(code.default_message())
}
