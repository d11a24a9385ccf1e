//! The login session: immutable client identity plus the state one authorization flow mutates.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, ScopeSet, TokenSecret},
	clients::ServiceEndpoints,
	flows::{FlowEvent, LoginPhase},
	security::SecurityContext,
	store::{CacheKey, SessionMetadata, StoredCredentials, TokenSet},
};

/// One login transaction and the credential set it produces.
///
/// Identity fields (`client_id`, `redirect_url`, `scope`, discovery URL, and the optional
/// authorization parameters) are fixed at construction. Everything else is written only by
/// [`AuthOrchestrator`](crate::flows::AuthOrchestrator) while it drives the flow, and is exposed
/// read-only here.
///
/// A session must not be handed to a second `login`/`exchange_token` call while a prior one is
/// still outstanding; the `&mut` receivers enforce this for a single value.
#[derive(Clone)]
pub struct LoginSession {
	client_id: ClientId,
	redirect_url: Url,
	scope: String,
	scopes: ScopeSet,
	service_discovery_url: String,
	request: Option<String>,
	acr_values: BTreeMap<String, String>,
	hint: Option<String>,
	id_token_hint: Option<String>,
	prompt: Option<String>,
	pub(crate) phase: LoginPhase,
	pub(crate) code: Option<String>,
	pub(crate) code_verifier: Option<String>,
	pub(crate) code_challenge: Option<String>,
	pub(crate) state: Option<String>,
	pub(crate) nonce: Option<String>,
	pub(crate) token_type: Option<String>,
	pub(crate) access_token: Option<TokenSecret>,
	pub(crate) id_token: Option<TokenSecret>,
	pub(crate) refresh_token: Option<TokenSecret>,
	pub(crate) access_token_expires_at: Option<OffsetDateTime>,
	pub(crate) endpoints: Option<ServiceEndpoints>,
}
impl LoginSession {
	/// Starts a builder for a session with the required identity fields.
	pub fn builder(
		client_id: impl Into<String>,
		redirect_url: impl Into<String>,
		scope: impl Into<String>,
		service_discovery_url: impl Into<String>,
	) -> LoginSessionBuilder {
		LoginSessionBuilder {
			client_id: client_id.into(),
			redirect_url: redirect_url.into(),
			scope: scope.into(),
			service_discovery_url: service_discovery_url.into(),
			request: None,
			acr_values: BTreeMap::new(),
			hint: None,
			id_token_hint: None,
			prompt: None,
		}
	}

	/// OAuth client identifier.
	pub fn client_id(&self) -> &ClientId {
		&self.client_id
	}

	/// Redirect URL registered for the client.
	pub fn redirect_url(&self) -> &Url {
		&self.redirect_url
	}

	/// Requested scope exactly as supplied by the application.
	pub fn scope(&self) -> &str {
		&self.scope
	}

	/// Normalized scope identity.
	pub fn scopes(&self) -> &ScopeSet {
		&self.scopes
	}

	/// Discovery document URL.
	pub fn service_discovery_url(&self) -> &str {
		&self.service_discovery_url
	}

	/// Opaque signed request object, if any.
	pub fn request(&self) -> Option<&str> {
		self.request.as_deref()
	}

	/// Authentication context class references.
	pub fn acr_values(&self) -> &BTreeMap<String, String> {
		&self.acr_values
	}

	/// Login hint forwarded as `login_hint`.
	pub fn hint(&self) -> Option<&str> {
		self.hint.as_deref()
	}

	/// ID token hint forwarded as `id_token_hint`.
	pub fn id_token_hint(&self) -> Option<&str> {
		self.id_token_hint.as_deref()
	}

	/// Prompt value forwarded as `prompt`.
	pub fn prompt(&self) -> Option<&str> {
		self.prompt.as_deref()
	}

	/// Current flow phase.
	pub fn phase(&self) -> LoginPhase {
		self.phase
	}

	/// Authorization code received by the last accepted redirect.
	pub fn code(&self) -> Option<&str> {
		self.code.as_deref()
	}

	/// PKCE verifier of the current authorization attempt.
	pub fn code_verifier(&self) -> Option<&str> {
		self.code_verifier.as_deref()
	}

	/// PKCE challenge of the current authorization attempt.
	pub fn code_challenge(&self) -> Option<&str> {
		self.code_challenge.as_deref()
	}

	/// Anti-CSRF state of the current authorization attempt.
	pub fn state(&self) -> Option<&str> {
		self.state.as_deref()
	}

	/// Anti-replay nonce of the current authorization attempt.
	pub fn nonce(&self) -> Option<&str> {
		self.nonce.as_deref()
	}

	/// Token type reported by the token endpoint.
	pub fn token_type(&self) -> Option<&str> {
		self.token_type.as_deref()
	}

	/// Access token, if the session is authenticated.
	pub fn access_token(&self) -> Option<&TokenSecret> {
		self.access_token.as_ref()
	}

	/// ID token, if one was issued.
	pub fn id_token(&self) -> Option<&TokenSecret> {
		self.id_token.as_ref()
	}

	/// Refresh token, if one was issued.
	pub fn refresh_token(&self) -> Option<&TokenSecret> {
		self.refresh_token.as_ref()
	}

	/// Instant the access token expires.
	pub fn access_token_expires_at(&self) -> Option<OffsetDateTime> {
		self.access_token_expires_at
	}

	/// Resolved provider endpoints.
	pub fn endpoints(&self) -> Option<&ServiceEndpoints> {
		self.endpoints.as_ref()
	}

	/// Cache identity for the persisted credential set; `None` disables caching.
	pub fn cache_key(&self) -> Option<CacheKey> {
		CacheKey::new(&self.client_id, &self.scopes)
	}

	/// Returns true when the access token is non-empty and expires after `now`.
	pub fn has_valid_access_token_at(&self, now: OffsetDateTime) -> bool {
		let has_token = self.access_token.as_ref().is_some_and(|token| !token.is_empty());

		has_token && self.access_token_expires_at.is_some_and(|expires_at| expires_at > now)
	}

	pub(crate) fn advance(&mut self, event: FlowEvent) {
		self.phase = self.phase.on(event);
	}

	pub(crate) fn apply_security_context(&mut self, context: SecurityContext) {
		let SecurityContext { nonce, state, code_verifier, code_challenge } = context;

		self.code = None;
		self.nonce = Some(nonce);
		self.state = Some(state);
		self.code_verifier = Some(code_verifier);
		self.code_challenge = Some(code_challenge);
	}

	pub(crate) fn clear_tokens(&mut self) {
		self.token_type = None;
		self.access_token = None;
		self.id_token = None;
		self.refresh_token = None;
		self.access_token_expires_at = None;
	}

	/// Builds the persisted form of the session; `None` when there is no access token to keep.
	pub(crate) fn to_stored(&self) -> Option<StoredCredentials> {
		let access_token = self.access_token.clone().filter(|token| !token.is_empty())?;
		let endpoints = self.endpoints.clone().unwrap_or_default();

		Some(StoredCredentials {
			tokens: TokenSet {
				access_token,
				id_token: self.id_token.clone(),
				refresh_token: self.refresh_token.clone(),
			},
			metadata: SessionMetadata {
				code: self.code.clone(),
				code_verifier: self.code_verifier.clone(),
				state: self.state.clone(),
				nonce: self.nonce.clone(),
				token_type: self.token_type.clone(),
				access_token_expires_at: self.access_token_expires_at,
				service_discovery_url: self.service_discovery_url.clone(),
				authorization_endpoint: endpoints.login_uri,
				token_endpoint: endpoints.exchange_uri,
				id_token_verification_endpoint: endpoints.verify_uri,
				client_public_info_endpoint: endpoints.client_public_info_uri,
			},
		})
	}

	/// Copies a restored credential set into the session; identity fields are never touched.
	pub(crate) fn restore_from(&mut self, stored: StoredCredentials) {
		let StoredCredentials { tokens, metadata } = stored;

		self.access_token = Some(tokens.access_token);
		self.id_token = tokens.id_token;
		self.refresh_token = tokens.refresh_token;
		self.code = metadata.code;
		self.code_verifier = metadata.code_verifier;
		self.code_challenge = None;
		self.state = metadata.state;
		self.nonce = metadata.nonce;
		self.token_type = metadata.token_type;
		self.access_token_expires_at = metadata.access_token_expires_at;
		self.endpoints = Some(ServiceEndpoints {
			login_uri: metadata.authorization_endpoint,
			exchange_uri: metadata.token_endpoint,
			verify_uri: metadata.id_token_verification_endpoint,
			client_public_info_uri: metadata.client_public_info_endpoint,
		})
		.filter(|endpoints| *endpoints != ServiceEndpoints::default());
	}
}
impl Debug for LoginSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginSession")
			.field("client_id", &self.client_id)
			.field("redirect_url", &self.redirect_url.as_str())
			.field("scope", &self.scope)
			.field("service_discovery_url", &self.service_discovery_url)
			.field("phase", &self.phase)
			.field("state", &self.state)
			.field("nonce", &self.nonce)
			.field("code_verifier_set", &self.code_verifier.is_some())
			.field("access_token", &self.access_token)
			.field("id_token", &self.id_token)
			.field("refresh_token", &self.refresh_token)
			.field("access_token_expires_at", &self.access_token_expires_at)
			.field("endpoints", &self.endpoints)
			.finish()
	}
}

/// Builder for [`LoginSession`] that validates identity fields.
#[derive(Clone, Debug)]
pub struct LoginSessionBuilder {
	client_id: String,
	redirect_url: String,
	scope: String,
	service_discovery_url: String,
	request: Option<String>,
	acr_values: BTreeMap<String, String>,
	hint: Option<String>,
	id_token_hint: Option<String>,
	prompt: Option<String>,
}
impl LoginSessionBuilder {
	/// Sets the opaque signed request object.
	pub fn request(mut self, request: impl Into<String>) -> Self {
		self.request = Some(request.into());

		self
	}

	/// Adds one `acr_values` entry.
	pub fn acr_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.acr_values.insert(key.into(), value.into());

		self
	}

	/// Replaces all `acr_values` entries.
	pub fn acr_values(mut self, values: BTreeMap<String, String>) -> Self {
		self.acr_values = values;

		self
	}

	/// Sets the login hint.
	pub fn hint(mut self, hint: impl Into<String>) -> Self {
		self.hint = Some(hint.into());

		self
	}

	/// Sets the ID token hint.
	pub fn id_token_hint(mut self, hint: impl Into<String>) -> Self {
		self.id_token_hint = Some(hint.into());

		self
	}

	/// Sets the prompt value.
	pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
		self.prompt = Some(prompt.into());

		self
	}

	/// Validates the identity fields and builds the session.
	///
	/// The client id is checked first, then the redirect URL, then the scope string.
	pub fn build(self) -> Result<LoginSession> {
		const DOMAIN: ErrorDomain = ErrorDomain::LoadConfiguration;

		let client_id = ClientId::new(&self.client_id).map_err(|e| {
			Error::new(DOMAIN, ErrorCode::InvalidClientId).with_source(e)
		})?;
		let redirect_url = Url::parse(&self.redirect_url).map_err(|e| {
			Error::new(DOMAIN, ErrorCode::InvalidRedirectUrl).with_source(e)
		})?;
		let scopes = ScopeSet::from_str(&self.scope)
			.map_err(|e| Error::new(DOMAIN, ErrorCode::InvalidScope).with_source(e))?;

		Ok(LoginSession {
			client_id,
			redirect_url,
			scope: self.scope,
			scopes,
			service_discovery_url: self.service_discovery_url,
			request: self.request.filter(|value| !value.is_empty()),
			acr_values: self.acr_values,
			hint: self.hint.filter(|value| !value.is_empty()),
			id_token_hint: self.id_token_hint.filter(|value| !value.is_empty()),
			prompt: self.prompt.filter(|value| !value.is_empty()),
			phase: LoginPhase::Idle,
			code: None,
			code_verifier: None,
			code_challenge: None,
			state: None,
			nonce: None,
			token_type: None,
			access_token: None,
			id_token: None,
			refresh_token: None,
			access_token_expires_at: None,
			endpoints: None,
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn session(scope: &str) -> LoginSession {
		LoginSession::builder(
			"partner-client",
			"partner://callback",
			scope,
			"https://idp.example.com/.well-known/openid-configuration",
		)
		.build()
		.expect("Session fixture should build.")
	}

	#[test]
	fn builder_reports_first_invalid_field() {
		let err = LoginSession::builder("", "not a url", "", "")
			.build()
			.expect_err("Empty client id must be rejected.");

		assert_eq!(err.domain(), ErrorDomain::LoadConfiguration);
		assert_eq!(err.code(), ErrorCode::InvalidClientId);

		let err = LoginSession::builder("client", "not a url", "openid", "")
			.build()
			.expect_err("Malformed redirect URL must be rejected.");

		assert_eq!(err.code(), ErrorCode::InvalidRedirectUrl);

		let err = LoginSession::builder("client", "app://cb", "   ", "")
			.build()
			.expect_err("Whitespace-only scope must be rejected.");

		assert_eq!(err.code(), ErrorCode::InvalidScope);
	}

	#[test]
	fn cache_key_ignores_scope_case_and_order() {
		let lhs = session("openid Profile").cache_key().expect("Scoped session should cache.");
		let rhs = session("profile OPENID").cache_key().expect("Scoped session should cache.");

		assert_eq!(lhs, rhs);
		assert_eq!(lhs.to_string(), "partner-client.openid profile");
		assert!(session("").cache_key().is_none(), "Empty scope must disable caching.");
	}

	#[test]
	fn access_token_validity_requires_token_and_future_expiry() {
		let now = OffsetDateTime::now_utc();
		let mut session = session("openid");

		assert!(!session.has_valid_access_token_at(now));

		session.access_token = Some(TokenSecret::new("access"));
		session.access_token_expires_at = Some(now + Duration::minutes(5));

		assert!(session.has_valid_access_token_at(now));

		session.access_token_expires_at = Some(now);

		assert!(!session.has_valid_access_token_at(now), "Expiry equal to now is expired.");

		session.access_token = Some(TokenSecret::new(""));
		session.access_token_expires_at = Some(now + Duration::minutes(5));

		assert!(!session.has_valid_access_token_at(now));
	}

	#[test]
	fn stored_round_trip_preserves_flow_fields_but_not_challenge() {
		let now = OffsetDateTime::now_utc();
		let mut source = session("openid");

		source.apply_security_context(SecurityContext {
			nonce: "nonce-1".into(),
			state: "state-1".into(),
			code_verifier: "verifier-1".into(),
			code_challenge: "challenge-1".into(),
		});
		source.access_token = Some(TokenSecret::new("access"));
		source.refresh_token = Some(TokenSecret::new("refresh"));
		source.access_token_expires_at = Some(now + Duration::hours(1));
		source.endpoints = Some(ServiceEndpoints {
			login_uri: "https://idp/authorize".into(),
			exchange_uri: "https://idp/token".into(),
			verify_uri: "https://idp/tokeninfo".into(),
			client_public_info_uri: "https://idp/public".into(),
		});

		let stored = source.to_stored().expect("Authenticated session should be storable.");
		let mut restored = session("openid");

		restored.restore_from(stored);

		assert_eq!(restored.nonce(), Some("nonce-1"));
		assert_eq!(restored.state(), Some("state-1"));
		assert_eq!(restored.code_verifier(), Some("verifier-1"));
		assert_eq!(restored.code_challenge(), None);
		assert_eq!(restored.refresh_token().map(TokenSecret::expose), Some("refresh"));
		assert_eq!(restored.endpoints(), source.endpoints());
		assert!(restored.has_valid_access_token_at(now));
	}

	#[test]
	fn sessions_without_access_tokens_are_not_stored() {
		assert!(session("openid").to_stored().is_none());
	}
}
