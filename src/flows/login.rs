//! `login`: cache restore, refresh-on-login, and authorization request assembly.

// self
use crate::{
	_prelude::*,
	auth::{LoginSession, TokenSecret},
	clients::{AppLink, ServiceEndpoints},
	config::LoginConfig,
	flows::{AuthOrchestrator, FlowEvent, common},
	http::IdpHttpClient,
	oauth::{self, CallOptions, TransportErrorMapper},
	obs::FlowKind,
	security::PkceCodeChallengeMethod,
};

const DOMAIN: ErrorDomain = ErrorDomain::Authorization;

/// Result of a successful `login` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginOutcome {
	/// A valid access token was already held or restored from the cache; no network call was
	/// made.
	Cached,
	/// An expired access token was renewed with the refresh token.
	Refreshed,
	/// The user must authorize; present the request and pass the redirect to
	/// [`AuthOrchestrator::exchange_token`].
	AuthorizationRequired(AuthorizationRequest),
}

/// Authorization request the host presents to the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationRequest {
	/// Authorization endpoint URL carrying the full query.
	pub authorization_url: Url,
	/// Native app hand-off, when a scheme probe is installed and a registered app is present.
	pub app_link: Option<AppLink>,
}

impl<C, M> AuthOrchestrator<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Validates `config` and builds a session from it.
	pub fn load_login_session(&self, config: LoginConfig) -> Result<LoginSession> {
		config.into_session()
	}

	/// Logs `session` in using the configured call options.
	pub async fn login(&self, session: &mut LoginSession) -> Result<LoginOutcome> {
		let options = self.config.call_options();

		self.login_with(session, &options).await
	}

	/// Logs `session` in.
	///
	/// A valid access token, held in memory or restored from the cache, completes the call with
	/// [`LoginOutcome::Cached`] and no network traffic. An expired token with a refresh token
	/// is renewed once per the refresh policy; a failed refresh purges the cache and falls
	/// through. Otherwise endpoints are resolved (at most once per session), fresh security
	/// values are generated, and the authorization request is returned.
	pub async fn login_with(
		&self,
		session: &mut LoginSession,
		options: &CallOptions,
	) -> Result<LoginOutcome> {
		let result =
			common::observe(FlowKind::Login, "login", self.drive_login(session, options)).await;

		if result.is_err() {
			session.advance(FlowEvent::Failed);
		}

		result
	}

	async fn drive_login(
		&self,
		session: &mut LoginSession,
		options: &CallOptions,
	) -> Result<LoginOutcome> {
		let key = session.cache_key();
		let _guard = common::lock_flow(self, key.as_ref()).await;

		session.advance(FlowEvent::Begin);

		if session.access_token.as_ref().is_none_or(TokenSecret::is_empty) {
			if let Some(stored) = key.as_ref().and_then(|key| self.store.load(key)) {
				session.restore_from(stored);
			}
		}
		if session.has_valid_access_token_at(OffsetDateTime::now_utc()) {
			session.advance(FlowEvent::Restored);

			return Ok(LoginOutcome::Cached);
		}
		if self.refresh_on_login(session, key.as_ref(), options).await {
			return Ok(LoginOutcome::Refreshed);
		}

		let request = self.authorization_request(session, options).await?;

		Ok(LoginOutcome::AuthorizationRequired(request))
	}

	async fn authorization_request(
		&self,
		session: &mut LoginSession,
		options: &CallOptions,
	) -> Result<AuthorizationRequest> {
		let endpoints = match session.endpoints.clone() {
			Some(endpoints) => endpoints,
			None => {
				session.advance(FlowEvent::ResolveEndpoints);

				let endpoints =
					self.discovery_client().fetch(session.service_discovery_url(), options).await?;

				session.endpoints = Some(endpoints.clone());

				endpoints
			},
		};

		session.advance(FlowEvent::EndpointsResolved);

		let context = self.security.generate().map_err(|e| {
			Error::new(DOMAIN, ErrorCode::AuthorizationInitializationFailure).with_source(e)
		})?;

		session.apply_security_context(context);

		let device_id = self.config.device_id.as_deref().unwrap_or_default();
		let authorization_url = build_authorization_url(session, &endpoints.login_uri, device_id)?;
		let app_link =
			self.resolve_app_link(session, &endpoints, &authorization_url, options).await;

		session.advance(FlowEvent::AuthRequestReady);

		Ok(AuthorizationRequest { authorization_url, app_link })
	}

	/// App-link failures never fail the login; the request stays web-only.
	async fn resolve_app_link(
		&self,
		session: &LoginSession,
		endpoints: &ServiceEndpoints,
		authorization_url: &Url,
		options: &CallOptions,
	) -> Option<AppLink> {
		let probe = self.scheme_probe.as_deref()?;

		match self
			.app_link_client()
			.resolve(endpoints, session.client_id(), authorization_url, probe, options)
			.await
		{
			Ok(link) => Some(link),
			Err(e) => {
				#[cfg(feature = "tracing")]
				tracing::debug!(code = e.code().as_str(), "Continuing without an app link.");
				#[cfg(not(feature = "tracing"))]
				let _ = e;

				None
			},
		}
	}
}

/// Assembles the authorization URL from the session's security values and identity fields.
fn build_authorization_url(
	session: &LoginSession,
	authorization_endpoint: &str,
	device_id: &str,
) -> Result<Url> {
	if authorization_endpoint.trim().is_empty() {
		return Err(Error::new(DOMAIN, ErrorCode::InvalidUrl));
	}

	let base = Url::parse(authorization_endpoint).map_err(|e| {
		Error::new(DOMAIN, ErrorCode::InvalidUrl)
			.with_message(authorization_endpoint)
			.with_source(e)
	})?;
	let mut params = vec![
		("client_id", session.client_id().to_string()),
		("code_challenge", session.code_challenge().unwrap_or_default().to_owned()),
		("code_challenge_method", PkceCodeChallengeMethod::S256.as_str().to_owned()),
		("device_id", device_id.to_owned()),
		("nonce", session.nonce().unwrap_or_default().to_owned()),
		("redirect_uri", session.redirect_url().to_string()),
		("response_type", "code".to_owned()),
		("state", session.state().unwrap_or_default().to_owned()),
		("scope", session.scope().to_owned()),
	];

	for (key, value) in [
		("login_hint", session.hint()),
		("id_token_hint", session.id_token_hint()),
		("prompt", session.prompt()),
		("request", session.request()),
	] {
		if let Some(value) = value {
			params.push((key, value.to_owned()));
		}
	}
	if !session.acr_values().is_empty() {
		let acr_values = session
			.acr_values()
			.iter()
			.map(|(key, value)| format!("{key}:{value}"))
			.collect::<Vec<_>>()
			.join(" ");

		params.push(("acr_values", acr_values));
	}

	Ok(oauth::with_query(base, params))
}
