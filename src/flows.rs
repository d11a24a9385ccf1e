//! Login orchestration: cache restore, discovery, authorization requests, code exchange,
//! refresh-on-login, logout, and ID token verification.

pub mod exchange;
pub mod id_token;
pub mod login;
pub mod logout;
pub mod refresh;
pub mod state;

mod common;

pub use exchange::*;
pub use login::*;
pub use refresh::RefreshMetrics;
pub use state::*;

// self
use crate::{
	_prelude::*,
	clients::{AppLinkClient, DiscoveryClient, SchemeProbe, TokenExchangeClient, TokenInfoClient},
	config::OrchestratorConfig,
	http::IdpHttpClient,
	oauth::{ApiFacade, TransportErrorMapper},
	security::{RandomSource, SecurityContextGenerator},
	store::{CacheKey, SecureTokenStore},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Orchestrator specialized for the crate's default reqwest transport stack.
pub type ReqwestOrchestrator = AuthOrchestrator<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Drives login sessions against a discoverable identity provider.
///
/// The orchestrator owns the HTTP client, credential cache, and security value generator; all
/// per-login state lives on the [`LoginSession`](crate::auth::LoginSession) passed to each
/// operation, so one orchestrator may serve many sessions concurrently. Operations that touch
/// the cache hold an async guard keyed by the session's [`CacheKey`], so sessions that share a
/// credential set never interleave store writes.
pub struct AuthOrchestrator<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// HTTP client wrapper used for every outbound identity-service request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Credential cache shared by every session.
	pub store: SecureTokenStore,
	/// Orchestrator-wide settings.
	pub config: OrchestratorConfig,
	/// Shared metrics recorder for refresh outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	security: SecurityContextGenerator,
	scheme_probe: Option<Arc<dyn SchemeProbe>>,
	flow_guards: Arc<Mutex<HashMap<CacheKey, Arc<AsyncMutex<()>>>>>,
}
impl<C, M> AuthOrchestrator<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an orchestrator that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		store: SecureTokenStore,
		config: OrchestratorConfig,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			store,
			config,
			refresh_metrics: Default::default(),
			security: SecurityContextGenerator::default(),
			scheme_probe: None,
			flow_guards: Default::default(),
		}
	}

	/// Replaces the random source used for nonce, state, and PKCE generation.
	pub fn with_random_source(mut self, random: Arc<dyn RandomSource>) -> Self {
		self.security = SecurityContextGenerator::new(random);

		self
	}

	/// Installs the host's scheme probe, enabling native app hand-off during `login`.
	pub fn with_scheme_probe(mut self, probe: Arc<dyn SchemeProbe>) -> Self {
		self.scheme_probe = Some(probe);

		self
	}

	fn facade(&self) -> ApiFacade<C, M> {
		ApiFacade::new(Arc::clone(&self.http_client), Arc::clone(&self.transport_mapper))
	}

	fn discovery_client(&self) -> DiscoveryClient<C, M> {
		DiscoveryClient::new(self.facade(), self.config.client_public_info_fallback.as_str())
	}

	fn exchange_client(&self) -> TokenExchangeClient<C, M> {
		TokenExchangeClient::new(self.facade())
	}

	fn token_info_client(&self) -> TokenInfoClient<C, M> {
		TokenInfoClient::new(self.facade())
	}

	fn app_link_client(&self) -> AppLinkClient<C, M> {
		AppLinkClient::new(self.facade())
	}
}
#[cfg(feature = "reqwest")]
impl AuthOrchestrator<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates an orchestrator with its own reqwest-backed transport (redirects disabled).
	pub fn new(store: SecureTokenStore, config: OrchestratorConfig) -> Result<Self> {
		let http_client = ReqwestHttpClient::new().map_err(|e| {
			Error::new(ErrorDomain::LoadConfiguration, ErrorCode::InvalidConfiguration)
				.with_message("Failed to build the HTTP client.")
				.with_source(e)
		})?;

		Ok(Self::with_http_client(store, config, http_client, ReqwestTransportErrorMapper))
	}
}
impl<C, M> Clone for AuthOrchestrator<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http_client: Arc::clone(&self.http_client),
			transport_mapper: Arc::clone(&self.transport_mapper),
			store: self.store.clone(),
			config: self.config.clone(),
			refresh_metrics: Arc::clone(&self.refresh_metrics),
			security: self.security.clone(),
			scheme_probe: self.scheme_probe.clone(),
			flow_guards: Arc::clone(&self.flow_guards),
		}
	}
}
impl<C, M> Debug for AuthOrchestrator<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthOrchestrator")
			.field("config", &self.config)
			.field("scheme_probe_set", &self.scheme_probe.is_some())
			.finish()
	}
}
