//! Refresh-on-login.
//!
//! When `login` finds an expired access token alongside a refresh token and a token endpoint,
//! it presents a `refresh_token` grant before falling back to interactive login. Attempts are
//! bounded by [`RefreshPolicy`](crate::config::RefreshPolicy) with no backoff; a failure purges
//! the cached credential set so the next restore cannot resurrect it.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::LoginSession,
	clients::{TokenGrant, TokenResult},
	flows::{AuthOrchestrator, FlowEvent, common},
	http::IdpHttpClient,
	oauth::{CallOptions, TransportErrorMapper},
	obs::{self, FlowKind},
	store::CacheKey,
};

const KIND: FlowKind = FlowKind::Refresh;

impl<C, M> AuthOrchestrator<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Returns true when the session holds a fresh access token afterwards.
	pub(super) async fn refresh_on_login(
		&self,
		session: &mut LoginSession,
		key: Option<&CacheKey>,
		options: &CallOptions,
	) -> bool {
		let Some((token_endpoint, grant)) = self.refresh_grant(session) else {
			return false;
		};
		let result = common::observe(
			KIND,
			"refresh_on_login",
			self.run_refresh(session, &token_endpoint, &grant, options),
		)
		.await;

		match result {
			Ok(()) => {
				if let (Some(key), Some(stored)) = (key, session.to_stored()) {
					// Store failures roll themselves back; the refreshed session stays usable.
					let _ = self.store.save(key, &stored);
				}

				true
			},
			Err(e) => {
				if let Some(key) = key {
					self.store.purge(key);
				}

				session.clear_tokens();
				obs::record_fallback(KIND, &e);

				false
			},
		}
	}

	fn refresh_grant(&self, session: &LoginSession) -> Option<(String, TokenGrant)> {
		let policy = self.config.refresh;

		if !policy.enabled || policy.max_attempts == 0 {
			return None;
		}

		let refresh_token = session.refresh_token.clone().filter(|token| !token.is_empty())?;
		let token_endpoint = session
			.endpoints
			.as_ref()
			.map(|endpoints| endpoints.exchange_uri.clone())
			.filter(|uri| !uri.trim().is_empty())?;

		Some((token_endpoint, TokenGrant::RefreshToken { refresh_token }))
	}

	async fn run_refresh(
		&self,
		session: &mut LoginSession,
		token_endpoint: &str,
		grant: &TokenGrant,
		options: &CallOptions,
	) -> Result<()> {
		let client = self.exchange_client();
		let mut attempt = 1;

		loop {
			self.refresh_metrics.record_attempt();
			session.advance(FlowEvent::RefreshStarted);

			match client.exchange(token_endpoint, session.client_id(), grant, options).await {
				Ok(result) => {
					self.refresh_metrics.record_success();
					apply_refresh(session, result);
					session.advance(FlowEvent::RefreshSucceeded);

					return Ok(());
				},
				Err(e) => {
					self.refresh_metrics.record_failure();
					session.advance(FlowEvent::RefreshFailed);

					let exhausted = attempt >= self.config.refresh.max_attempts;

					if exhausted || e.code() == ErrorCode::Cancelled {
						return Err(e);
					}

					attempt += 1;
				},
			}
		}
	}
}

/// Replaces the access token and expiry; other tokens are kept unless the provider rotated them.
fn apply_refresh(session: &mut LoginSession, result: TokenResult) {
	let TokenResult { access_token, token_type, expires_at, id_token, refresh_token } = result;

	session.access_token = Some(access_token);
	session.access_token_expires_at = Some(expires_at);

	if token_type.is_some() {
		session.token_type = token_type;
	}
	if id_token.is_some() {
		session.id_token = id_token;
	}
	if refresh_token.is_some() {
		session.refresh_token = refresh_token;
	}
}
