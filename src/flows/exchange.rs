//! `exchange_token`: redirect validation and the authorization-code grant.

// self
use crate::{
	_prelude::*,
	auth::LoginSession,
	clients::{TokenGrant, TokenResult},
	flows::{AuthOrchestrator, FlowEvent, common},
	http::IdpHttpClient,
	oauth::{CallOptions, TransportErrorMapper},
	obs::{self, FlowKind},
	store::{CacheKey, StoredCredentials},
};

const DOMAIN: ErrorDomain = ErrorDomain::ExchangeToken;

/// Result of a successful `exchange_token` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeOutcome {
	/// A still-valid credential set was restored from the cache; no network call was made.
	Cached,
	/// The authorization code was exchanged and the new credential set persisted.
	Exchanged,
}

/// Values read from the redirect query.
#[derive(Debug, PartialEq, Eq)]
struct Callback {
	code: String,
}

impl<C, M> AuthOrchestrator<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Completes `session` from the redirect URL using the configured call options.
	pub async fn exchange_token(
		&self,
		session: &mut LoginSession,
		redirect_url: &str,
	) -> Result<ExchangeOutcome> {
		let options = self.config.call_options();

		self.exchange_token_with(session, redirect_url, &options).await
	}

	/// Completes `session` from the redirect URL.
	///
	/// The redirect must carry no `error`, a `code`, and a `state` equal to the session's;
	/// otherwise the call fails with `SecurityValidationFailed` before any network call and the
	/// session's tokens are left untouched. A still-valid cached credential set then short-cuts
	/// the exchange. Any later failure purges the cached credential set.
	pub async fn exchange_token_with(
		&self,
		session: &mut LoginSession,
		redirect_url: &str,
		options: &CallOptions,
	) -> Result<ExchangeOutcome> {
		let result = common::observe(
			FlowKind::ExchangeToken,
			"exchange_token",
			self.drive_exchange(session, redirect_url, options),
		)
		.await;

		if result.is_err() {
			session.advance(FlowEvent::Failed);
		}

		result
	}

	async fn drive_exchange(
		&self,
		session: &mut LoginSession,
		redirect_url: &str,
		options: &CallOptions,
	) -> Result<ExchangeOutcome> {
		let callback = verify_callback(redirect_url, session.state())?;

		session.advance(FlowEvent::CallbackVerified);

		let key = session.cache_key();
		let _guard = common::lock_flow(self, key.as_ref()).await;

		if let Some(stored) = key.as_ref().and_then(|key| self.store.load(key)) {
			if still_valid(&stored, OffsetDateTime::now_utc()) {
				session.restore_from(stored);
				session.advance(FlowEvent::Restored);

				return Ok(ExchangeOutcome::Cached);
			}
		}

		session.code = Some(callback.code.clone());

		match self.exchange_code(session, callback, options).await {
			Ok(result) => {
				apply_exchange(session, result);
				session.advance(FlowEvent::CodeExchanged);
				self.persist(session, key.as_ref());

				Ok(ExchangeOutcome::Exchanged)
			},
			Err(e) => {
				if let Some(key) = &key {
					self.store.purge(key);
					obs::record_purge(FlowKind::ExchangeToken, "exchange_failed");
				}

				Err(e)
			},
		}
	}

	async fn exchange_code(
		&self,
		session: &LoginSession,
		callback: Callback,
		options: &CallOptions,
	) -> Result<TokenResult> {
		let token_endpoint = session
			.endpoints()
			.map(|endpoints| endpoints.exchange_uri.as_str())
			.filter(|uri| !uri.trim().is_empty())
			.ok_or_else(|| {
				Error::new(DOMAIN, ErrorCode::InvalidUrl)
					.with_message("Session has no token endpoint.")
			})?;
		let grant = code_grant(session, callback)?;

		self.exchange_client().exchange(token_endpoint, session.client_id(), &grant, options).await
	}

	/// Saves the session; a failed save has already been rolled back by the store.
	fn persist(&self, session: &LoginSession, key: Option<&CacheKey>) {
		if let (Some(key), Some(stored)) = (key, session.to_stored()) {
			let _ = self.store.save(key, &stored);
		}
	}
}

/// Checks the redirect query against the session's anti-CSRF state.
fn verify_callback(redirect_url: &str, expected_state: Option<&str>) -> Result<Callback> {
	let rejected = |reason: &'static str| {
		Error::new(DOMAIN, ErrorCode::SecurityValidationFailed).with_message(reason)
	};
	let url = Url::parse(redirect_url).map_err(|_| rejected("Redirect URL is malformed."))?;
	let mut code = None;
	let mut error = None;
	let mut state = None;

	for (key, value) in url.query_pairs() {
		let slot = match &*key {
			"code" => &mut code,
			"error" => &mut error,
			"state" => &mut state,
			_ => continue,
		};

		if slot.is_none() {
			*slot = Some(value.into_owned());
		}
	}

	if error.is_some() {
		return Err(rejected("Identity provider returned an error."));
	}

	let code = code.filter(|code| !code.is_empty());
	let state = state.filter(|state| !state.is_empty());

	match (code, state, expected_state) {
		(Some(code), Some(state), Some(expected)) if state == expected => Ok(Callback { code }),
		(None, ..) => Err(rejected("Redirect carries no authorization code.")),
		_ => Err(rejected("Redirect state does not match the session.")),
	}
}

/// Binds the code to the attempt's PKCE verifier; a session without one cannot prove the binding.
fn code_grant(session: &LoginSession, callback: Callback) -> Result<TokenGrant> {
	let code_verifier = session.code_verifier().ok_or_else(|| {
		Error::new(DOMAIN, ErrorCode::SecurityValidationFailed)
			.with_message("Session has no PKCE verifier.")
	})?;

	Ok(TokenGrant::AuthorizationCode {
		code: callback.code,
		code_verifier: code_verifier.to_owned(),
		redirect_uri: session.redirect_url().to_string(),
	})
}

fn still_valid(stored: &StoredCredentials, now: OffsetDateTime) -> bool {
	!stored.tokens.access_token.is_empty()
		&& stored.metadata.access_token_expires_at.is_some_and(|expires_at| expires_at > now)
}

/// Installs a freshly issued credential set, replacing every token of the previous one.
fn apply_exchange(session: &mut LoginSession, result: TokenResult) {
	let TokenResult { access_token, token_type, expires_at, id_token, refresh_token } = result;

	session.access_token = Some(access_token);
	session.token_type = token_type;
	session.access_token_expires_at = Some(expires_at);
	session.id_token = id_token;
	session.refresh_token = refresh_token;
}
