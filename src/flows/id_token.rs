//! ID token verification with a per-nonce claim cache.

// self
use crate::{
	_prelude::*,
	auth::{IdTokenInfo, LoginSession},
	flows::{AuthOrchestrator, common},
	http::IdpHttpClient,
	oauth::{CallOptions, TransportErrorMapper},
	obs::{self, FlowKind},
};

const DOMAIN: ErrorDomain = ErrorDomain::GetIdTokenInfo;

impl<C, M> AuthOrchestrator<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Verifies the session's ID token using the configured call options.
	pub async fn get_id_token_info(&self, session: &LoginSession) -> Result<IdTokenInfo> {
		let options = self.config.call_options();

		self.get_id_token_info_with(session, &options).await
	}

	/// Verifies the session's ID token.
	///
	/// Unexpired claims cached under the session nonce are returned without a network call.
	/// Otherwise the token-info endpoint is asked and the answer cached before it is returned.
	/// Service failures purge the session's cached credential set; a nonce mismatch does not.
	pub async fn get_id_token_info_with(
		&self,
		session: &LoginSession,
		options: &CallOptions,
	) -> Result<IdTokenInfo> {
		common::observe(FlowKind::IdTokenInfo, "get_id_token_info", async {
			let id_token = session
				.id_token()
				.filter(|token| !token.is_empty())
				.ok_or_else(|| Error::new(DOMAIN, ErrorCode::InvalidIdToken))?;
			let verify_uri = session
				.endpoints()
				.map(|endpoints| endpoints.verify_uri.as_str())
				.filter(|uri| !uri.trim().is_empty())
				.ok_or_else(|| Error::new(DOMAIN, ErrorCode::InvalidIdToken))?;
			let nonce = session
				.nonce()
				.filter(|nonce| !nonce.is_empty())
				.ok_or_else(|| Error::new(DOMAIN, ErrorCode::InvalidNonce))?;
			let key = session.cache_key();
			let _guard = common::lock_flow(self, key.as_ref()).await;

			let cached = key.as_ref().and_then(|key| self.store.load_id_token_info(key, nonce));

			if let Some(info) = cached {
				if !info.is_expired_at(OffsetDateTime::now_utc()) {
					return Ok(info);
				}

				self.store.purge_id_token_info(nonce);
			}

			let result = self
				.token_info_client()
				.fetch(verify_uri, session.client_id(), id_token, nonce, options)
				.await;

			match (&result, &key) {
				(Ok(info), Some(key)) => {
					let _ = self.store.save_id_token_info(key, info);
				},
				(Err(e), Some(key)) if e.is_service_failure() => {
					self.store.purge(key);
					obs::record_purge(FlowKind::IdTokenInfo, "token_info_failed");
				},
				_ => (),
			}

			result
		})
		.await
	}

	/// Returns true when `info` carries a token id and `now` lies inside its validity window.
	///
	/// A `false` answer also drops the claims cached under `info.nonce`.
	pub fn is_valid_id_token(&self, info: &IdTokenInfo) -> bool {
		if info.is_valid_at(OffsetDateTime::now_utc()) {
			return true;
		}

		self.store.purge_id_token_info(&info.nonce);

		false
	}
}
