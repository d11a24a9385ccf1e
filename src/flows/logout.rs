//! `logout` and the fail-closed access token check.

// self
use crate::{
	_prelude::*,
	auth::LoginSession,
	flows::{AuthOrchestrator, FlowEvent, common},
	http::IdpHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind},
};

impl<C, M> AuthOrchestrator<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Clears the session's tokens and endpoints and purges its cached credential set.
	///
	/// Fails with `LogoutFailed` when nothing was cached, so a second logout of the same
	/// session reports that there was nothing left to clean up.
	pub async fn logout(&self, session: &mut LoginSession) -> Result<()> {
		common::observe(FlowKind::Logout, "logout", async {
			let key = session.cache_key();
			let _guard = common::lock_flow(self, key.as_ref()).await;

			session.clear_tokens();
			session.endpoints = None;
			session.advance(FlowEvent::LoggedOut);

			if let Some(nonce) = session.nonce() {
				self.store.purge_id_token_info(nonce);
			}

			let purged = key.as_ref().is_some_and(|key| self.store.purge(key));

			if purged {
				Ok(())
			} else {
				Err(Error::new(ErrorDomain::Logout, ErrorCode::LogoutFailed))
			}
		})
		.await
	}

	/// Returns true when the session holds a non-empty access token that has not expired.
	///
	/// A `false` answer also clears the session's tokens and purges its cached credential set.
	pub fn is_valid_access_token(&self, session: &mut LoginSession) -> bool {
		if session.has_valid_access_token_at(OffsetDateTime::now_utc()) {
			return true;
		}
		if let Some(key) = session.cache_key() {
			self.store.purge(&key);
			obs::record_purge(FlowKind::Login, "access_token_invalid");
		}

		session.clear_tokens();

		false
	}
}
