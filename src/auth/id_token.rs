//! Verified ID token claims returned by the token-info endpoint.

// self
use crate::_prelude::*;

/// Claims of an ID token that the identity provider has verified.
///
/// `token_id` and `partner_user_id` are sensitive: they are kept out of `Debug` output and are
/// persisted in the confidential store rather than alongside the other claims.
#[derive(Clone, PartialEq, Eq)]
pub struct IdTokenInfo {
	/// Audience (`aud`) the token was issued for.
	pub audience: String,
	/// Issuing service (`svc`).
	pub service: String,
	/// Start of the validity window (`nbf`).
	pub not_valid_before: OffsetDateTime,
	/// End of the validity window (`exp`).
	pub expiration: OffsetDateTime,
	/// Issue instant (`iat`).
	pub issue_date: OffsetDateTime,
	/// Issuer (`iss`).
	pub issuer: String,
	/// Token identifier (`jti`).
	pub token_id: String,
	/// Partner identifier (`pid`).
	pub partner_id: String,
	/// Partner-scoped user identifier (`sub`).
	pub partner_user_id: String,
	/// Nonce bound into the token (`nonce`).
	pub nonce: String,
}
impl IdTokenInfo {
	/// Returns true when `token_id` is present and `now` falls inside `[nbf, exp)`.
	pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
		!self.token_id.is_empty() && now < self.expiration && now >= self.not_valid_before
	}

	/// Returns true once `now` has reached the expiration instant.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.expiration
	}
}
impl Debug for IdTokenInfo {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdTokenInfo")
			.field("audience", &self.audience)
			.field("service", &self.service)
			.field("not_valid_before", &self.not_valid_before)
			.field("expiration", &self.expiration)
			.field("issue_date", &self.issue_date)
			.field("issuer", &self.issuer)
			.field("token_id", &"<redacted>")
			.field("partner_id", &self.partner_id)
			.field("partner_user_id", &"<redacted>")
			.field("nonce", &self.nonce)
			.finish()
	}
}
