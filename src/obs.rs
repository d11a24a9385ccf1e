//! Spans, events, and counters for orchestrator operations.
//!
//! With `tracing`, each operation runs in an `oidc_login.flow` span (`flow`, `stage`) and
//! fail-closed purges, store rollbacks, and refresh fallbacks are logged at `warn`.
//! With `metrics`, `oidc_login_flow_total` counts every attempt and its outcome per flow.
//! Token material never reaches either.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Interactive login (cache restore, discovery, authorization request).
	Login,
	/// Redirect handling and authorization-code exchange.
	ExchangeToken,
	/// Refresh-token exchange.
	Refresh,
	/// Logout and cache purge.
	Logout,
	/// ID token verification through the token-info endpoint.
	IdTokenInfo,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Login => "login",
			FlowKind::ExchangeToken => "exchange_token",
			FlowKind::Refresh => "refresh",
			FlowKind::Logout => "logout",
			FlowKind::IdTokenInfo => "id_token_info",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to an orchestrator operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
