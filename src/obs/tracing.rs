// self
use crate::{_prelude::*, obs::FlowKind};

/// Future returned by [`FlowSpan::instrument`].
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`FlowSpan::instrument`].
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// `oidc_login.flow` span wrapping one orchestrator operation.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Opens a span for `kind`; `stage` names the public operation.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			Self { span: tracing::info_span!("oidc_login.flow", flow = kind.as_str(), stage) }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Runs `fut` inside the span.
	pub fn instrument<F>(&self, fut: F) -> InstrumentedFlow<F>
	where
		F: Future,
	{
		#[cfg(feature = "tracing")]
		{
			tracing::Instrument::instrument(fut, self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// A cached credential set was dropped because the flow could no longer vouch for it.
pub(crate) fn record_purge(kind: FlowKind, reason: &'static str) {
	#[cfg(feature = "tracing")]
	tracing::warn!(flow = kind.as_str(), reason, "Purged cached credentials.");

	#[cfg(not(feature = "tracing"))]
	let _ = (kind, reason);
}

/// A store write or read failed; the affected entry has been rolled back.
pub(crate) fn record_store_failure(action: &'static str, error: &dyn Display) {
	#[cfg(feature = "tracing")]
	tracing::warn!(action, error = %error, "Credential cache operation failed.");

	#[cfg(not(feature = "tracing"))]
	let _ = (action, error);
}

/// Refresh-on-login gave up; login continues interactively.
pub(crate) fn record_fallback(kind: FlowKind, reason: &Error) {
	#[cfg(feature = "tracing")]
	tracing::warn!(
		flow = kind.as_str(),
		domain = reason.domain().as_str(),
		code = reason.code().as_str(),
		status = reason.status(),
		"Falling back to interactive login."
	);

	#[cfg(not(feature = "tracing"))]
	let _ = (kind, reason);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrumented_flows_keep_their_output() {
		let span = FlowSpan::new(FlowKind::IdTokenInfo, "get_id_token_info");

		assert_eq!(span.instrument(async { "claims" }).await, "claims");

		record_purge(FlowKind::Logout, "logout");
	}
}
