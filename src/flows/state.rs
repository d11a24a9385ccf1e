//! Explicit login state machine.
//!
//! Every orchestrator step reports a [`FlowEvent`]; [`LoginPhase::on`] is the only place the
//! phase of a session changes. Events that do not apply to the current phase leave it as is.

// self
use crate::_prelude::*;

/// Phase of the login flow a session is in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LoginPhase {
	/// Nothing in flight.
	#[default]
	Idle,
	/// Fetching the discovery document.
	ResolvingDiscovery,
	/// Generating security values and assembling the authorization URL.
	BuildingAuthRequest,
	/// Authorization URL handed to the host; waiting for the redirect.
	AwaitingExternalRedirect,
	/// Redirect accepted; exchanging the authorization code.
	ExchangingCode,
	/// Holding a usable access token.
	Authenticated,
	/// Exchanging the refresh token.
	RefreshingToken,
	/// Tokens cleared by logout.
	LoggedOut,
}
impl LoginPhase {
	/// Returns the phase reached after `event`.
	pub fn on(self, event: FlowEvent) -> LoginPhase {
		match (self, event) {
			(_, FlowEvent::Begin | FlowEvent::Failed) => LoginPhase::Idle,
			(_, FlowEvent::LoggedOut) => LoginPhase::LoggedOut,
			(_, FlowEvent::Restored) => LoginPhase::Authenticated,
			(LoginPhase::Idle, FlowEvent::ResolveEndpoints) => LoginPhase::ResolvingDiscovery,
			(LoginPhase::Idle | LoginPhase::ResolvingDiscovery, FlowEvent::EndpointsResolved) =>
				LoginPhase::BuildingAuthRequest,
			(LoginPhase::BuildingAuthRequest, FlowEvent::AuthRequestReady) =>
				LoginPhase::AwaitingExternalRedirect,
			(_, FlowEvent::CallbackVerified) => LoginPhase::ExchangingCode,
			(LoginPhase::ExchangingCode, FlowEvent::CodeExchanged) => LoginPhase::Authenticated,
			(LoginPhase::Idle | LoginPhase::Authenticated, FlowEvent::RefreshStarted) =>
				LoginPhase::RefreshingToken,
			(LoginPhase::RefreshingToken, FlowEvent::RefreshSucceeded) => LoginPhase::Authenticated,
			(LoginPhase::RefreshingToken, FlowEvent::RefreshFailed) => LoginPhase::Idle,
			(phase, _) => phase,
		}
	}

	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			LoginPhase::Idle => "idle",
			LoginPhase::ResolvingDiscovery => "resolving_discovery",
			LoginPhase::BuildingAuthRequest => "building_auth_request",
			LoginPhase::AwaitingExternalRedirect => "awaiting_external_redirect",
			LoginPhase::ExchangingCode => "exchanging_code",
			LoginPhase::Authenticated => "authenticated",
			LoginPhase::RefreshingToken => "refreshing_token",
			LoginPhase::LoggedOut => "logged_out",
		}
	}
}
impl Display for LoginPhase {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Step reported by the orchestrator while driving a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowEvent {
	/// `login` started.
	Begin,
	/// A still-valid credential set was found in memory or in the cache.
	Restored,
	/// Endpoints are missing and discovery starts.
	ResolveEndpoints,
	/// Endpoints are available.
	EndpointsResolved,
	/// Authorization URL is ready for the host.
	AuthRequestReady,
	/// Redirect passed the state and code checks.
	CallbackVerified,
	/// Code exchange succeeded.
	CodeExchanged,
	/// Refresh grant started.
	RefreshStarted,
	/// Refresh grant succeeded.
	RefreshSucceeded,
	/// Refresh grant failed.
	RefreshFailed,
	/// The operation failed.
	Failed,
	/// Session logged out.
	LoggedOut,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn run(events: &[FlowEvent]) -> LoginPhase {
		events.iter().fold(LoginPhase::Idle, |phase, event| phase.on(*event))
	}

	#[test]
	fn interactive_login_walks_the_happy_path() {
		let mut phase = LoginPhase::Idle;
		let path = [
			(FlowEvent::Begin, LoginPhase::Idle),
			(FlowEvent::ResolveEndpoints, LoginPhase::ResolvingDiscovery),
			(FlowEvent::EndpointsResolved, LoginPhase::BuildingAuthRequest),
			(FlowEvent::AuthRequestReady, LoginPhase::AwaitingExternalRedirect),
			(FlowEvent::CallbackVerified, LoginPhase::ExchangingCode),
			(FlowEvent::CodeExchanged, LoginPhase::Authenticated),
		];

		for (event, expected) in path {
			phase = phase.on(event);

			assert_eq!(phase, expected, "Unexpected phase after {event:?}.");
		}
	}

	#[test]
	fn refresh_branch_returns_to_authenticated_or_idle() {
		let refreshing = run(&[FlowEvent::Restored, FlowEvent::RefreshStarted]);

		assert_eq!(refreshing, LoginPhase::RefreshingToken);
		assert_eq!(refreshing.on(FlowEvent::RefreshSucceeded), LoginPhase::Authenticated);
		assert_eq!(refreshing.on(FlowEvent::RefreshFailed), LoginPhase::Idle);
	}

	#[test]
	fn inapplicable_events_leave_the_phase_unchanged() {
		assert_eq!(LoginPhase::Idle.on(FlowEvent::CodeExchanged), LoginPhase::Idle);
		assert_eq!(
			LoginPhase::Authenticated.on(FlowEvent::AuthRequestReady),
			LoginPhase::Authenticated
		);
		assert_eq!(LoginPhase::LoggedOut.on(FlowEvent::RefreshSucceeded), LoginPhase::LoggedOut);
	}

	#[test]
	fn logout_is_terminal_until_the_next_login() {
		let phase = run(&[FlowEvent::Restored, FlowEvent::LoggedOut]);

		assert_eq!(phase, LoginPhase::LoggedOut);
		assert_eq!(phase.on(FlowEvent::Begin), LoginPhase::Idle);
	}
}
