//! Shared helpers for orchestrator operations (flow guards, outcome recording).

// crates.io
use async_lock::MutexGuardArc;
// self
use crate::{
	_prelude::*,
	flows::AuthOrchestrator,
	http::IdpHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::CacheKey,
};

/// Returns (and creates on demand) the guard for a cache key; sessions without one are
/// never cached and need no guard.
fn flow_guard<C, M>(
	orchestrator: &AuthOrchestrator<C, M>,
	key: Option<&CacheKey>,
) -> Option<Arc<AsyncMutex<()>>>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let key = key?;
	let mut guards = orchestrator.flow_guards.lock();

	Some(guards.entry(key.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone())
}

/// Acquires the guard for `key`, holding it until the returned value drops.
pub(super) async fn lock_flow<C, M>(
	orchestrator: &AuthOrchestrator<C, M>,
	key: Option<&CacheKey>,
) -> Option<MutexGuardArc<()>>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let guard = flow_guard(orchestrator, key)?;

	Some(guard.lock_arc().await)
}

/// Runs `fut` inside a flow span and records its attempt and outcome.
pub(super) async fn observe<T, F>(kind: FlowKind, stage: &'static str, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	let span = FlowSpan::new(kind, stage);

	obs::record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => obs::record_flow_outcome(kind, FlowOutcome::Success),
		Err(_) => obs::record_flow_outcome(kind, FlowOutcome::Failure),
	}

	result
}
