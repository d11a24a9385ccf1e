//! Shared fixtures for integration tests: a scripted identity provider, in-memory stores, and
//! session builders.

#![allow(dead_code)]

// std
use std::{
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult},
	future::Future,
	pin::Pin,
	sync::Arc,
};
// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{Method, StatusCode},
};
use parking_lot::Mutex;
use url::Url;
// self
use oidc_login::{
	auth::LoginSession,
	config::OrchestratorConfig,
	error::Error,
	flows::AuthOrchestrator,
	http::{IdpHttpClient, ResponseMetadata, ResponseMetadataSlot},
	oauth::{Endpoint, TransportErrorMapper},
	store::{MemoryCredentialStore, MemoryMetadataStore, SecureTokenStore},
};

pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";
pub const IDP: &str = "https://idp.test";

/// Orchestrator wired to the scripted provider.
pub type TestOrchestrator = AuthOrchestrator<ScriptedIdp, ScriptedMapper>;

/// Failure injected by [`Reply::Fail`].
#[derive(Debug)]
pub struct ScriptError(pub String);
impl Display for ScriptError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl StdError for ScriptError {}

/// Canned answer for one path.
#[derive(Clone, Debug)]
pub enum Reply {
	/// Status plus JSON body.
	Json(u16, String),
	/// Never answers; exercises deadlines and cancellation.
	Hang,
	/// Transport failure before any status is known.
	Fail,
}

/// One request observed by the scripted provider.
#[derive(Clone, Debug)]
pub struct RecordedCall {
	pub method: Method,
	pub url: Url,
}

#[derive(Default)]
struct Script {
	routes: Vec<(String, Reply)>,
	calls: Vec<RecordedCall>,
}

/// In-process identity provider that answers by URL path and records every call.
#[derive(Clone, Default)]
pub struct ScriptedIdp(Arc<Mutex<Script>>);
impl ScriptedIdp {
	/// Answers `path` with `status` and `body`, replacing any earlier script for it.
	pub fn respond(&self, path: &str, status: u16, body: impl Into<String>) -> &Self {
		self.script(path, Reply::Json(status, body.into()))
	}

	/// Answers `path` with `reply`, replacing any earlier script for it.
	pub fn script(&self, path: &str, reply: Reply) -> &Self {
		let mut script = self.0.lock();

		script.routes.retain(|(route, _)| route != path);
		script.routes.push((path.to_owned(), reply));

		self
	}

	/// Every call made so far.
	pub fn calls(&self) -> Vec<RecordedCall> {
		self.0.lock().calls.clone()
	}

	/// Number of calls made to `path`.
	pub fn calls_to(&self, path: &str) -> usize {
		self.0.lock().calls.iter().filter(|call| call.url.path() == path).count()
	}

	/// Last call made to `path`.
	pub fn last_call_to(&self, path: &str) -> Option<RecordedCall> {
		self.0.lock().calls.iter().rev().find(|call| call.url.path() == path).cloned()
	}

	fn record(&self, request: &HttpRequest) -> Reply {
		let url = Url::parse(&request.uri().to_string()).expect("Request URI should be absolute.");
		let mut script = self.0.lock();
		let reply = script
			.routes
			.iter()
			.find(|(route, _)| *route == url.path())
			.map(|(_, reply)| reply.clone())
			.unwrap_or_else(|| Reply::Json(404, "{}".into()));

		script.calls.push(RecordedCall { method: request.method().clone(), url });

		reply
	}
}
impl IdpHttpClient for ScriptedIdp {
	type Handle = ScriptedHandle;
	type TransportError = ScriptError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ScriptedHandle { idp: self.clone(), slot }
	}
}

/// Per-call handle of [`ScriptedIdp`].
pub struct ScriptedHandle {
	idp: ScriptedIdp,
	slot: ResponseMetadataSlot,
}
impl<'c> AsyncHttpClient<'c> for ScriptedHandle {
	type Error = HttpClientError<ScriptError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let reply = self.idp.record(&request);
		let slot = self.slot.clone();

		Box::pin(async move {
			slot.take();

			match reply {
				Reply::Json(status, body) => {
					slot.store(ResponseMetadata { status: Some(status) });

					let mut response = HttpResponse::new(body.into_bytes());

					*response.status_mut() =
						StatusCode::from_u16(status).expect("Scripted status should be valid.");

					Ok(response)
				},
				Reply::Hang => std::future::pending().await,
				Reply::Fail => Err(HttpClientError::Reqwest(Box::new(ScriptError(
					"Connection reset by scripted provider.".into(),
				)))),
			}
		})
	}
}

/// Maps scripted transport failures to the endpoint's transport code.
#[derive(Clone, Debug, Default)]
pub struct ScriptedMapper;
impl TransportErrorMapper<ScriptError> for ScriptedMapper {
	fn map_transport_error(
		&self,
		endpoint: Endpoint,
		_: Option<&ResponseMetadata>,
		error: HttpClientError<ScriptError>,
	) -> Error {
		endpoint.error(endpoint.transport_code()).with_source(error)
	}
}

/// Orchestrator, provider, and the two backing stores it writes to.
pub struct Harness {
	pub orchestrator: TestOrchestrator,
	pub idp: ScriptedIdp,
	pub credentials: MemoryCredentialStore,
	pub metadata: MemoryMetadataStore,
}
impl Harness {
	pub fn new() -> Self {
		Self::with_config(OrchestratorConfig::default())
	}

	pub fn with_config(config: OrchestratorConfig) -> Self {
		let idp = ScriptedIdp::default();
		let credentials = MemoryCredentialStore::default();
		let metadata = MemoryMetadataStore::default();
		let store =
			SecureTokenStore::new(Arc::new(credentials.clone()), Arc::new(metadata.clone()));
		let orchestrator =
			AuthOrchestrator::with_http_client(store, config, idp.clone(), ScriptedMapper);

		Self { orchestrator, idp, credentials, metadata }
	}

	/// Scripts a complete discovery document pointing at the scripted provider.
	pub fn with_discovery(self) -> Self {
		self.idp.respond(DISCOVERY_PATH, 200, discovery_document());

		self
	}
}

pub fn discovery_document() -> String {
	format!(
		r#"{{
			"authorization_endpoint": "{IDP}/authorize",
			"token_endpoint": "{IDP}/token",
			"id_token_verification_endpoint": "{IDP}/tokeninfo",
			"client_public_info_endpoint": "{IDP}/clients/{{client_id}}/public"
		}}"#
	)
}

pub fn token_response(access_token: &str, expires_in: i64) -> String {
	format!(
		r#"{{
			"access_token": "{access_token}",
			"token_type": "Bearer",
			"expires_in": {expires_in},
			"id_token": "id-token-1",
			"refresh_token": "refresh-1"
		}}"#
	)
}

pub fn token_info_response(nonce: &str, expires_at: i64) -> String {
	format!(
		r#"{{
			"aud": "partner-client",
			"svc": "PASSENGER",
			"nbf": {nbf},
			"exp": {expires_at},
			"iat": {nbf},
			"iss": "{IDP}",
			"jti": "jti-1",
			"pid": "partner-1",
			"sub": "user-1",
			"nonce": "{nonce}"
		}}"#,
		nbf = expires_at - 7200,
	)
}

pub fn session() -> LoginSession {
	session_with_scope("openid profile")
}

pub fn session_with_scope(scope: &str) -> LoginSession {
	LoginSession::builder(
		"partner-client",
		"partner://callback",
		scope,
		format!("{IDP}{DISCOVERY_PATH}"),
	)
	.build()
	.expect("Session fixture should build.")
}

/// Builds the redirect the provider would send for `session`'s current attempt.
pub fn redirect_for(session: &LoginSession, code: &str) -> String {
	let state = session.state().expect("Session should have an in-flight attempt.");

	format!("partner://callback?code={code}&state={state}")
}
