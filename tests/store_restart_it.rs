mod common;

// std
use std::{env, fs, path::PathBuf, process, sync::Arc};
// crates.io
use time::OffsetDateTime;
// self
use common::*;
use oidc_login::{
	config::OrchestratorConfig,
	flows::{AuthOrchestrator, ExchangeOutcome, LoginOutcome, LoginPhase},
	store::{FileMetadataStore, MemoryCredentialStore, MetadataStore, SecureTokenStore},
};

fn temp_path() -> PathBuf {
	env::temp_dir().join(format!(
		"oidc_login_restart_{}_{}.json",
		process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos(),
	))
}

fn orchestrator(
	idp: &ScriptedIdp,
	credentials: &MemoryCredentialStore,
	path: &PathBuf,
) -> TestOrchestrator {
	let metadata = FileMetadataStore::open(path).expect("Metadata file should open.");
	let store = SecureTokenStore::new(Arc::new(credentials.clone()), Arc::new(metadata));

	AuthOrchestrator::with_http_client(
		store,
		OrchestratorConfig::default(),
		idp.clone(),
		ScriptedMapper,
	)
}

#[tokio::test]
async fn credentials_survive_a_process_restart() {
	let path = temp_path();
	let idp = ScriptedIdp::default();
	let credentials = MemoryCredentialStore::default();

	idp.respond(DISCOVERY_PATH, 200, discovery_document());
	idp.respond("/token", 200, token_response("at-1", 3600));

	{
		let first = orchestrator(&idp, &credentials, &path);
		let mut session = session();

		first.login(&mut session).await.expect("Login should succeed.");

		let redirect = redirect_for(&session, "code-1");
		let outcome = first
			.exchange_token(&mut session, &redirect)
			.await
			.expect("Exchange should succeed.");

		assert_eq!(outcome, ExchangeOutcome::Exchanged);
	}

	let calls_before_restart = idp.calls().len();
	let restarted = orchestrator(&idp, &credentials, &path);
	let mut session = session();
	let outcome = restarted.login(&mut session).await.expect("Restored login should succeed.");

	assert_eq!(outcome, LoginOutcome::Cached);
	assert_eq!(session.phase(), LoginPhase::Authenticated);
	assert_eq!(session.access_token().map(|token| token.expose()), Some("at-1"));
	assert_eq!(
		session.endpoints().map(|endpoints| endpoints.exchange_uri.as_str()),
		Some("https://idp.test/token")
	);
	assert_eq!(idp.calls().len(), calls_before_restart, "Restores never touch the network.");

	let raw = fs::read_to_string(&path).expect("Metadata file should be readable.");

	assert!(!raw.contains("at-1"), "Bearer credentials never reach the metadata file.");

	fs::remove_file(&path).unwrap_or_else(|e| {
		panic!("Failed to remove temporary metadata store {}: {e}", path.display())
	});
}

#[tokio::test]
async fn metadata_without_credentials_is_discarded_on_restore() {
	let path = temp_path();
	let idp = ScriptedIdp::default();

	idp.respond(DISCOVERY_PATH, 200, discovery_document());
	idp.respond("/token", 200, token_response("at-1", 3600));

	{
		let first = orchestrator(&idp, &MemoryCredentialStore::default(), &path);
		let mut session = session();

		first.login(&mut session).await.expect("Login should succeed.");

		let redirect = redirect_for(&session, "code-1");

		first
			.exchange_token(&mut session, &redirect)
			.await
			.expect("Exchange should succeed.");
	}

	// Keychain wiped, metadata file left behind.
	let restarted = orchestrator(&idp, &MemoryCredentialStore::default(), &path);
	let mut session = session();
	let outcome = restarted.login(&mut session).await.expect("Login should succeed.");

	assert!(matches!(outcome, LoginOutcome::AuthorizationRequired(_)));
	assert!(session.access_token().is_none());

	let reopened = FileMetadataStore::open(&path).expect("Metadata file should reopen.");

	assert_eq!(
		reopened.get("partner-client.openid profile"),
		Ok(None),
		"Stray metadata must be purged."
	);

	fs::remove_file(&path).unwrap_or_else(|e| {
		panic!("Failed to remove temporary metadata store {}: {e}", path.display())
	});
}
