//! Configuration inputs: per-session login configuration and orchestrator-wide settings.

// self
use crate::{
	_prelude::*,
	auth::{DeviceId, LoginSession},
	clients::DEFAULT_CLIENT_PUBLIC_INFO_TEMPLATE,
	oauth::{CallOptions, DEFAULT_REQUEST_TIMEOUT},
};

/// Host-supplied configuration for one login session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginConfig {
	/// OAuth client identifier.
	#[serde(default)]
	pub client_id: String,
	/// Redirect URL registered for the client.
	#[serde(default)]
	pub redirect_url: String,
	/// Space-delimited scope.
	#[serde(default)]
	pub scope: String,
	/// Discovery document URL.
	#[serde(default)]
	pub service_discovery_url: String,
	/// Opaque signed request object.
	#[serde(default)]
	pub request: Option<String>,
	/// Authentication context class references.
	#[serde(default)]
	pub acr_values: BTreeMap<String, String>,
	/// Login hint.
	#[serde(default)]
	pub hint: Option<String>,
	/// ID token hint.
	#[serde(default)]
	pub id_token_hint: Option<String>,
	/// Prompt value.
	#[serde(default)]
	pub prompt: Option<String>,
}
impl LoginConfig {
	/// Reads a configuration from JSON; malformed input fails with `InvalidConfiguration`.
	pub fn from_json(raw: &[u8]) -> Result<Self> {
		let mut deserializer = serde_json::Deserializer::from_slice(raw);

		serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
			let path = e.path().to_string();

			Error::new(ErrorDomain::LoadConfiguration, ErrorCode::InvalidConfiguration)
				.with_message(format!("Invalid login configuration at `{path}`."))
				.with_source(e.into_inner())
		})
	}

	/// Validates the configuration and builds a [`LoginSession`].
	///
	/// Fields are checked in order: client id, redirect URL, scope, discovery URL. The first
	/// failure is reported in the `LoadConfiguration` domain.
	pub fn into_session(self) -> Result<LoginSession> {
		const DOMAIN: ErrorDomain = ErrorDomain::LoadConfiguration;

		let scope_is_blank = self.scope.trim().is_empty();
		let discovery_is_blank = self.service_discovery_url.trim().is_empty();
		let mut builder = LoginSession::builder(
			self.client_id,
			self.redirect_url,
			self.scope,
			self.service_discovery_url,
		)
		.acr_values(
			self.acr_values.into_iter().filter(|(k, v)| !k.is_empty() && !v.is_empty()).collect(),
		);

		if let Some(request) = self.request {
			builder = builder.request(request);
		}
		if let Some(hint) = self.hint {
			builder = builder.hint(hint);
		}
		if let Some(hint) = self.id_token_hint {
			builder = builder.id_token_hint(hint);
		}
		if let Some(prompt) = self.prompt {
			builder = builder.prompt(prompt);
		}

		let session = builder.build()?;

		if scope_is_blank {
			return Err(Error::new(DOMAIN, ErrorCode::InvalidScope));
		}
		if discovery_is_blank {
			return Err(Error::new(DOMAIN, ErrorCode::InvalidServiceDiscoveryUrl));
		}

		Ok(session)
	}
}

/// Bounds the refresh attempt `login` makes before falling back to interactive login.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshPolicy {
	/// Enables refresh-on-login.
	pub enabled: bool,
	/// Refresh grants attempted per `login` call.
	pub max_attempts: u32,
}
impl Default for RefreshPolicy {
	fn default() -> Self {
		Self { enabled: true, max_attempts: 1 }
	}
}

/// Orchestrator-wide settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
	/// Deadline for each network call made without explicit [`CallOptions`].
	pub request_timeout: StdDuration,
	/// Device identifier forwarded as `device_id`; sent empty when unset.
	pub device_id: Option<DeviceId>,
	/// Client public info endpoint template used when discovery does not advertise one.
	pub client_public_info_fallback: String,
	/// Refresh-on-login policy.
	pub refresh: RefreshPolicy,
}
impl OrchestratorConfig {
	/// Default per-call options: configured deadline, fresh cancellation token.
	pub fn call_options(&self) -> CallOptions {
		CallOptions::with_timeout(self.request_timeout)
	}
}
impl Default for OrchestratorConfig {
	fn default() -> Self {
		Self {
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			device_id: None,
			client_public_info_fallback: DEFAULT_CLIENT_PUBLIC_INFO_TEMPLATE.into(),
			refresh: RefreshPolicy::default(),
		}
	}
}
