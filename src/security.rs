//! PKCE verifier/challenge, nonce, and anti-CSRF state generation.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use uuid::Builder as UuidBuilder;
// self
use crate::_prelude::*;

const PKCE_VERIFIER_BYTES: usize = 32;

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Failures raised while generating security values.
#[derive(Debug, ThisError)]
pub enum SecurityError {
	/// The platform random source could not produce bytes.
	#[error("Secure random source is unavailable.")]
	CryptoUnavailable {
		/// Underlying random source failure.
		#[source]
		source: crate::error::BoxError,
	},
}

/// Cryptographically secure byte source used exclusively for security values.
pub trait RandomSource
where
	Self: Send + Sync,
{
	/// Fills `buf` with random bytes or reports that the source is unavailable.
	fn fill(&self, buf: &mut [u8]) -> Result<(), SecurityError>;
}

/// Operating-system random source.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsRandom;
impl RandomSource for OsRandom {
	fn fill(&self, buf: &mut [u8]) -> Result<(), SecurityError> {
		OsRng
			.try_fill_bytes(buf)
			.map_err(|e| SecurityError::CryptoUnavailable { source: Box::new(e) })
	}
}

/// Fresh security values for one authorization attempt.
///
/// All four values are generated together and must never be reused by a later attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct SecurityContext {
	/// Anti-replay nonce (lower-cased UUID).
	pub nonce: String,
	/// Anti-CSRF state (lower-cased UUID).
	pub state: String,
	/// PKCE verifier (base64url of 32 random bytes, unpadded).
	pub code_verifier: String,
	/// PKCE S256 challenge derived from the verifier.
	pub code_challenge: String,
}
impl Debug for SecurityContext {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SecurityContext")
			.field("nonce", &self.nonce)
			.field("state", &self.state)
			.field("code_verifier", &"<redacted>")
			.field("code_challenge", &self.code_challenge)
			.finish()
	}
}

/// Generates [`SecurityContext`] values from a [`RandomSource`].
#[derive(Clone)]
pub struct SecurityContextGenerator {
	random: Arc<dyn RandomSource>,
}
impl SecurityContextGenerator {
	/// Creates a generator backed by the provided random source.
	pub fn new(random: Arc<dyn RandomSource>) -> Self {
		Self { random }
	}

	/// Produces a fresh nonce, state, and PKCE pair.
	pub fn generate(&self) -> Result<SecurityContext, SecurityError> {
		let nonce = self.random_uuid()?;
		let state = self.random_uuid()?;
		let mut verifier_bytes = [0_u8; PKCE_VERIFIER_BYTES];

		self.random.fill(&mut verifier_bytes)?;

		let code_verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);
		let code_challenge = compute_pkce_challenge(&code_verifier);

		Ok(SecurityContext { nonce, state, code_verifier, code_challenge })
	}

	fn random_uuid(&self) -> Result<String, SecurityError> {
		let mut bytes = [0_u8; 16];

		self.random.fill(&mut bytes)?;

		Ok(UuidBuilder::from_random_bytes(bytes).into_uuid().hyphenated().to_string())
	}
}
impl Default for SecurityContextGenerator {
	fn default() -> Self {
		Self::new(Arc::new(OsRandom))
	}
}
impl Debug for SecurityContextGenerator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("SecurityContextGenerator(..)")
	}
}

/// Computes the RFC 7636 S256 challenge for a verifier.
pub fn compute_pkce_challenge(verifier: &str) -> String {
	let mut hasher = Sha256::new();

	hasher.update(verifier.as_bytes());

	let digest = hasher.finalize();

	URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	struct BrokenRandom;
	impl RandomSource for BrokenRandom {
		fn fill(&self, _buf: &mut [u8]) -> Result<(), SecurityError> {
			Err(SecurityError::CryptoUnavailable {
				source: Box::new(std::io::Error::other("entropy pool closed")),
			})
		}
	}

	#[test]
	fn challenge_matches_rfc_7636_appendix_b() {
		assert_eq!(
			compute_pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
			"E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
		);
	}

	#[test]
	fn generated_values_are_well_formed() {
		let context = SecurityContextGenerator::default()
			.generate()
			.expect("OS random source should be available in tests.");

		assert_eq!(context.code_verifier.len(), 43);
		assert!(!context.code_verifier.contains(['+', '/', '=']));
		assert_eq!(context.code_challenge, compute_pkce_challenge(&context.code_verifier));
		assert!(!context.code_challenge.contains(['+', '/', '=']));

		for id in [&context.nonce, &context.state] {
			assert_eq!(id.len(), 36);
			assert_eq!(id.as_str(), id.to_lowercase());
			assert_eq!(id.as_bytes()[14], b'4', "Identifiers should be version 4 UUIDs.");
		}
	}

	#[test]
	fn consecutive_attempts_never_share_values() {
		let generator = SecurityContextGenerator::default();
		let first = generator.generate().expect("First generation should succeed.");
		let second = generator.generate().expect("Second generation should succeed.");

		assert_ne!(first.nonce, second.nonce);
		assert_ne!(first.state, second.state);
		assert_ne!(first.nonce, first.state);
		assert_ne!(first.code_verifier, second.code_verifier);
		assert_ne!(first.code_challenge, second.code_challenge);
	}

	#[test]
	fn unavailable_random_source_is_reported() {
		let generator = SecurityContextGenerator::new(Arc::new(BrokenRandom));
		let err = generator.generate().expect_err("Broken random source must fail generation.");

		assert!(matches!(err, SecurityError::CryptoUnavailable { .. }));
	}
}
