//! Typed clients for the identity-service endpoints.
//!
//! Each client owns an [`ApiFacade`](crate::oauth::ApiFacade) clone, builds its request, and
//! validates the response body into a domain type. None of them touch a session or a store;
//! the orchestrator decides what to cache.

pub mod app_link;
pub mod discovery;
pub mod exchange;
pub mod token_info;

pub use app_link::*;
pub use discovery::*;
pub use exchange::*;
pub use token_info::*;

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, oauth::Endpoint};

/// Decodes a JSON body, reporting the failing path as an `InvalidResponse` message.
pub(crate) fn decode_json<T>(endpoint: Endpoint, body: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
		let path = e.path().to_string();

		endpoint
			.error(ErrorCode::InvalidResponse)
			.with_message(format!("Malformed response at `{path}`."))
			.with_source(e.into_inner())
	})
}

/// Returns the value of a required string field, rejecting absent and empty values.
pub(crate) fn required(
	endpoint: Endpoint,
	field: &'static str,
	value: Option<String>,
) -> Result<String> {
	value.filter(|value| !value.is_empty()).ok_or_else(|| {
		endpoint
			.error(ErrorCode::InvalidResponse)
			.with_message(format!("Response is missing `{field}`."))
	})
}
