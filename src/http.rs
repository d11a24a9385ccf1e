//! HTTP transport seam for identity-service calls.
//!
//! Every discovery, token, token-info, and public-info request goes through an
//! [`IdpHttpClient`]. Per call the orchestrator asks for a handle bound to a fresh
//! [`ResponseMetadataSlot`]; the handle records the HTTP status there so a failure can still be
//! classified (and carry its status) after the transport error has erased the response.

// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
#[cfg(feature = "reqwest")] use reqwest::redirect::Policy;
// self
use crate::_prelude::*;

/// Transport able to reach the identity provider.
///
/// Implementations must not follow redirects. A handle clears its slot with
/// [`ResponseMetadataSlot::take`] before sending and fills it with
/// [`ResponseMetadataSlot::store`] as soon as a status line is read.
pub trait IdpHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Error the transport reports when no usable response was produced.
	type TransportError: 'static + Send + Sync + StdError;

	/// Per-call handle.
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Returns a handle that reports into `slot`.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// What the transport saw of the last response.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status, once known.
	pub status: Option<u16>,
}

/// Shared cell between a transport handle and the error mapper.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Replaces the recorded metadata.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Removes and returns the recorded metadata.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Default transport built on reqwest.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient(ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds a client with redirect following disabled.
	pub fn new() -> Result<Self, ReqwestError> {
		ReqwestClient::builder().redirect(Policy::none()).build().map(Self)
	}

	/// Uses a host-configured client; it must already refuse redirects.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl IdpHttpClient for ReqwestHttpClient {
	type Handle = ReqwestHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ReqwestHandle { client: self.0.clone(), slot }
	}
}

/// Per-call handle of [`ReqwestHttpClient`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHandle {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for ReqwestHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.slot.take();

			let request = request.try_into().map_err(Box::new)?;
			let response = self.client.execute(request).await.map_err(Box::new)?;
			let status = response.status();

			self.slot.store(ResponseMetadata { status: Some(status.as_u16()) });

			let headers = response.headers().clone();
			let body = response.bytes().await.map_err(Box::new)?;
			let mut converted = HttpResponse::new(body.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn taking_metadata_empties_the_slot() {
		let slot = ResponseMetadataSlot::default();
		let shared = slot.clone();

		shared.store(ResponseMetadata { status: Some(401) });

		assert_eq!(slot.take().and_then(|meta| meta.status), Some(401));
		assert!(shared.take().is_none(), "Clones share one cell.");
	}
}
