//! Native app hand-off: which installed app can complete the authorization request.
//!
//! The client public info endpoint lists deep-link descriptors under `custom_protocols`, each
//! entry a JSON-encoded string. The host decides which schemes it can open through
//! [`SchemeProbe`]; the first openable descriptor wins and carries its store link as fallback.

// self
use crate::{
	_prelude::*,
	auth::ClientId,
	clients::{ServiceEndpoints, decode_json},
	http::IdpHttpClient,
	oauth::{self, ApiFacade, CallOptions, Endpoint, TransportErrorMapper},
};

const ENDPOINT: Endpoint = Endpoint::ClientPublicInfo;

/// Host capability that reports whether a URL scheme can be opened on this device.
pub trait SchemeProbe
where
	Self: Send + Sync,
{
	/// Returns true when an installed application handles `scheme` (without `://`).
	fn can_open(&self, scheme: &str) -> bool;
}

/// One deep-link descriptor advertised by the client public info endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AppLinkDescriptor {
	/// Deep-link base URL of the native app.
	pub protocol: String,
	/// Store page to open when the app is missing.
	#[serde(default)]
	pub app_store_link: Option<String>,
}

/// Deep link that hands the authorization request to a native app.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppLink {
	/// Deep link carrying the authorization query.
	pub login_deeplink: Url,
	/// Store fallback for the same app.
	pub app_store_link: Option<Url>,
}

#[derive(Deserialize)]
struct ClientPublicInfo {
	#[serde(default)]
	custom_protocols: Vec<String>,
}

/// Fetches app-link descriptors and resolves the deep link for an authorization request.
pub struct AppLinkClient<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	facade: ApiFacade<C, M>,
}
impl<C, M> AppLinkClient<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client over the provided facade.
	pub fn new(facade: ApiFacade<C, M>) -> Self {
		Self { facade }
	}

	/// Lists the descriptors registered for `client_id`.
	pub async fn fetch_descriptors(
		&self,
		endpoints: &ServiceEndpoints,
		client_id: &ClientId,
		options: &CallOptions,
	) -> Result<Vec<AppLinkDescriptor>> {
		let url = oauth::parse_endpoint(ENDPOINT, &endpoints.client_public_info_for(client_id))?;
		let request = oauth::get_request(ENDPOINT, &url)?;
		let body = self.facade.execute(ENDPOINT, request, options).await?;

		parse_descriptors(&body)
	}

	/// Resolves the deep link for `authorization_url`; `NoAppLinkAvailable` when no registered
	/// app is installed.
	pub async fn resolve(
		&self,
		endpoints: &ServiceEndpoints,
		client_id: &ClientId,
		authorization_url: &Url,
		probe: &dyn SchemeProbe,
		options: &CallOptions,
	) -> Result<AppLink> {
		let descriptors = self.fetch_descriptors(endpoints, client_id, options).await?;
		let descriptor = select_app_link(&descriptors, probe)
			.ok_or_else(|| ENDPOINT.error(ErrorCode::NoAppLinkAvailable))?;

		build_app_link(descriptor, authorization_url)
	}
}
impl<C, M> Debug for AppLinkClient<C, M>
where
	C: ?Sized + IdpHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("AppLinkClient(..)")
	}
}

/// Picks the first descriptor whose deep-link scheme the probe can open.
pub fn select_app_link<'a>(
	descriptors: &'a [AppLinkDescriptor],
	probe: &dyn SchemeProbe,
) -> Option<&'a AppLinkDescriptor> {
	descriptors.iter().find(|descriptor| {
		Url::parse(&descriptor.protocol).is_ok_and(|url| probe.can_open(url.scheme()))
	})
}

pub(crate) fn parse_descriptors(body: &[u8]) -> Result<Vec<AppLinkDescriptor>> {
	let info: ClientPublicInfo = decode_json(ENDPOINT, body)?;

	info.custom_protocols.iter().map(|entry| decode_json(ENDPOINT, entry.as_bytes())).collect()
}

fn build_app_link(descriptor: &AppLinkDescriptor, authorization_url: &Url) -> Result<AppLink> {
	let base = oauth::parse_endpoint(ENDPOINT, &descriptor.protocol)?;
	let login_deeplink = oauth::with_query(base, authorization_url.query_pairs());
	let app_store_link = descriptor
		.app_store_link
		.as_deref()
		.filter(|link| !link.is_empty())
		.map(|link| oauth::parse_endpoint(ENDPOINT, link))
		.transpose()?;

	Ok(AppLink { login_deeplink, app_store_link })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	struct Installed(&'static [&'static str]);
	impl SchemeProbe for Installed {
		fn can_open(&self, scheme: &str) -> bool {
			self.0.iter().any(|installed| *installed == scheme)
		}
	}

	const PUBLIC_INFO: &str = r#"{
		"custom_protocols": [
			"{\"protocol\":\"grab://open\",\"app_store_link\":\"https://apps.example.com/grab\"}",
			"{\"protocol\":\"grabdriver://open\"}"
		]
	}"#;

	#[test]
	fn first_openable_descriptor_wins() {
		let descriptors =
			parse_descriptors(PUBLIC_INFO.as_bytes()).expect("Descriptor list should parse.");

		assert_eq!(descriptors.len(), 2);
		assert_eq!(
			select_app_link(&descriptors, &Installed(&["grab", "grabdriver"]))
				.map(|descriptor| descriptor.protocol.as_str()),
			Some("grab://open")
		);
		assert_eq!(
			select_app_link(&descriptors, &Installed(&["grabdriver"])).map(|d| d.protocol.as_str()),
			Some("grabdriver://open")
		);
		assert!(select_app_link(&descriptors, &Installed(&[])).is_none());
	}

	#[test]
	fn deep_link_carries_authorization_query() {
		let descriptors =
			parse_descriptors(PUBLIC_INFO.as_bytes()).expect("Descriptor list should parse.");
		let authorization_url =
			Url::parse("https://idp/authorize?client_id=partner&state=s%2B1&scope=openid+profile")
				.expect("Authorization URL should parse.");
		let link = build_app_link(&descriptors[0], &authorization_url)
			.expect("Descriptor should produce an app link.");

		assert_eq!(
			link.login_deeplink.as_str(),
			"grab://open?client_id=partner&state=s%2B1&scope=openid+profile"
		);
		assert_eq!(
			link.app_store_link.as_ref().map(Url::as_str),
			Some("https://apps.example.com/grab")
		);
	}

	#[test]
	fn missing_protocol_list_means_no_descriptors() {
		let descriptors = parse_descriptors(b"{}").expect("Empty info should parse.");

		assert!(descriptors.is_empty());
	}
}
