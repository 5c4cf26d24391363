pub mod completion;
pub mod embedding;
pub mod error;
pub mod planner;
pub mod protocol;
pub mod search;

pub use error::{Error, Result};

use std::time::Duration;

use reqwest::{
	Client,
	header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
};
use serde_json::{Map, Value};

const API_KEY_HEADER: &str = "api-key";

/// Builds request headers for `auth_header` (`bearer` or `api-key`) plus configured defaults.
///
/// An empty `api_key` sends no credential header.
pub fn auth_headers(
	auth_header: &str,
	api_key: &str,
	default_headers: &Map<String, Value>,
) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	if !api_key.is_empty() {
		match auth_header {
			"bearer" => {
				headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);
			},
			"api-key" => {
				headers.insert(HeaderName::from_static(API_KEY_HEADER), api_key.parse()?);
			},
			other => {
				return Err(Error::InvalidConfig {
					message: format!("Unsupported auth_header '{other}'."),
				});
			},
		}
	}

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, HeaderValue::from_str(raw)?);
	}

	Ok(headers)
}

pub(crate) fn client(timeout_ms: u64) -> Result<Client> {
	Ok(Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?)
}

pub(crate) fn str_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
	keys.iter().find_map(|key| value.get(*key).and_then(Value::as_str))
}

pub(crate) fn string_field(value: &Value, keys: &[&str]) -> String {
	str_field(value, keys).map(|raw| raw.trim().to_string()).unwrap_or_default()
}

pub(crate) fn f32_field(value: &Value, keys: &[&str]) -> Option<f32> {
	keys.iter().find_map(|key| value.get(*key).and_then(Value::as_f64)).map(|raw| raw as f32)
}

pub(crate) fn u64_field(value: &Value, keys: &[&str]) -> Option<u64> {
	keys.iter().find_map(|key| value.get(*key).and_then(Value::as_u64))
}
