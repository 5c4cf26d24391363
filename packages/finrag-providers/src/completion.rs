use serde::Serialize;
use serde_json::Value;

use crate::{Error, Result};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompletionRequest {
	pub system: String,
	pub user: String,
	pub temperature: f32,
	pub max_tokens: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Completion {
	pub text: String,
	pub prompt_tokens: u64,
	pub completion_tokens: u64,
}

pub async fn complete(
	cfg: &finrag_config::LlmProviderConfig,
	request: &CompletionRequest,
) -> Result<Completion> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": request.temperature,
		"max_tokens": request.max_tokens,
		"messages": [
			{ "role": "system", "content": request.system },
			{ "role": "user", "content": request.user },
		],
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.auth_header, &cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_completion_response(json)
}

fn parse_completion_response(json: Value) -> Result<Completion> {
	let text = json
		.get("choices")
		.and_then(Value::as_array)
		.and_then(|choices| choices.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(Value::as_str)
		.map(str::trim)
		.filter(|content| !content.is_empty())
		.ok_or_else(|| Error::response("Completion response is missing message content."))?;
	let usage = json.get("usage");
	let prompt_tokens =
		usage.and_then(|usage| usage.get("prompt_tokens")).and_then(Value::as_u64).unwrap_or(0);
	let completion_tokens = usage
		.and_then(|usage| usage.get("completion_tokens"))
		.and_then(Value::as_u64)
		.unwrap_or(0);

	Ok(Completion { text: text.to_string(), prompt_tokens, completion_tokens })
}
