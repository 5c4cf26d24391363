use serde::Serialize;
use serde_json::Value;

use crate::{Error, Result};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlannerMessage {
	pub role: String,
	pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IndexParams {
	pub index_name: String,
	pub reranker_threshold: f32,
	pub top_k: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlanningRequest {
	pub messages: Vec<PlannerMessage>,
	pub index: IndexParams,
	pub max_subqueries: u32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlanningReference {
	pub doc_key: String,
	pub kind: String,
	pub activity_source: Option<u64>,
	/// Inline document payload. Either an object or a (possibly JSON) string.
	pub source_data: Option<Value>,
	pub title: String,
	pub content: String,
	pub chunk_id: String,
	pub score: Option<f32>,
	pub reranker_score: Option<f32>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlanningActivity {
	pub id: Option<u64>,
	pub kind: String,
	pub input_tokens: Option<u64>,
	pub output_tokens: Option<u64>,
	pub elapsed_ms: Option<u64>,
	pub count: Option<u64>,
	pub target_index: Option<String>,
	pub search: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlannerUsage {
	pub prompt_tokens: u64,
	pub completion_tokens: u64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlanningResponse {
	/// `response[0].content[0].text`; empty when absent.
	pub answer_text: String,
	pub references: Vec<PlanningReference>,
	pub activity: Vec<PlanningActivity>,
	pub usage: Option<PlannerUsage>,
	pub query_rewrites: Vec<String>,
	/// False when `activity` was present but not a list.
	pub activity_well_formed: bool,
}

pub async fn retrieve(
	cfg: &finrag_config::PlannerProviderConfig,
	request: &PlanningRequest,
) -> Result<PlanningResponse> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = format!(
		"{}/agents/{}/retrieve?api-version={}",
		cfg.api_base, cfg.agent_name, cfg.api_version
	);
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.auth_header, &cfg.api_key, &cfg.default_headers)?)
		.json(&request_body(request))
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_planning_response(json)
}

fn request_body(request: &PlanningRequest) -> Value {
	let messages: Vec<Value> = request
		.messages
		.iter()
		.map(|message| {
			serde_json::json!({
				"role": message.role,
				"content": [{ "type": "text", "text": message.text }],
			})
		})
		.collect();

	serde_json::json!({
		"messages": messages,
		"targetIndexParams": [{
			"indexName": request.index.index_name,
			"rerankerThreshold": request.index.reranker_threshold,
			"topK": request.index.top_k,
			"includeReferenceSourceData": true,
		}],
		"maxSubqueries": request.max_subqueries,
	})
}

fn parse_planning_response(json: Value) -> Result<PlanningResponse> {
	if !json.is_object() {
		return Err(Error::response("Planning response must be a JSON object."));
	}

	let answer_text = json
		.get("response")
		.and_then(Value::as_array)
		.and_then(|items| items.first())
		.and_then(|item| item.get("content"))
		.and_then(Value::as_array)
		.and_then(|content| content.first())
		.and_then(|content| content.get("text"))
		.and_then(Value::as_str)
		.unwrap_or_default()
		.to_string();
	let references = json
		.get("references")
		.and_then(Value::as_array)
		.map(|items| items.iter().filter(|item| item.is_object()).map(parse_reference).collect())
		.unwrap_or_default();
	let (activity, activity_well_formed) = match json.get("activity") {
		None | Some(Value::Null) => (Vec::new(), true),
		Some(Value::Array(items)) =>
			(items.iter().filter(|item| item.is_object()).map(parse_activity).collect(), true),
		Some(_) => (Vec::new(), false),
	};
	let usage = json.get("usage").filter(|usage| usage.is_object()).map(|usage| PlannerUsage {
		prompt_tokens: crate::u64_field(usage, &["prompt_tokens", "promptTokens", "input_tokens"])
			.unwrap_or(0),
		completion_tokens: crate::u64_field(
			usage,
			&["completion_tokens", "completionTokens", "output_tokens"],
		)
		.unwrap_or(0),
	});
	let query_rewrites = json
		.get("metadata")
		.and_then(|metadata| metadata.get("query_rewrites").or_else(|| metadata.get("queryRewrites")))
		.and_then(Value::as_array)
		.map(|items| {
			items
				.iter()
				.filter_map(Value::as_str)
				.map(str::trim)
				.filter(|rewrite| !rewrite.is_empty())
				.map(str::to_string)
				.collect()
		})
		.unwrap_or_default();

	Ok(PlanningResponse {
		answer_text,
		references,
		activity,
		usage,
		query_rewrites,
		activity_well_formed,
	})
}

fn parse_reference(item: &Value) -> PlanningReference {
	let source_data = item
		.get("sourceData")
		.or_else(|| item.get("source_data"))
		.filter(|data| match data {
			Value::Null => false,
			Value::String(raw) => !raw.trim().is_empty(),
			Value::Object(obj) => !obj.is_empty(),
			_ => true,
		})
		.cloned();

	PlanningReference {
		doc_key: crate::string_field(item, &["docKey", "doc_key"]),
		kind: crate::string_field(item, &["type"]),
		activity_source: crate::u64_field(item, &["activitySource", "activity_source"]),
		source_data,
		title: crate::string_field(item, &["title"]),
		content: crate::string_field(item, &["content"]),
		chunk_id: crate::string_field(item, &["chunk_id", "chunkId"]),
		score: crate::f32_field(item, &["score"]),
		reranker_score: crate::f32_field(item, &["rerankerScore", "reranker_score"]),
	}
}

fn parse_activity(item: &Value) -> PlanningActivity {
	let query = item.get("query");
	let search = query
		.and_then(|query| match query {
			Value::String(raw) => Some(raw.as_str()),
			other => other.get("search").and_then(Value::as_str),
		})
		.map(str::trim)
		.filter(|search| !search.is_empty())
		.map(str::to_string);

	PlanningActivity {
		id: crate::u64_field(item, &["id"]),
		kind: crate::string_field(item, &["type"]),
		input_tokens: crate::u64_field(item, &["inputTokens", "input_tokens"]),
		output_tokens: crate::u64_field(item, &["outputTokens", "output_tokens"]),
		elapsed_ms: crate::u64_field(item, &["elapsedMs", "elapsed_ms"]),
		count: crate::u64_field(item, &["count"]),
		target_index: Some(crate::string_field(item, &["targetIndex", "target_index"]))
			.filter(|index| !index.is_empty()),
		search,
	}
}
