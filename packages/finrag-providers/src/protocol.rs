use serde_json::Value;

use finrag_domain::{SearchHit, SearchMode};

use crate::{Error, Result, search::SearchRequest};

pub fn endpoint(mode: SearchMode) -> &'static str {
	match mode {
		SearchMode::Lexical => "/search/keyword",
		SearchMode::Vector => "/search/vector",
		SearchMode::Hybrid => "/search/hybrid",
	}
}

/// Runs a search through the standalone search server. The server embeds the query itself, so
/// `request.vector` is ignored.
pub async fn search(
	cfg: &finrag_config::ProtocolProviderConfig,
	request: &SearchRequest,
) -> Result<Vec<SearchHit>> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, endpoint(request.mode));
	let body = serde_json::json!({
		"query": request.text,
		"top": request.top_k,
		"filters": request.filter.as_deref().unwrap_or_default(),
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers("bearer", "", &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_protocol_response(json)
}

fn parse_protocol_response(json: Value) -> Result<Vec<SearchHit>> {
	let items = json
		.get("results")
		.and_then(Value::as_array)
		.ok_or_else(|| Error::response("Search server response is missing results array."))?;

	Ok(items
		.iter()
		.filter(|item| item.is_object())
		.map(|item| {
			crate::search::document_hit(
				item,
				crate::f32_field(item, &["search_score", "@search.score"]).unwrap_or(0.0),
				crate::f32_field(item, &["reranker_score", "@search.rerankerScore"]),
				Vec::new(),
			)
		})
		.collect())
}
