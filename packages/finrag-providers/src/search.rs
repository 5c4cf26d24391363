use serde::Serialize;
use serde_json::Value;

use finrag_domain::{DocumentMetadata, SearchHit, SearchMode, filter};

use crate::{Error, Result};

const SEMANTIC_QUERY_TYPE: &str = "semantic";
const MATCH_ALL: &str = "*";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchRequest {
	pub text: String,
	pub vector: Option<Vec<f32>>,
	pub filter: Option<String>,
	pub top_k: u32,
	pub mode: SearchMode,
}

pub async fn search(
	cfg: &finrag_config::SearchProviderConfig,
	request: &SearchRequest,
) -> Result<Vec<SearchHit>> {
	let json = post_search(cfg, &search_body(cfg, request)).await?;

	parse_search_response(json)
}

/// Fetches the single chunk whose `chunk_id` equals `doc_key`, if the index has it.
pub async fn lookup(
	cfg: &finrag_config::SearchProviderConfig,
	doc_key: &str,
) -> Result<Option<SearchHit>> {
	let body = serde_json::json!({
		"search": MATCH_ALL,
		"filter": filter::chunk_id_filter(doc_key),
		"top": 1,
	});
	let json = post_search(cfg, &body).await?;

	Ok(parse_search_response(json)?.into_iter().next())
}

async fn post_search(cfg: &finrag_config::SearchProviderConfig, body: &Value) -> Result<Value> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = format!(
		"{}/indexes/{}/docs/search?api-version={}",
		cfg.api_base, cfg.index, cfg.api_version
	);
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.auth_header, &cfg.api_key, &cfg.default_headers)?)
		.json(body)
		.send()
		.await?;

	Ok(res.error_for_status()?.json().await?)
}

fn search_body(cfg: &finrag_config::SearchProviderConfig, request: &SearchRequest) -> Value {
	let search_text = match request.mode {
		SearchMode::Vector => MATCH_ALL,
		SearchMode::Lexical | SearchMode::Hybrid => request.text.as_str(),
	};
	let mut body = serde_json::json!({
		"search": search_text,
		"top": request.top_k,
		"queryType": SEMANTIC_QUERY_TYPE,
		"semanticConfiguration": cfg.semantic_configuration,
		"captions": "extractive",
	});

	if let Some(filter) = &request.filter {
		body["filter"] = Value::from(filter.as_str());
	}
	if request.mode != SearchMode::Lexical
		&& let Some(vector) = &request.vector
	{
		body["vectorQueries"] = serde_json::json!([{
			"kind": "vector",
			"vector": vector,
			"k": request.top_k,
			"fields": cfg.vector_field,
		}]);
	}

	body
}

fn parse_search_response(json: Value) -> Result<Vec<SearchHit>> {
	let items = json
		.get("value")
		.and_then(Value::as_array)
		.ok_or_else(|| Error::response("Search response is missing value array."))?;

	Ok(items
		.iter()
		.filter(|item| item.is_object())
		.map(|item| {
			let highlights = item
				.get("@search.captions")
				.and_then(Value::as_array)
				.map(|captions| {
					captions
						.iter()
						.filter_map(|caption| match caption {
							Value::String(text) => Some(text.trim().to_string()),
							other => other
								.get("text")
								.and_then(Value::as_str)
								.map(|text| text.trim().to_string()),
						})
						.filter(|text| !text.is_empty())
						.collect()
				})
				.unwrap_or_default();

			document_hit(
				item,
				crate::f32_field(item, &["@search.score"]).unwrap_or(0.0),
				crate::f32_field(item, &["@search.rerankerScore", "@search.reranker_score"]),
				highlights,
			)
		})
		.collect())
}

/// Maps an index document's fields onto a hit. Missing fields default to empty.
pub fn document_hit(
	item: &Value,
	lexical_score: f32,
	rerank_score: Option<f32>,
	highlights: Vec<String>,
) -> SearchHit {
	let chunk_id = crate::string_field(item, &["chunk_id"]);
	let id = match crate::string_field(item, &["id"]) {
		id if id.is_empty() => chunk_id.clone(),
		id => id,
	};

	SearchHit {
		id,
		content: crate::string_field(item, &["content"]),
		title: crate::string_field(item, &["title"]),
		source: crate::string_field(item, &["source"]),
		metadata: DocumentMetadata {
			company: crate::string_field(item, &["company"]),
			document_type: crate::string_field(item, &["document_type"]),
			filing_date: crate::string_field(item, &["filing_date"]),
			form_type: crate::string_field(item, &["form_type"]),
			ticker: crate::string_field(item, &["ticker"]),
			section_type: crate::string_field(item, &["section_type"]),
			page_number: crate::u64_field(item, &["page_number"]).map(|page| page as u32),
			chunk_id,
			chunk_index: crate::u64_field(item, &["chunk_index"]).map(|index| index as u32),
			document_url: crate::string_field(item, &["document_url"]),
			credibility_score: crate::f32_field(item, &["credibility_score"]).unwrap_or(0.0),
		},
		lexical_score,
		rerank_score,
		highlights,
	}
}
