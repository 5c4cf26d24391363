use serde_json::Value;

use crate::{Error, Result};

pub async fn embed(
	cfg: &finrag_config::EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let mut body = serde_json::json!({ "model": cfg.model, "input": texts });

	if let Some(dimensions) = cfg.dimensions {
		body["dimensions"] = Value::from(dimensions);
	}

	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.auth_header, &cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let vectors = parse_embedding_response(json)?;

	if vectors.len() != texts.len() {
		return Err(Error::response(format!(
			"Embedding response has {} vectors for {} inputs.",
			vectors.len(),
			texts.len()
		)));
	}

	Ok(vectors)
}

fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json
		.get("data")
		.and_then(Value::as_array)
		.ok_or_else(|| Error::response("Embedding response is missing data array."))?;
	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(Value::as_u64)
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding = item
			.get("embedding")
			.and_then(Value::as_array)
			.ok_or_else(|| Error::response("Embedding item missing embedding array."))?;
		let vec = embedding
			.iter()
			.map(|value| {
				value
					.as_f64()
					.map(|number| number as f32)
					.ok_or_else(|| Error::response("Embedding value must be numeric."))
			})
			.collect::<Result<Vec<_>>>()?;

		indexed.push((index, vec));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}
