use serde_json::{Map, Value};

use finrag_domain::{
	Citation, SearchHit, citation, doc_key,
	grounding::{self, GroundingItem},
	text,
};
use finrag_providers::{planner::PlanningReference, search};

use crate::{FinragService, Stage, UsageEntry, guarded, synthesize::Run};

pub const PLACEHOLDER_CONTENT: &str = "Content available in financial document";

const RAW_SOURCE_CHARS: usize = 500;

/// Inline source data of a reference as an object.
///
/// Arrays yield their first object. A JSON-encoded string is decoded the same way; any other
/// string becomes the `content` field.
pub fn source_object(reference: &PlanningReference) -> Option<Map<String, Value>> {
	match reference.source_data.as_ref()? {
		Value::String(raw) => {
			let raw = raw.trim();

			match serde_json::from_str::<Value>(raw) {
				Ok(value @ (Value::Object(_) | Value::Array(_))) => first_object(&value),
				_ if grounding::opens_json_structure(raw) => None,
				_ => {
					let mut obj = Map::new();

					obj.insert(
						"content".to_string(),
						Value::String(text::clip(raw, RAW_SOURCE_CHARS).to_string()),
					);

					Some(obj)
				},
			}
		},
		other => first_object(other),
	}
}

fn first_object(value: &Value) -> Option<Map<String, Value>> {
	match value {
		Value::Object(obj) => Some(obj.clone()),
		Value::Array(items) => items.iter().find_map(Value::as_object).cloned(),
		_ => None,
	}
}

/// Merges what the reference itself carries into `hit` without overriding document fields.
pub fn merge_reference(
	mut hit: SearchHit,
	reference: &PlanningReference,
	ordinal: usize,
) -> SearchHit {
	if hit.title.trim().is_empty() {
		hit.title = if reference.title.is_empty() {
			doc_key::title_from_doc_key(&reference.doc_key, ordinal)
		} else {
			reference.title.clone()
		};
	}
	if hit.content.trim().is_empty() {
		hit.content = if reference.content.is_empty() {
			PLACEHOLDER_CONTENT.to_string()
		} else {
			reference.content.clone()
		};
	}
	if hit.metadata.chunk_id.is_empty() {
		hit.metadata.chunk_id = if reference.chunk_id.is_empty() {
			reference.doc_key.clone()
		} else {
			reference.chunk_id.clone()
		};
	}
	if hit.id.is_empty() {
		hit.id = hit.metadata.chunk_id.clone();
	}
	if let Some(score) = reference.score
		&& hit.lexical_score == 0.0
	{
		hit.lexical_score = score;
	}
	if hit.rerank_score.is_none() {
		hit.rerank_score = reference.reranker_score;
	}

	hit
}

/// Grounding items recovered from reference source data, for when the answer carried none.
pub fn grounding_from_references(references: &[PlanningReference]) -> Vec<GroundingItem> {
	references
		.iter()
		.map(|reference| {
			let mut item = source_object(reference)
				.map(|obj| GroundingItem::from_object(&obj))
				.unwrap_or_default();

			if item.title.is_none() && !reference.title.is_empty() {
				item.title = Some(reference.title.clone());
			}
			if item.content.trim().is_empty() {
				item.content = reference.content.clone();
			}

			item
		})
		.filter(|item| !item.content.trim().is_empty())
		.collect()
}

impl FinragService {
	/// One citation per reference, in reference order.
	///
	/// References without source data are looked up by doc key; a failed lookup degrades to a
	/// citation built from the reference alone.
	pub(crate) async fn reference_citations(
		&self,
		references: &[PlanningReference],
		run: &Run,
	) -> Vec<Citation> {
		let max_excerpt_chars = self.cfg.citations.max_excerpt_chars as usize;
		let mut citations = Vec::with_capacity(references.len());

		for (idx, reference) in references.iter().enumerate() {
			let ordinal = idx + 1;
			let hit = match source_object(reference) {
				Some(obj) => Some(search::document_hit(
					&Value::Object(obj),
					reference.score.unwrap_or(0.0),
					reference.reranker_score,
					Vec::new(),
				)),
				None => self.lookup_reference(reference, run).await,
			}
			.unwrap_or_else(|| SearchHit {
				id: String::new(),
				content: String::new(),
				title: String::new(),
				source: String::new(),
				metadata: Default::default(),
				lexical_score: reference.score.unwrap_or(0.0),
				rerank_score: reference.reranker_score,
				highlights: Vec::new(),
			});
			let hit = merge_reference(hit, reference, ordinal);

			citations.push(citation::citation_from_hit(&hit, ordinal as u32, max_excerpt_chars));
		}

		citations
	}

	async fn lookup_reference(
		&self,
		reference: &PlanningReference,
		run: &Run,
	) -> Option<SearchHit> {
		if reference.doc_key.trim().is_empty() {
			return None;
		}

		let search_cfg = &self.cfg.providers.search;

		match guarded(
			Stage::Search,
			search_cfg.timeout_ms,
			self.providers.search.lookup(search_cfg, reference.doc_key.trim()),
		)
		.await
		{
			Ok(hit) => hit,
			Err(err) => {
				tracing::warn!(
					error = %err,
					stage = err.stage(),
					query_id = %run.query_id,
					"Reference lookup failed; using the reference key."
				);

				self.record(run, UsageEntry::failed(&err));

				None
			},
		}
	}
}
