use crate::{model::SearchHit, text};

pub const NO_DOCUMENTS_ANSWER: &str = "No relevant documents found in the knowledge base for your query. Please try rephrasing your question or use more specific terms.";

const TEMPLATE_PREVIEW_CHARS: usize = 300;
const FALLBACK_DOCUMENTS: usize = 3;
const FALLBACK_PREVIEW_CHARS: usize = 200;

/// Answer assembled from excerpts alone, grouped by company in ranking order.
pub fn template_answer(hits: &[SearchHit], method_label: &str) -> String {
	let mut groups: Vec<(&str, Vec<&SearchHit>)> = Vec::new();

	for hit in hits {
		let company = hit.metadata.company.trim();

		match groups.iter_mut().find(|(name, _)| *name == company) {
			Some((_, members)) => members.push(hit),
			None => groups.push((company, vec![hit])),
		}
	}

	let mut lines =
		vec![format!("Based on analysis of {} relevant documents via {method_label}:", hits.len())];

	lines.push(String::new());

	for (company, members) in groups {
		if !company.is_empty() {
			lines.push(format!("**{company}:**"));
		}

		for hit in members {
			let body = if hit.content.trim().is_empty() {
				hit.highlights.first().map(String::as_str).unwrap_or_default()
			} else {
				hit.content.as_str()
			};

			if !body.trim().is_empty() {
				lines.push(format!("• {}", text::preview(body, TEMPLATE_PREVIEW_CHARS)));
			}
		}

		lines.push(String::new());
	}

	lines.join("\n").trim_end().to_string()
}

/// Used when the completion gateway is unavailable: the first excerpts, concatenated.
pub fn excerpt_concatenation(hits: &[SearchHit]) -> String {
	let joined = hits
		.iter()
		.take(FALLBACK_DOCUMENTS)
		.map(|hit| text::clip(hit.content.trim(), FALLBACK_PREVIEW_CHARS).trim_end())
		.filter(|excerpt| !excerpt.is_empty())
		.collect::<Vec<_>>()
		.join(" ");

	format!("Based on the retrieved documents: {joined}...")
}

pub fn methodology_note(method_label: &str, documents: usize) -> String {
	format!(
		"\n\n---\n*This response uses {method_label} with LLM synthesis across {documents} retrieved documents.*"
	)
}

#[cfg(test)]
mod tests {
	use crate::{
		answer::{excerpt_concatenation, methodology_note, template_answer},
		model::{DocumentMetadata, SearchHit},
	};

	fn hit(company: &str, content: &str) -> SearchHit {
		SearchHit {
			id: content.to_string(),
			content: content.to_string(),
			title: String::new(),
			source: String::new(),
			metadata: DocumentMetadata { company: company.to_string(), ..Default::default() },
			lexical_score: 1.0,
			rerank_score: None,
			highlights: Vec::new(),
		}
	}

	#[test]
	fn template_groups_by_company_in_rank_order() {
		let hits =
			vec![hit("Microsoft", "Azure grew."), hit("Apple", "iPhone flat."), hit("Microsoft", "Risk.")];
		let answer = template_answer(&hits, "hybrid search");

		assert_eq!(
			answer,
			"Based on analysis of 3 relevant documents via hybrid search:\n\n**Microsoft:**\n• Azure grew.\n• Risk.\n\n**Apple:**\n• iPhone flat."
		);
	}

	#[test]
	fn unknown_company_has_no_header() {
		let answer = template_answer(&[hit("", "Body.")], "hybrid search");

		assert!(answer.ends_with("\n\n• Body."));
	}

	#[test]
	fn concatenation_uses_first_three_clipped() {
		let long = "w".repeat(500);
		let hits = vec![hit("A", &long), hit("B", "two"), hit("C", "three"), hit("D", "four")];
		let answer = excerpt_concatenation(&hits);

		assert_eq!(answer, format!("Based on the retrieved documents: {} two three...", "w".repeat(200)));
	}

	#[test]
	fn methodology_note_names_method_and_count() {
		assert!(methodology_note("hybrid vector search", 4).contains("hybrid vector search"));
		assert!(methodology_note("hybrid vector search", 4).contains("4 retrieved documents"));
	}
}
