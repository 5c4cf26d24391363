use crate::{
	model::{Citation, SearchHit},
	text,
};

/// Maps ranked hits to citations, one per hit, numbered 1..N in input order.
pub fn build_citations(hits: &[SearchHit], max_excerpt_chars: usize) -> Vec<Citation> {
	hits.iter()
		.enumerate()
		.map(|(idx, hit)| citation_from_hit(hit, idx as u32 + 1, max_excerpt_chars))
		.collect()
}

pub fn citation_from_hit(hit: &SearchHit, ordinal: u32, max_excerpt_chars: usize) -> Citation {
	let meta = &hit.metadata;
	let title =
		if hit.title.trim().is_empty() { format!("Document {ordinal}") } else { hit.title.clone() };

	Citation {
		id: ordinal,
		title,
		content: excerpt_for(hit, max_excerpt_chars),
		source: hit.source.clone(),
		company: meta.company.clone(),
		document_type: meta.document_type.clone(),
		filing_date: meta.filing_date.clone(),
		form_type: meta.form_type.clone(),
		ticker: meta.ticker.clone(),
		section_type: meta.section_type.clone(),
		page_number: meta.page_number,
		chunk_id: meta.chunk_id.clone(),
		document_url: meta.document_url.clone(),
		lexical_score: hit.lexical_score,
		rerank_score: hit.rerank_score,
		credibility_score: meta.credibility_score,
	}
}

fn excerpt_for(hit: &SearchHit, max_excerpt_chars: usize) -> String {
	let source = hit
		.highlights
		.iter()
		.map(|highlight| highlight.trim())
		.find(|highlight| !highlight.is_empty())
		.unwrap_or(hit.content.as_str());

	text::excerpt(source, max_excerpt_chars)
}
