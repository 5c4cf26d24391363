use std::{cmp::Ordering, collections::HashSet};

use serde::Serialize;

use crate::{model::SearchHit, text};

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RetrievalMetrics {
	pub documents_retrieved: usize,
	pub average_relevance_score: f32,
	pub semantic_ranking_used: bool,
}

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

pub fn passes_thresholds(hit: &SearchHit, score_threshold: f32, rerank_threshold: f32) -> bool {
	if hit.lexical_score.is_nan() || hit.lexical_score < score_threshold {
		return false;
	}

	match hit.rerank_score {
		Some(rerank) => rerank >= rerank_threshold,
		None => true,
	}
}

/// Drops hits below either threshold, then orders by `(rerank or 0, lexical)` descending.
///
/// Ties keep retrieval order. Repeated keys keep only their best-ranked occurrence.
pub fn filter_and_rank(
	hits: Vec<SearchHit>,
	score_threshold: f32,
	rerank_threshold: f32,
) -> Vec<SearchHit> {
	let mut kept: Vec<SearchHit> = hits
		.into_iter()
		.filter(|hit| passes_thresholds(hit, score_threshold, rerank_threshold))
		.collect();

	// `sort_by` is stable, so equal keys stay in retrieval order.
	kept.sort_by(|a, b| {
		cmp_f32_desc(a.rerank_score.unwrap_or(0.0), b.rerank_score.unwrap_or(0.0))
			.then_with(|| cmp_f32_desc(a.lexical_score, b.lexical_score))
	});

	let mut seen = HashSet::new();

	kept.retain(|hit| match hit.dedup_key() {
		Some(key) => seen.insert(key.to_string()),
		None => true,
	});

	kept
}

pub fn summarize(hits: &[SearchHit]) -> RetrievalMetrics {
	let average = if hits.is_empty() {
		0.0
	} else {
		hits.iter().map(|hit| hit.lexical_score).sum::<f32>() / hits.len() as f32
	};

	RetrievalMetrics {
		documents_retrieved: hits.len(),
		average_relevance_score: text::round3(average),
		semantic_ranking_used: hits.iter().any(|hit| hit.rerank_score.is_some()),
	}
}
