use finrag_domain::{
	Mode, Query, SearchHit, SearchMode, SynthesisResult, TokenUsage, answer, citation, context,
	filter,
	prompt::{HistoryWindow, PromptDocument, PromptTemplate},
	scoring,
};
use finrag_providers::{completion::CompletionRequest, search::SearchRequest};

use crate::{
	FinragService, Stage, UsageEntry, elapsed_ms,
	fallback::{FallbackChain, Tier},
	guarded,
	synthesize::Run,
};

const TEMPLATE_ANSWER: &str = "template";

/// How documents were retrieved, as reported on the result and in the answer text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetrievalMethod {
	pub name: &'static str,
	pub label: &'static str,
}
impl RetrievalMethod {
	pub const HYBRID: Self = Self { name: "hybrid_vector_search", label: "hybrid vector search" };
	pub const LEXICAL: Self = Self { name: "lexical_search", label: "lexical search" };
	pub const PROTOCOL: Self =
		Self { name: "protocol_hybrid_search", label: "protocol-mediated hybrid search" };
}

struct Answer {
	text: String,
	usage: TokenUsage,
}

impl FinragService {
	/// Fast and protocol strategies: one retrieval, local ranking, then template or LLM answer.
	pub(crate) async fn fast(&self, query: &Query, mode: Mode, run: &Run) -> SynthesisResult {
		let question = query.text.trim();
		let composed = context::compose(
			question,
			&query.history,
			&self.cfg.context,
			self.synthesis_window(),
		);
		let top_k = self.fast_top_k(query, mode);
		let filter = filter::filter_expression(&query.filters);
		let (hits, method) = if mode == Mode::Protocol {
			(
				self.protocol_search(&composed.retrieval_query, filter, top_k, run).await,
				RetrievalMethod::PROTOCOL,
			)
		} else {
			self.direct_search(&composed.retrieval_query, filter, top_k, run).await
		};
		let retrieved = hits.len();
		let retrieval = &self.cfg.retrieval;
		let ranked =
			scoring::filter_and_rank(hits, retrieval.score_threshold, retrieval.rerank_threshold);

		tracing::info!(
			query_id = %run.query_id,
			retrieval_method = method.name,
			retrieved,
			kept = ranked.len(),
			"Retrieval finished."
		);

		if ranked.is_empty() {
			return self.no_documents(question, method, run);
		}

		let citations =
			citation::build_citations(&ranked, self.cfg.citations.max_excerpt_chars as usize);
		let metrics = scoring::summarize(&ranked);
		let answer = if self.cfg.synthesis.fast_answer == TEMPLATE_ANSWER {
			let text = answer::template_answer(&ranked, method.label);

			Answer { text, usage: TokenUsage::zero() }
		} else {
			self.llm_answer(question, &composed.conversation, &ranked, method, run).await
		};

		SynthesisResult {
			query_id: run.query_id,
			tracking_id: Some(run.tracking_id),
			answer: answer.text,
			citations,
			query_rewrites: vec![question.to_string()],
			token_usage: answer.usage,
			retrieval_method: method.name.to_string(),
			processing_time_ms: elapsed_ms(run.started),
			success: true,
			activity_steps: Vec::new(),
			documents_retrieved: metrics.documents_retrieved,
			average_relevance_score: metrics.average_relevance_score,
			semantic_ranking_used: metrics.semantic_ranking_used,
		}
	}

	fn synthesis_window(&self) -> HistoryWindow {
		HistoryWindow {
			turns: self.cfg.synthesis.history_turns as usize,
			chars: self.cfg.synthesis.history_chars as usize,
		}
	}

	/// A caller-supplied `top_k` is capped at `retrieval.top_k`, else the mode default applies.
	fn fast_top_k(&self, query: &Query, mode: Mode) -> u32 {
		let retrieval = &self.cfg.retrieval;
		let default =
			if mode == Mode::Protocol { retrieval.protocol_top_k } else { retrieval.fast_top_k };

		query
			.top_k
			.filter(|top_k| *top_k > 0)
			.map(|top_k| top_k.min(retrieval.top_k))
			.unwrap_or(default)
	}

	async fn direct_search(
		&self,
		text: &str,
		filter: Option<String>,
		top_k: u32,
		run: &Run,
	) -> (Vec<SearchHit>, RetrievalMethod) {
		let embedding_cfg = &self.cfg.providers.embedding;
		let inputs = vec![text.to_string()];
		let vector = FallbackChain::new(Stage::Embedding, run.query_id)
			.tier(Tier::fallible("hybrid", async {
				let vectors = guarded(
					Stage::Embedding,
					embedding_cfg.timeout_ms,
					self.providers.embedding.embed(embedding_cfg, &inputs),
				)
				.await?;

				vectors
					.into_iter()
					.next()
					.filter(|vector| !vector.is_empty())
					.map(Some)
					.ok_or_else(|| Stage::Embedding.error("Embedding response had no vector."))
			}))
			.settle("lexical", async { None })
			.await;

		self.record_failures(run, &vector.failures);

		let (mode, method) = match vector.value {
			Some(_) => (SearchMode::Hybrid, RetrievalMethod::HYBRID),
			None => (SearchMode::Lexical, RetrievalMethod::LEXICAL),
		};
		let request =
			SearchRequest { text: text.to_string(), vector: vector.value, filter, top_k, mode };
		let search_cfg = &self.cfg.providers.search;
		let hits = FallbackChain::new(Stage::Search, run.query_id)
			.tier(Tier::fallible(
				"search",
				guarded(
					Stage::Search,
					search_cfg.timeout_ms,
					self.providers.search.search(search_cfg, &request),
				),
			))
			.settle("empty", async { Vec::new() })
			.await;

		self.record_failures(run, &hits.failures);

		(hits.value, method)
	}

	async fn protocol_search(
		&self,
		text: &str,
		filter: Option<String>,
		top_k: u32,
		run: &Run,
	) -> Vec<SearchHit> {
		let request = SearchRequest {
			text: text.to_string(),
			vector: None,
			filter,
			top_k,
			mode: SearchMode::Hybrid,
		};
		let protocol_cfg = &self.cfg.providers.protocol;
		let hits = FallbackChain::new(Stage::Search, run.query_id)
			.tier(Tier::fallible(
				"protocol",
				guarded(
					Stage::Search,
					protocol_cfg.timeout_ms,
					self.providers.protocol.search(protocol_cfg, &request),
				),
			))
			.settle("empty", async { Vec::new() })
			.await;

		self.record_failures(run, &hits.failures);

		hits.value
	}

	async fn llm_answer(
		&self,
		question: &str,
		conversation: &str,
		ranked: &[SearchHit],
		method: RetrievalMethod,
		run: &Run,
	) -> Answer {
		let synthesis = &self.cfg.synthesis;
		let documents: Vec<PromptDocument> = ranked.iter().map(PromptDocument::from).collect();
		let prompt = PromptTemplate::answer(
			synthesis.max_documents as usize,
			synthesis.document_excerpt_chars as usize,
			self.synthesis_window(),
		)
		.render_with_conversation(conversation, question, &documents);
		let request = CompletionRequest {
			system: prompt.system,
			user: prompt.user,
			temperature: synthesis.temperature,
			max_tokens: synthesis.max_tokens,
		};
		let completion_cfg = &self.cfg.providers.completion;
		let resolved = FallbackChain::new(Stage::Completion, run.query_id)
			.tier(Tier::fallible("llm", async {
				let completion = guarded(
					Stage::Completion,
					completion_cfg.timeout_ms,
					self.providers.completion.complete(completion_cfg, &request),
				)
				.await?;
				let mut text = completion.text.trim().to_string();

				if text.is_empty() {
					return Err(Stage::Completion.error("Completion text was empty."));
				}
				if synthesis.methodology_note {
					text.push_str(&answer::methodology_note(method.label, ranked.len()));
				}

				self.record(
					run,
					UsageEntry::succeeded(
						Stage::Completion.as_str(),
						completion.prompt_tokens,
						completion.completion_tokens,
					),
				);

				Ok(Answer {
					text,
					usage: TokenUsage::new(completion.prompt_tokens, completion.completion_tokens),
				})
			}))
			.settle("excerpts", async {
				Answer { text: answer::excerpt_concatenation(ranked), usage: TokenUsage::zero() }
			})
			.await;

		self.record_failures(run, &resolved.failures);

		resolved.value
	}

	fn no_documents(&self, question: &str, method: RetrievalMethod, run: &Run) -> SynthesisResult {
		SynthesisResult {
			query_id: run.query_id,
			tracking_id: Some(run.tracking_id),
			answer: answer::NO_DOCUMENTS_ANSWER.to_string(),
			citations: Vec::new(),
			query_rewrites: vec![question.to_string()],
			token_usage: TokenUsage::zero(),
			retrieval_method: method.name.to_string(),
			processing_time_ms: elapsed_ms(run.started),
			success: true,
			activity_steps: Vec::new(),
			documents_retrieved: 0,
			average_relevance_score: 0.0,
			semantic_ranking_used: false,
		}
	}
}
