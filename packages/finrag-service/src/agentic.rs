pub mod activity;
pub mod references;

use finrag_config::Config;
use finrag_domain::{
	Citation, ConversationTurn, Query, Role, SynthesisResult, TokenBreakdown, TokenUsage,
	grounding::{self, AnswerPayload, GroundingItem},
	prompt::{PromptDocument, PromptTemplate},
	text,
};
use finrag_providers::{
	completion::CompletionRequest,
	planner::{IndexParams, PlannerMessage, PlanningRequest},
};

use crate::{
	FinragService, Result, Stage, UsageEntry, elapsed_ms,
	fallback::{Attempt, FallbackChain, Tier},
	guarded,
	synthesize::Run,
};

pub const RETRIEVAL_METHOD: &str = "agentic_retrieval";

struct Answer {
	text: String,
	prompt_tokens: u64,
	completion_tokens: u64,
}
impl Answer {
	fn deterministic(text: String) -> Self {
		Self { text, prompt_tokens: 0, completion_tokens: 0 }
	}
}

/// Planner messages: recent user/assistant turns, then the question in an analyst brief.
pub fn planning_request(
	question: &str,
	history: &[ConversationTurn],
	cfg: &Config,
) -> PlanningRequest {
	let agentic = &cfg.agentic;
	let turns: Vec<(&str, &str)> = history
		.iter()
		.filter_map(|turn| {
			let role = match turn.role {
				Role::User => "user",
				Role::Assistant => "assistant",
				Role::System | Role::Other => return None,
			};
			let content = turn.content.trim();

			(!content.is_empty()).then_some((role, content))
		})
		.collect();
	let start = turns.len().saturating_sub(agentic.history_turns as usize);
	let mut messages: Vec<PlannerMessage> = turns[start..]
		.iter()
		.map(|(role, content)| PlannerMessage {
			role: role.to_string(),
			text: text::clip(content, agentic.history_chars as usize).trim_end().to_string(),
		})
		.collect();

	messages.push(PlannerMessage { role: "user".to_string(), text: analyst_brief(question) });

	PlanningRequest {
		messages,
		index: IndexParams {
			index_name: cfg.providers.search.index.clone(),
			reranker_threshold: agentic.reranker_threshold,
			top_k: agentic.top_k,
		},
		max_subqueries: agentic.max_subqueries,
	}
}

fn analyst_brief(question: &str) -> String {
	format!(
		"Please analyze the following financial question using the available SEC filings, earnings reports and corporate documents. Answer as a financial analyst, with specific citations.

Question: {}

Please provide:
- Detailed financial analysis based on the available documents
- Citations with document references (company, filing type, date)
- Key metrics, trends and comparisons where applicable
- A clear structure with a citation for every claim

Focus on factual data from the indexed financial documents.",
		question.trim()
	)
}

impl FinragService {
	/// Agentic strategy. A planning failure is returned as an error; nothing else fails.
	pub(crate) async fn agentic(&self, query: &Query, run: &Run) -> Result<SynthesisResult> {
		let question = query.text.trim();
		let planner_cfg = &self.cfg.providers.planner;
		let request = planning_request(question, &query.history, &self.cfg);
		let response = guarded(
			Stage::Planning,
			planner_cfg.timeout_ms,
			self.providers.planner.retrieve(planner_cfg, &request),
		)
		.await?;
		let planning = activity::planning_tokens(&response);

		self.record(
			run,
			UsageEntry::succeeded(
				Stage::Planning.as_str(),
				planning.prompt_tokens,
				planning.completion_tokens,
			),
		);

		let steps = activity::steps(&response, &self.cfg.providers.search.index);
		let citations = self.reference_citations(&response.references, run).await;

		tracing::info!(
			query_id = %run.query_id,
			references = response.references.len(),
			citations = citations.len(),
			steps = steps.len(),
			planning_tokens = planning.total(),
			"Planning finished."
		);

		let payload = grounding::classify_answer(&response.answer_text);
		let items = match payload {
			AnswerPayload::Grounding(ref items) if !items.is_empty() => items.clone(),
			_ => references::grounding_from_references(&response.references),
		};
		let answer = self.agentic_answer(question, &payload, &items, run).await;
		let synthesis_tokens = answer.prompt_tokens + answer.completion_tokens;
		let token_usage = TokenUsage::new(
			planning.prompt_tokens + answer.prompt_tokens,
			planning.completion_tokens + answer.completion_tokens,
		)
		.with_breakdown(TokenBreakdown {
			planning: planning.planning,
			ranking: planning.ranking,
			synthesis: synthesis_tokens,
		});
		let mut query_rewrites = activity::query_rewrites(&response);

		if query_rewrites.is_empty() {
			query_rewrites.push(question.to_string());
		}

		Ok(SynthesisResult {
			query_id: run.query_id,
			tracking_id: Some(run.tracking_id),
			answer: answer.text,
			documents_retrieved: citations.len(),
			average_relevance_score: average_score(&citations),
			semantic_ranking_used: citations.iter().any(|citation| citation.rerank_score.is_some()),
			citations,
			query_rewrites,
			token_usage,
			retrieval_method: RETRIEVAL_METHOD.to_string(),
			processing_time_ms: elapsed_ms(run.started),
			success: true,
			activity_steps: steps,
		})
	}

	/// Prose is used as-is; grounding data is re-synthesized, then summarized as a last resort.
	async fn agentic_answer(
		&self,
		question: &str,
		payload: &AnswerPayload,
		items: &[GroundingItem],
		run: &Run,
	) -> Answer {
		let summary_items = self.cfg.agentic.summary_items as usize;
		let resolved = FallbackChain::new(Stage::Completion, run.query_id)
			.tier(Tier::new("prose", async {
				match payload {
					AnswerPayload::Prose(text) =>
						Attempt::Done(Answer::deterministic(text.clone())),
					AnswerPayload::Grounding(_) | AnswerPayload::Empty => Attempt::TryNext(None),
				}
			}))
			.tier(Tier::new("resynthesis", async {
				if items.is_empty() {
					return Attempt::TryNext(None);
				}

				match self.resynthesize(question, items, run).await {
					Ok(answer) => Attempt::Done(answer),
					Err(err) => Attempt::TryNext(Some(err)),
				}
			}))
			.settle("structured_summary", async {
				let text = if items.is_empty() {
					grounding::NO_GROUNDING_ANSWER.to_string()
				} else {
					grounding::structured_summary(items, summary_items)
				};

				Answer::deterministic(text)
			})
			.await;

		self.record_failures(run, &resolved.failures);

		resolved.value
	}

	async fn resynthesize(
		&self,
		question: &str,
		items: &[GroundingItem],
		run: &Run,
	) -> Result<Answer> {
		let agentic = &self.cfg.agentic;
		let documents: Vec<PromptDocument> = items.iter().map(PromptDocument::from).collect();
		let prompt = PromptTemplate::grounding(
			agentic.grounding_items as usize,
			agentic.grounding_excerpt_chars as usize,
		)
		.render(question, &[], &documents);
		let request = CompletionRequest {
			system: prompt.system,
			user: prompt.user,
			temperature: self.cfg.synthesis.temperature,
			max_tokens: self.cfg.synthesis.max_tokens,
		};
		let completion_cfg = &self.cfg.providers.completion;
		let completion = guarded(
			Stage::Completion,
			completion_cfg.timeout_ms,
			self.providers.completion.complete(completion_cfg, &request),
		)
		.await?;
		let text = completion.text.trim();

		match grounding::classify_answer(text) {
			AnswerPayload::Prose(_) => {},
			AnswerPayload::Grounding(_) =>
				return Err(Stage::Completion.error("Re-synthesis returned grounding data.")),
			AnswerPayload::Empty => return Err(Stage::Completion.error("Re-synthesis was empty.")),
		}

		self.record(
			run,
			UsageEntry::succeeded("synthesis", completion.prompt_tokens, completion.completion_tokens),
		);

		Ok(Answer {
			text: text.to_string(),
			prompt_tokens: completion.prompt_tokens,
			completion_tokens: completion.completion_tokens,
		})
	}
}

fn average_score(citations: &[Citation]) -> f32 {
	if citations.is_empty() {
		return 0.0;
	}

	let sum: f32 = citations.iter().map(|citation| citation.lexical_score).sum();

	text::round3(sum / citations.len() as f32)
}

#[cfg(test)]
mod tests {
	use std::path::Path;

	use finrag_config::Config;
	use finrag_domain::{ConversationTurn, Role};

	use crate::agentic::planning_request;

	fn config() -> Config {
		let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/service.toml");

		finrag_config::load(&path).expect("Failed to load test config.")
	}

	#[test]
	fn planning_request_keeps_recent_conversational_turns() {
		let mut cfg = config();

		cfg.agentic.history_turns = 2;
		cfg.agentic.history_chars = 5;

		let history = vec![
			ConversationTurn::new(Role::User, "first question"),
			ConversationTurn::new(Role::System, "system note"),
			ConversationTurn::new(Role::Assistant, "   "),
			ConversationTurn::new(Role::Assistant, "answer one"),
			ConversationTurn::new(Role::User, "second question"),
		];
		let request = planning_request("Why?", &history, &cfg);
		let roles: Vec<_> = request.messages.iter().map(|message| message.role.as_str()).collect();

		assert_eq!(roles, vec!["assistant", "user", "user"]);
		assert_eq!(request.messages[0].text, "answe");
		assert!(request.messages[2].text.contains("Question: Why?"));
		assert_eq!(request.index.index_name, cfg.providers.search.index);
		assert_eq!(request.max_subqueries, cfg.agentic.max_subqueries);
	}
}
