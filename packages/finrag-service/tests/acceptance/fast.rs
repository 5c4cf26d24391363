use serde_json::json;

use finrag_domain::{ConversationTurn, Query, Role, SearchMode, answer::NO_DOCUMENTS_ANSWER};

use super::{
	COMPLETION_TOKENS, FakeGateways, Harness, PROMPT_TOKENS, Script, hit, prose, test_config,
};

const QUESTION: &str = "What are Microsoft's risk factors?";

#[tokio::test]
async fn template_answer_keeps_only_hits_above_threshold() {
	let mut cfg = test_config();

	cfg.synthesis.fast_answer = "template".to_string();

	let harness = Harness::with_config(
		cfg,
		Script {
			hits: vec![hit("m", "Microsoft", 0.9, None), hit("a", "Apple", 0.005, None)],
			..Default::default()
		},
	);
	let result = harness.service.synthesize(&Query::new(QUESTION, "fast")).await;

	assert!(result.success);
	assert_eq!(result.citations.len(), 1);
	assert_eq!(result.citations[0].company, "Microsoft");
	assert_eq!(result.citations[0].id, 1);
	assert_eq!(result.token_usage.total_tokens, 0);
	assert_eq!(result.retrieval_method, "hybrid_vector_search");
	assert!(
		result.answer.starts_with("Based on analysis of 1 relevant documents via hybrid vector search:")
	);
	assert!(result.answer.contains("**Microsoft:**"));
	assert!(!result.answer.contains("Apple"));
	assert_eq!(FakeGateways::count(&harness.fakes.calls.completion), 0);
}

#[tokio::test]
async fn embedding_failure_degrades_to_lexical_search() {
	let harness = Harness::new(Script {
		embedding_fails: true,
		hits: vec![hit("m", "Microsoft", 0.9, Some(2.1))],
		completion_text: Some(prose()),
		..Default::default()
	});
	let result = harness.service.synthesize(&Query::new(QUESTION, "fast")).await;
	let request = harness.fakes.last_search();

	assert!(result.success);
	assert_eq!(result.retrieval_method, "lexical_search");
	assert_eq!(request.mode, SearchMode::Lexical);
	assert!(request.vector.is_none());
	assert_eq!(result.citations.len(), 1);
	assert!(result.answer.contains("lexical search"));

	let record = harness
		.service
		.ledger()
		.record(result.tracking_id.expect("Missing tracking id."))
		.expect("Missing usage record.");

	assert!(record.entries.iter().any(|entry| entry.stage == "embedding" && !entry.success));
}

#[tokio::test]
async fn search_failure_returns_no_documents_result() {
	let harness = Harness::new(Script {
		search_fails: true,
		completion_text: Some(prose()),
		..Default::default()
	});
	let result = harness.service.synthesize(&Query::new(QUESTION, "fast")).await;

	assert!(result.success);
	assert!(result.citations.is_empty());
	assert_eq!(result.answer, NO_DOCUMENTS_ANSWER);
	assert_eq!(result.token_usage.total_tokens, 0);
	assert_eq!(result.query_rewrites, vec![QUESTION.to_string()]);
	assert_eq!(FakeGateways::count(&harness.fakes.calls.completion), 0);
	assert!(!result.answer.contains("ServiceUnavailable"));
}

#[tokio::test]
async fn empty_hits_are_idempotent_in_both_answer_styles() {
	for style in ["template", "llm"] {
		let mut cfg = test_config();

		cfg.synthesis.fast_answer = style.to_string();

		let harness = Harness::with_config(
			cfg,
			Script { completion_text: Some(prose()), ..Default::default() },
		);
		let query = Query::new(QUESTION, "fast");
		let first = harness.service.synthesize(&query).await;
		let second = harness.service.synthesize(&query).await;

		for result in [&first, &second] {
			assert!(result.success, "{style} failed");
			assert!(result.citations.is_empty());
			assert_eq!(result.answer, NO_DOCUMENTS_ANSWER);
			assert_eq!(result.documents_retrieved, 0);
		}

		assert_eq!(first.answer, second.answer);
		assert_eq!(first.retrieval_method, second.retrieval_method);
		assert_eq!(FakeGateways::count(&harness.fakes.calls.completion), 0);
	}
}

#[tokio::test]
async fn completion_failure_falls_back_to_excerpts() {
	let harness = Harness::new(Script {
		hits: vec![hit("1", "Microsoft", 0.9, Some(2.4)), hit("2", "Microsoft", 0.7, Some(1.9))],
		..Default::default()
	});
	let result = harness.service.synthesize(&Query::new(QUESTION, "fast")).await;

	assert!(result.success);
	assert!(result.answer.starts_with("Based on the retrieved documents: "));
	assert!(result.answer.ends_with("..."));
	assert_eq!(result.token_usage.total_tokens, 0);
	assert_eq!(result.citations.len(), 2);
	assert_eq!(FakeGateways::count(&harness.fakes.calls.completion), 1);
	assert!(!result.answer.contains("429"));
}

#[tokio::test]
async fn llm_synthesis_reports_consistent_tokens() {
	let harness = Harness::new(Script {
		hits: vec![
			hit("1", "Microsoft", 0.9, Some(2.4)),
			hit("2", "Microsoft", 0.4, Some(0.5)),
			hit("3", "Microsoft", 0.6, None),
		],
		completion_text: Some(prose()),
		..Default::default()
	});
	let result = harness.service.synthesize(&Query::new(QUESTION, "fast")).await;
	let request = harness.fakes.last_completion();

	assert!(result.success);
	assert_eq!(result.token_usage.prompt_tokens, PROMPT_TOKENS);
	assert_eq!(result.token_usage.completion_tokens, COMPLETION_TOKENS);
	assert!(result.token_usage.is_consistent());
	assert!(result.answer.starts_with(&prose()));
	assert!(result.answer.contains("across 2 retrieved documents"));
	assert_eq!(result.documents_retrieved, 2);
	assert!(result.semantic_ranking_used);
	assert_eq!(result.average_relevance_score, 0.75);
	assert_eq!(request.temperature, 0.1);
	assert!(request.system.starts_with("You are a senior financial analyst"));
	assert!(request.user.contains(&format!("Question: {QUESTION}")));
	assert!(request.user.contains("**Document 1: Microsoft Form 10-K**"));
}

#[tokio::test]
async fn history_shapes_retrieval_query_but_not_the_answer_prompt() {
	let harness = Harness::new(Script {
		hits: vec![hit("1", "Apple", 0.9, None)],
		completion_text: Some(prose()),
		..Default::default()
	});
	let query = Query::new("How did margins change?", "fast").with_history(vec![
		ConversationTurn::new(Role::User, "Tell me about services revenue"),
		ConversationTurn::new(Role::Assistant, "Apple grew services revenue by 16%."),
	]);

	harness.service.synthesize(&query).await;

	let search = harness.fakes.last_search();
	let completion = harness.fakes.last_completion();

	assert_eq!(
		search.text,
		"Previous question: Tell me about services revenue Context: Apple - How did margins change?"
	);
	assert!(completion.user.starts_with("Previous conversation context:\n"));
	assert!(completion.user.contains("Assistant: Apple grew services revenue by 16%.\n"));
	assert!(!completion.user.contains("Context: Apple"));
}

#[tokio::test]
async fn filters_and_top_k_reach_the_search_gateway() {
	let harness = Harness::new(Script { completion_text: Some(prose()), ..Default::default() });
	let query = Query::new(QUESTION, "fast-rag")
		.with_filter("company", json!("O'Reilly"))
		.with_filter("fiscal_year", json!(2023))
		.with_top_k(50);

	harness.service.synthesize(&query).await;

	let request = harness.fakes.last_search();

	assert_eq!(request.filter.as_deref(), Some("company eq 'O''Reilly' and fiscal_year eq 2023"));
	assert_eq!(request.top_k, 10);
	assert_eq!(request.mode, SearchMode::Hybrid);
}

#[tokio::test]
async fn unsupported_mode_is_reported_without_gateway_calls() {
	let harness = Harness::new(Script::default());
	let result = harness.service.synthesize(&Query::new(QUESTION, "deep{research}")).await;

	assert!(!result.success);
	assert!(result.citations.is_empty());
	assert!(!result.answer.contains('{'));
	assert_eq!(result.retrieval_method, "unsupported_mode");
	assert!(result.tracking_id.is_none());
	assert_eq!(FakeGateways::count(&harness.fakes.calls.search), 0);
	assert!(harness.service.ledger().is_empty());
}

#[tokio::test]
async fn blank_question_is_rejected() {
	let harness = Harness::new(Script::default());
	let result = harness.service.synthesize(&Query::new("   ", "fast")).await;

	assert!(!result.success);
	assert_eq!(FakeGateways::count(&harness.fakes.calls.embedding), 0);
}
