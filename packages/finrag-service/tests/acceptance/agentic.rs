use serde_json::json;

use finrag_domain::{ActivityCategory, ConversationTurn, Query, Role};
use finrag_providers::planner::{
	PlannerUsage, PlanningActivity, PlanningReference, PlanningResponse,
};

use super::{COMPLETION_TOKENS, FakeGateways, Harness, PROMPT_TOKENS, Script, hit, prose};

const QUESTION: &str = "What are Microsoft's principal risk factors?";

fn activity(kind: &str, search: Option<&str>, input: u64, output: u64) -> PlanningActivity {
	PlanningActivity {
		kind: kind.to_string(),
		search: search.map(str::to_string),
		input_tokens: Some(input),
		output_tokens: Some(output),
		target_index: Some("financial-filings".to_string()),
		..Default::default()
	}
}

fn sourced_reference(doc_key: &str, company: &str) -> PlanningReference {
	PlanningReference {
		doc_key: doc_key.to_string(),
		kind: "AzureSearchDoc".to_string(),
		source_data: Some(json!({
			"title": format!("{company} Form 10-K 2023"),
			"content": format!("{company} faces competition and cybersecurity risk."),
			"company": company,
			"document_type": "10-K",
			"filing_date": "2023-07-27",
			"chunk_id": doc_key,
		})),
		score: Some(0.8),
		reranker_score: Some(2.6),
		..Default::default()
	}
}

fn planning(answer_text: &str, references: Vec<PlanningReference>) -> PlanningResponse {
	PlanningResponse {
		answer_text: answer_text.to_string(),
		references,
		activity: vec![
			activity("ModelQueryPlanning", None, 900, 60),
			activity("AzureSearchQuery", Some("Microsoft risk factors"), 0, 0),
			activity("AzureSearchSemanticRanker", None, 2_000, 0),
		],
		usage: Some(PlannerUsage { prompt_tokens: 100, completion_tokens: 20 }),
		activity_well_formed: true,
		..Default::default()
	}
}

fn grounding_json() -> String {
	json!([
		{
			"ref_id": 0,
			"title": "Microsoft Form 10-K 2023",
			"content": "Microsoft faces intense competition across cloud and productivity markets.",
			"company": "Microsoft",
			"document_type": "10-K",
			"filing_date": "2023-07-27"
		}
	])
	.to_string()
}

#[tokio::test]
async fn planning_failure_is_reported_without_raw_detail() {
	let harness = Harness::new(Script { completion_text: Some(prose()), ..Default::default() });
	let result = harness.service.synthesize(&Query::new(QUESTION, "agentic")).await;

	assert!(!result.success);
	assert!(result.citations.is_empty());
	assert_eq!(result.retrieval_method, "agentic_retrieval");
	assert!(result.answer.starts_with("Agentic retrieval failed"));
	assert!(!result.answer.contains('{'));
	assert!(!result.answer.contains("InternalServerError"));
	assert_eq!(FakeGateways::count(&harness.fakes.calls.completion), 0);

	let record = harness
		.service
		.ledger()
		.record(result.tracking_id.expect("Missing tracking id."))
		.expect("Missing usage record.");

	assert!(!record.succeeded());
	assert!(record.entries.iter().any(|entry| entry.stage == "planning" && !entry.success));
}

#[tokio::test]
async fn prose_answer_is_used_as_is_with_reference_citations() {
	let harness = Harness::new(Script {
		planning: Some(planning(
			&prose(),
			vec![sourced_reference("msft-1", "Microsoft"), sourced_reference("msft-2", "Microsoft")],
		)),
		..Default::default()
	});
	let result = harness.service.synthesize(&Query::new(QUESTION, "agentic")).await;

	assert!(result.success);
	assert_eq!(result.answer, prose());
	assert_eq!(result.retrieval_method, "agentic_retrieval");
	assert_eq!(result.citations.len(), 2);
	assert_eq!(result.citations[0].id, 1);
	assert_eq!(result.citations[1].id, 2);
	assert_eq!(result.citations[0].title, "Microsoft Form 10-K 2023");
	assert_eq!(result.citations[0].chunk_id, "msft-1");
	assert_eq!(result.citations[0].rerank_score, Some(2.6));
	assert!(result.semantic_ranking_used);
	assert_eq!(result.average_relevance_score, 0.8);
	assert_eq!(result.query_rewrites, vec!["Microsoft risk factors".to_string()]);
	assert_eq!(FakeGateways::count(&harness.fakes.calls.completion), 0);
	assert_eq!(FakeGateways::count(&harness.fakes.calls.lookup), 0);
	assert_eq!(FakeGateways::count(&harness.fakes.calls.search), 0);
}

#[tokio::test]
async fn grounding_answer_is_resynthesized() {
	let harness = Harness::new(Script {
		planning: Some(planning(&grounding_json(), vec![sourced_reference("msft-1", "Microsoft")])),
		completion_text: Some(prose()),
		..Default::default()
	});
	let result = harness.service.synthesize(&Query::new(QUESTION, "agentic")).await;
	let request = harness.fakes.last_completion();
	let breakdown = result.token_usage.breakdown.expect("Missing token breakdown.");

	assert!(result.success);
	assert_eq!(result.answer, prose());
	assert_eq!(FakeGateways::count(&harness.fakes.calls.completion), 1);
	assert!(request.system.starts_with("You are a senior financial analyst. Provide"));
	assert!(request.user.contains(QUESTION));
	assert!(request.user.contains("intense competition across cloud"));
	assert_eq!(breakdown.synthesis, PROMPT_TOKENS + COMPLETION_TOKENS);
	assert_eq!(breakdown.ranking, 2_000);
	assert_eq!(breakdown.planning, 100 + 20 + 900 + 60);
	assert!(result.token_usage.is_consistent());
}

#[tokio::test]
async fn grounding_with_failed_resynthesis_becomes_structured_summary() {
	let harness = Harness::new(Script {
		planning: Some(planning(&grounding_json(), vec![sourced_reference("msft-1", "Microsoft")])),
		..Default::default()
	});
	let result = harness.service.synthesize(&Query::new(QUESTION, "agentic")).await;

	assert!(result.success);
	assert!(result.answer.starts_with("# Financial Analysis Summary"));
	assert!(result.answer.contains("**Microsoft Form 10-K 2023:**"));
	assert!(!result.answer.contains("429"));
	assert_eq!(result.token_usage.breakdown.map(|breakdown| breakdown.synthesis), Some(0));
	assert!(result.token_usage.is_consistent());

	let record = harness
		.service
		.ledger()
		.record(result.tracking_id.expect("Missing tracking id."))
		.expect("Missing usage record.");

	assert!(record.entries.iter().any(|entry| entry.stage == "completion" && !entry.success));
	assert_eq!(record.totals().total_tokens, result.token_usage.total_tokens);
}

#[tokio::test]
async fn truncated_pretty_printed_grounding_never_reaches_the_answer() {
	let truncated = "[\n  {\n    \"ref_id\": 0,\n    \"title\": \"Microsoft 10-K\",\n    \"content\": \"Competition is intense";
	let harness = Harness::new(Script {
		planning: Some(planning(truncated, vec![sourced_reference("msft-1", "Microsoft")])),
		..Default::default()
	});
	let result = harness.service.synthesize(&Query::new(QUESTION, "agentic")).await;

	assert!(result.success);
	assert!(result.answer.starts_with("# Financial Analysis Summary"));
	assert!(!result.answer.contains("ref_id"));
	assert!(!result.answer.contains('{'));
}

#[tokio::test]
async fn references_without_source_data_are_looked_up() {
	let unsourced = |doc_key: &str| PlanningReference {
		doc_key: doc_key.to_string(),
		score: Some(0.5),
		..Default::default()
	};
	let found = Harness::new(Script {
		planning: Some(planning(&prose(), vec![unsourced("apple-7")])),
		lookup_hit: Some(hit("apple-7", "Apple", 0.0, None)),
		..Default::default()
	});
	let result = found.service.synthesize(&Query::new(QUESTION, "agentic")).await;

	assert_eq!(FakeGateways::count(&found.fakes.calls.lookup), 1);
	assert_eq!(result.citations.len(), 1);
	assert_eq!(result.citations[0].company, "Apple");
	assert_eq!(result.citations[0].title, "Apple Form 10-K");
	assert_eq!(result.citations[0].lexical_score, 0.5);

	let missing = Harness::new(Script {
		planning: Some(planning(&prose(), vec![unsourced("0000320193-23-000106_chunk_12")])),
		..Default::default()
	});
	let result = missing.service.synthesize(&Query::new(QUESTION, "agentic")).await;

	assert!(result.success);
	assert_eq!(result.citations.len(), 1);
	assert_eq!(result.citations[0].title, "SEC Filing 0000320193-23-000106 - Section 12");
	assert_eq!(result.citations[0].chunk_id, "0000320193-23-000106_chunk_12");
}

#[tokio::test]
async fn empty_activity_trace_yields_synthetic_step() {
	let response = PlanningResponse {
		activity: Vec::new(),
		usage: None,
		..planning(&prose(), vec![sourced_reference("msft-1", "Microsoft")])
	};
	let harness = Harness::new(Script { planning: Some(response), ..Default::default() });
	let result = harness.service.synthesize(&Query::new(QUESTION, "agentic")).await;

	assert!(result.success);
	assert_eq!(result.activity_steps.len(), 1);
	assert_eq!(result.activity_steps[0].category, ActivityCategory::Search);
	assert_eq!(
		result.activity_steps[0].subquery.as_deref(),
		Some("Subquery 1: Complex query processed")
	);
	assert_eq!(result.activity_steps[0].target_index.as_deref(), Some("financial-filings"));
	assert_eq!(result.query_rewrites, vec![QUESTION.to_string()]);
	assert_eq!(result.token_usage.total_tokens, 0);
}

#[tokio::test]
async fn planning_request_carries_history_and_index() {
	let harness = Harness::new(Script {
		planning: Some(planning(&prose(), Vec::new())),
		..Default::default()
	});
	let query = Query::new(QUESTION, "agentic").with_history(vec![
		ConversationTurn::new(Role::User, "Tell me about Microsoft."),
		ConversationTurn::new(Role::Assistant, "Microsoft is a software company."),
	]);

	harness.service.synthesize(&query).await;

	let request = harness.fakes.last_planning();
	let roles: Vec<_> = request.messages.iter().map(|message| message.role.as_str()).collect();

	assert_eq!(roles, vec!["user", "assistant", "user"]);
	assert_eq!(request.messages[0].text, "Tell me about Microsoft.");
	assert!(request.messages[2].text.contains(&format!("Question: {QUESTION}")));
	assert_eq!(request.index.index_name, "financial-filings");
}

#[tokio::test]
async fn strategy_fallback_reruns_failed_agentic_query_in_fast_mode() {
	let harness = Harness::new(Script {
		hits: vec![hit("1", "Microsoft", 0.9, Some(2.4))],
		completion_text: Some(prose()),
		..Default::default()
	});
	let result =
		harness.service.synthesize_with_strategy_fallback(&Query::new(QUESTION, "agentic")).await;

	assert!(result.success);
	assert_eq!(result.retrieval_method, "agentic_fallback_hybrid_vector_search");
	assert_eq!(result.citations.len(), 1);
	assert_eq!(FakeGateways::count(&harness.fakes.calls.planner), 1);
	assert_eq!(FakeGateways::count(&harness.fakes.calls.search), 1);
	assert_eq!(harness.service.ledger().len(), 2);
}

#[tokio::test]
async fn strategy_fallback_keeps_successful_agentic_result() {
	let harness = Harness::new(Script {
		hits: vec![hit("1", "Microsoft", 0.9, Some(2.4))],
		planning: Some(planning(&prose(), vec![sourced_reference("msft-1", "Microsoft")])),
		..Default::default()
	});
	let result =
		harness.service.synthesize_with_strategy_fallback(&Query::new(QUESTION, "fast")).await;

	assert!(result.success);
	assert_eq!(result.retrieval_method, "agentic_retrieval");
	assert_eq!(FakeGateways::count(&harness.fakes.calls.search), 0);
}
