use finrag_domain::{Query, SearchMode, answer::NO_DOCUMENTS_ANSWER};

use super::{FakeGateways, Harness, Script, hit, prose};

#[tokio::test]
async fn protocol_mode_searches_through_the_search_server() {
	let harness = Harness::new(Script {
		hits: vec![hit("direct", "Apple", 0.9, None)],
		protocol_hits: vec![hit("p1", "Tesla", 0.8, Some(2.2)), hit("p2", "Tesla", 0.002, None)],
		completion_text: Some(prose()),
		..Default::default()
	});
	let result =
		harness.service.synthesize(&Query::new("How many vehicles did Tesla deliver?", "mcp-rag")).await;
	let request = harness.fakes.last_search();

	assert!(result.success);
	assert_eq!(result.retrieval_method, "protocol_hybrid_search");
	assert_eq!(result.citations.len(), 1);
	assert_eq!(result.citations[0].company, "Tesla");
	assert!(result.answer.contains("protocol-mediated hybrid search"));
	assert_eq!(request.mode, SearchMode::Hybrid);
	assert_eq!(request.top_k, 5);
	assert_eq!(FakeGateways::count(&harness.fakes.calls.protocol), 1);
	assert_eq!(FakeGateways::count(&harness.fakes.calls.search), 0);
	assert_eq!(FakeGateways::count(&harness.fakes.calls.embedding), 0);
}

#[tokio::test]
async fn protocol_failure_returns_no_documents_result() {
	let harness = Harness::new(Script {
		protocol_fails: true,
		completion_text: Some(prose()),
		..Default::default()
	});
	let result = harness.service.synthesize(&Query::new("Tesla deliveries?", "protocol")).await;

	assert!(result.success);
	assert_eq!(result.answer, NO_DOCUMENTS_ANSWER);
	assert_eq!(result.retrieval_method, "protocol_hybrid_search");
	assert!(result.citations.is_empty());
	assert_eq!(FakeGateways::count(&harness.fakes.calls.completion), 0);
}
