use finrag_domain::{Mode, Query};
use finrag_service::OperationType;

use super::{COMPLETION_TOKENS, Harness, PROMPT_TOKENS, Script, hit, prose};

#[tokio::test]
async fn ledger_totals_match_result_tokens() {
	let harness = Harness::new(Script {
		hits: vec![hit("1", "Microsoft", 0.9, Some(2.4))],
		completion_text: Some(prose()),
		..Default::default()
	});
	let query = Query::new("What are Microsoft's risk factors?", "fast").with_session("session-7");
	let result = harness.service.synthesize(&query).await;
	let record = harness
		.service
		.ledger()
		.record(result.tracking_id.expect("Missing tracking id."))
		.expect("Missing usage record.");

	assert_eq!(record.session_id, "session-7");
	assert_eq!(record.service_type, Mode::Fast);
	assert_eq!(record.operation, OperationType::AnswerGeneration);
	assert_eq!(record.totals(), result.token_usage);
	assert_eq!(record.totals().total_tokens, PROMPT_TOKENS + COMPLETION_TOKENS);
	assert!(record.succeeded());
}

#[tokio::test]
async fn concurrent_requests_get_separate_records() {
	let harness = Harness::new(Script {
		hits: vec![hit("1", "Microsoft", 0.9, Some(2.4))],
		completion_text: Some(prose()),
		..Default::default()
	});
	let first = Query::new("What are Microsoft's risk factors?", "fast");
	let second = Query::new("How does Microsoft describe competition?", "protocol");
	let (a, b) =
		tokio::join!(harness.service.synthesize(&first), harness.service.synthesize(&second));

	assert_ne!(a.tracking_id, b.tracking_id);
	assert_eq!(harness.service.ledger().len(), 2);

	for result in [&a, &b] {
		let record = harness
			.service
			.ledger()
			.record(result.tracking_id.expect("Missing tracking id."))
			.expect("Missing usage record.");

		assert_eq!(record.totals(), result.token_usage);
	}
}
