use time::OffsetDateTime;
use uuid::Uuid;

use finrag_domain::{Mode, Query, SynthesisResult};

use crate::{
	Error, FinragService, OperationType, TrackingRequest, UsageEntry, agentic, elapsed_ms,
	query_hash,
};

const STRATEGY_FALLBACK_PREFIX: &str = "agentic_fallback_";

/// Identity and clock of one synthesis call.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Run {
	pub(crate) query_id: Uuid,
	pub(crate) tracking_id: Uuid,
	pub(crate) started: OffsetDateTime,
}

impl FinragService {
	/// Answers one query with the strategy its mode names.
	///
	/// Never fails: unrecoverable problems come back as `success = false` with a sanitized answer.
	pub async fn synthesize(&self, query: &Query) -> SynthesisResult {
		let query_id = Uuid::new_v4();
		let started = OffsetDateTime::now_utc();
		let Some(mode) = Mode::parse(&query.mode) else {
			let err = Error::UnsupportedMode { mode: query.mode.clone() };

			tracing::warn!(error = %err, query_id = %query_id, "Rejected query.");

			return SynthesisResult::failure(
				query_id,
				None,
				"unsupported_mode",
				err.summary(),
				elapsed_ms(started),
			);
		};

		if query.text.trim().is_empty() {
			let err = Error::InvalidRequest { message: "Question text is empty.".to_string() };

			tracing::warn!(
				error = %err,
				query_id = %query_id,
				mode = mode.as_str(),
				"Rejected query."
			);

			return SynthesisResult::failure(
				query_id,
				None,
				mode.as_str(),
				err.summary(),
				elapsed_ms(started),
			);
		}

		let tracking_id = self.ledger.start_tracking(TrackingRequest {
			session_id: query.session_id.clone().unwrap_or_default(),
			service_type: mode,
			operation: OperationType::AnswerGeneration,
			mode: mode.as_str().to_string(),
		});
		let run = Run { query_id, tracking_id, started };

		tracing::info!(
			query_id = %query_id,
			tracking_id = %tracking_id,
			mode = mode.as_str(),
			query_hash = %query_hash(&query.text),
			history_turns = query.history.len(),
			filters = query.filters.len(),
			"Synthesis started."
		);

		let result = match mode {
			Mode::Fast | Mode::Protocol => self.fast(query, mode, &run).await,
			Mode::Agentic => match self.agentic(query, &run).await {
				Ok(result) => result,
				Err(err) => {
					tracing::warn!(
						error = %err,
						stage = err.stage(),
						query_id = %query_id,
						"Agentic synthesis failed."
					);

					self.record(&run, UsageEntry::failed(&err));

					SynthesisResult::failure(
						query_id,
						Some(tracking_id),
						agentic::RETRIEVAL_METHOD,
						err.summary(),
						elapsed_ms(started),
					)
				},
			},
		};

		tracing::info!(
			query_id = %query_id,
			retrieval_method = %result.retrieval_method,
			success = result.success,
			citations = result.citations.len(),
			total_tokens = result.token_usage.total_tokens,
			elapsed_ms = result.processing_time_ms,
			"Synthesis finished."
		);

		result
	}

	/// Runs the agentic strategy, re-running the query in fast mode only if it failed.
	pub async fn synthesize_with_strategy_fallback(&self, query: &Query) -> SynthesisResult {
		let agentic = Query { mode: Mode::Agentic.as_str().to_string(), ..query.clone() };
		let first = self.synthesize(&agentic).await;

		if first.success {
			return first;
		}

		tracing::info!(
			query_id = %first.query_id,
			"Agentic strategy failed; retrying in fast mode."
		);

		let fast = Query { mode: Mode::Fast.as_str().to_string(), ..query.clone() };
		let mut result = self.synthesize(&fast).await;

		result.retrieval_method = format!("{STRATEGY_FALLBACK_PREFIX}{}", result.retrieval_method);
		result.processing_time_ms += first.processing_time_ms;

		result
	}

	pub(crate) fn record(&self, run: &Run, entry: UsageEntry) {
		if let Err(err) = self.ledger.record_usage(run.tracking_id, entry) {
			tracing::warn!(error = %err, query_id = %run.query_id, "Failed to record token usage.");
		}
	}

	pub(crate) fn record_failures(&self, run: &Run, failures: &[Error]) {
		for err in failures {
			self.record(run, UsageEntry::failed(err));
		}
	}
}
