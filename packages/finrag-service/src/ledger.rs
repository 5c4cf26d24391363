use std::{
	collections::HashMap,
	sync::{Mutex, MutexGuard, PoisonError},
};

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use finrag_domain::{Mode, TokenUsage};

use crate::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
	AnswerGeneration,
	Search,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackingRequest {
	pub session_id: String,
	pub service_type: Mode,
	pub operation: OperationType,
	pub mode: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UsageEntry {
	pub stage: String,
	pub prompt_tokens: u64,
	pub completion_tokens: u64,
	pub total_tokens: u64,
	pub success: bool,
	pub error: Option<String>,
	#[serde(with = "finrag_domain::time_serde")]
	pub recorded_at: OffsetDateTime,
}
impl UsageEntry {
	pub fn succeeded(stage: &str, prompt_tokens: u64, completion_tokens: u64) -> Self {
		Self {
			stage: stage.to_string(),
			prompt_tokens,
			completion_tokens,
			total_tokens: prompt_tokens + completion_tokens,
			success: true,
			error: None,
			recorded_at: OffsetDateTime::now_utc(),
		}
	}

	/// Failed calls always count zero tokens and keep only the sanitized summary.
	pub fn failed(err: &Error) -> Self {
		Self {
			stage: err.stage().to_string(),
			prompt_tokens: 0,
			completion_tokens: 0,
			total_tokens: 0,
			success: false,
			error: Some(err.summary()),
			recorded_at: OffsetDateTime::now_utc(),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UsageRecord {
	pub tracking_id: Uuid,
	pub session_id: String,
	pub service_type: Mode,
	pub operation: OperationType,
	pub mode: String,
	#[serde(with = "finrag_domain::time_serde")]
	pub started_at: OffsetDateTime,
	pub entries: Vec<UsageEntry>,
}
impl UsageRecord {
	pub fn totals(&self) -> TokenUsage {
		let (prompt, completion) = self
			.entries
			.iter()
			.fold((0, 0), |(p, c), entry| (p + entry.prompt_tokens, c + entry.completion_tokens));

		TokenUsage::new(prompt, completion)
	}

	pub fn succeeded(&self) -> bool {
		self.entries.iter().all(|entry| entry.success)
	}
}

#[derive(Default)]
struct LedgerState {
	records: Vec<UsageRecord>,
	index: HashMap<Uuid, usize>,
}

/// Process-wide, append-only token usage store keyed by tracking id.
///
/// Shared by handle; each append happens under one lock so records never interleave.
#[derive(Default)]
pub struct TokenLedger {
	state: Mutex<LedgerState>,
}
impl TokenLedger {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn start_tracking(&self, request: TrackingRequest) -> Uuid {
		let tracking_id = Uuid::new_v4();
		let record = UsageRecord {
			tracking_id,
			session_id: request.session_id,
			service_type: request.service_type,
			operation: request.operation,
			mode: request.mode,
			started_at: OffsetDateTime::now_utc(),
			entries: Vec::new(),
		};
		let mut state = self.lock();
		let position = state.records.len();

		state.records.push(record);
		state.index.insert(tracking_id, position);

		tracking_id
	}

	pub fn record_usage(&self, tracking_id: Uuid, entry: UsageEntry) -> Result<()> {
		let mut state = self.lock();
		let position = state.index.get(&tracking_id).copied().ok_or_else(|| {
			Error::InvalidRequest { message: format!("Unknown tracking id {tracking_id}.") }
		})?;

		state.records[position].entries.push(entry);

		Ok(())
	}

	pub fn record(&self, tracking_id: Uuid) -> Option<UsageRecord> {
		let state = self.lock();

		state.index.get(&tracking_id).map(|position| state.records[*position].clone())
	}

	/// Copy of every record in start order.
	pub fn snapshot(&self) -> Vec<UsageRecord> {
		self.lock().records.clone()
	}

	pub fn len(&self) -> usize {
		self.lock().records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn lock(&self) -> MutexGuard<'_, LedgerState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}
}
