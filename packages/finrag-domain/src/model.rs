use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	User,
	Assistant,
	System,
	#[serde(other)]
	Other,
}
impl Role {
	pub fn label(self) -> &'static str {
		match self {
			Self::User => "User",
			Self::Assistant => "Assistant",
			Self::System => "System",
			Self::Other => "Other",
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationTurn {
	pub role: Role,
	pub content: String,
	#[serde(default, with = "crate::time_serde::option")]
	pub timestamp: Option<OffsetDateTime>,
}
impl ConversationTurn {
	pub fn new(role: Role, content: impl Into<String>) -> Self {
		Self { role, content: content.into(), timestamp: None }
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
	Fast,
	Agentic,
	Protocol,
}
impl Mode {
	/// Accepts canonical names and the legacy `*-rag` aliases, case-insensitively.
	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"fast" | "fast-rag" => Some(Self::Fast),
			"agentic" | "agentic-rag" => Some(Self::Agentic),
			"protocol" | "mcp-rag" => Some(Self::Protocol),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Fast => "fast",
			Self::Agentic => "agentic",
			Self::Protocol => "protocol",
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
	Lexical,
	Vector,
	Hybrid,
}
impl SearchMode {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Lexical => "lexical",
			Self::Vector => "vector",
			Self::Hybrid => "hybrid",
		}
	}
}

/// One user turn. Built once and only read afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Query {
	pub text: String,
	pub mode: String,
	#[serde(default)]
	pub top_k: Option<u32>,
	#[serde(default)]
	pub filters: Map<String, Value>,
	#[serde(default)]
	pub history: Vec<ConversationTurn>,
	#[serde(default)]
	pub session_id: Option<String>,
}
impl Query {
	pub fn new(text: impl Into<String>, mode: impl Into<String>) -> Self {
		Self {
			text: text.into(),
			mode: mode.into(),
			top_k: None,
			filters: Map::new(),
			history: Vec::new(),
			session_id: None,
		}
	}

	pub fn with_top_k(mut self, top_k: u32) -> Self {
		self.top_k = Some(top_k);

		self
	}

	pub fn with_filter(mut self, field: impl Into<String>, value: Value) -> Self {
		self.filters.insert(field.into(), value);

		self
	}

	pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
		self.history = history;

		self
	}

	pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
		self.session_id = Some(session_id.into());

		self
	}
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
	pub company: String,
	pub document_type: String,
	pub filing_date: String,
	pub form_type: String,
	pub ticker: String,
	pub section_type: String,
	pub page_number: Option<u32>,
	pub chunk_id: String,
	pub chunk_index: Option<u32>,
	pub document_url: String,
	pub credibility_score: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
	pub id: String,
	pub content: String,
	pub title: String,
	pub source: String,
	pub metadata: DocumentMetadata,
	pub lexical_score: f32,
	pub rerank_score: Option<f32>,
	pub highlights: Vec<String>,
}
impl SearchHit {
	/// Identity used for de-duplication. Falls back to the chunk id when the index omits a key.
	pub fn dedup_key(&self) -> Option<&str> {
		[self.id.as_str(), self.metadata.chunk_id.as_str()]
			.into_iter()
			.map(str::trim)
			.find(|key| !key.is_empty())
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Citation {
	pub id: u32,
	pub title: String,
	pub content: String,
	pub source: String,
	pub company: String,
	pub document_type: String,
	pub filing_date: String,
	pub form_type: String,
	pub ticker: String,
	pub section_type: String,
	pub page_number: Option<u32>,
	pub chunk_id: String,
	pub document_url: String,
	pub lexical_score: f32,
	pub rerank_score: Option<f32>,
	pub credibility_score: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBreakdown {
	pub planning: u64,
	pub ranking: u64,
	pub synthesis: u64,
}
impl TokenBreakdown {
	pub fn total(&self) -> u64 {
		self.planning + self.ranking + self.synthesis
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
	pub prompt_tokens: u64,
	pub completion_tokens: u64,
	pub total_tokens: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub breakdown: Option<TokenBreakdown>,
}
impl TokenUsage {
	pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
		Self {
			prompt_tokens,
			completion_tokens,
			total_tokens: prompt_tokens + completion_tokens,
			breakdown: None,
		}
	}

	pub fn zero() -> Self {
		Self::default()
	}

	pub fn with_breakdown(self, breakdown: TokenBreakdown) -> Self {
		Self { breakdown: Some(breakdown), ..self }
	}

	pub fn is_consistent(&self) -> bool {
		let parts_match = self.breakdown.map(|b| b.total() == self.total_tokens).unwrap_or(true);

		self.total_tokens == self.prompt_tokens + self.completion_tokens && parts_match
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityCategory {
	Search,
	Ranking,
	Generation,
	Processing,
}
impl ActivityCategory {
	pub fn from_kind(kind: &str) -> Self {
		let kind = kind.to_ascii_lowercase();

		if kind.contains("search") || kind.contains("query") {
			Self::Search
		} else if kind.contains("rank") || kind.contains("semantic") {
			Self::Ranking
		} else if kind.contains("llm") || kind.contains("generation") {
			Self::Generation
		} else {
			Self::Processing
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivityStep {
	pub step_number: u32,
	pub kind: String,
	pub category: ActivityCategory,
	pub subquery: Option<String>,
	pub input_tokens: u64,
	pub output_tokens: u64,
	pub elapsed_ms: Option<u64>,
	pub count: Option<u64>,
	pub target_index: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SynthesisResult {
	pub query_id: Uuid,
	pub tracking_id: Option<Uuid>,
	pub answer: String,
	pub citations: Vec<Citation>,
	pub query_rewrites: Vec<String>,
	pub token_usage: TokenUsage,
	pub retrieval_method: String,
	pub processing_time_ms: u64,
	pub success: bool,
	pub activity_steps: Vec<ActivityStep>,
	pub documents_retrieved: usize,
	pub average_relevance_score: f32,
	pub semantic_ranking_used: bool,
}
impl SynthesisResult {
	/// Failed results never carry citations and report zero tokens.
	pub fn failure(
		query_id: Uuid,
		tracking_id: Option<Uuid>,
		retrieval_method: impl Into<String>,
		summary: impl Into<String>,
		processing_time_ms: u64,
	) -> Self {
		Self {
			query_id,
			tracking_id,
			answer: summary.into(),
			citations: Vec::new(),
			query_rewrites: Vec::new(),
			token_usage: TokenUsage::zero(),
			retrieval_method: retrieval_method.into(),
			processing_time_ms,
			success: false,
			activity_steps: Vec::new(),
			documents_retrieved: 0,
			average_relevance_score: 0.0,
			semantic_ranking_used: false,
		}
	}
}
