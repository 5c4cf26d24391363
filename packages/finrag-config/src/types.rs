use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub providers: Providers,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub citations: Citations,
	#[serde(default)]
	pub context: Context,
	#[serde(default)]
	pub synthesis: Synthesis,
	#[serde(default)]
	pub agentic: Agentic,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub completion: LlmProviderConfig,
	pub search: SearchProviderConfig,
	pub protocol: ProtocolProviderConfig,
	pub planner: PlannerProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: Option<u32>,
	pub timeout_ms: u64,
	#[serde(default = "default_auth_header")]
	pub auth_header: String,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default = "default_auth_header")]
	pub auth_header: String,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

/// Direct search index gateway (REST search endpoint of the index service).
#[derive(Debug, Clone, Deserialize)]
pub struct SearchProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub index: String,
	pub api_version: String,
	#[serde(default = "default_semantic_configuration")]
	pub semantic_configuration: String,
	#[serde(default = "default_vector_field")]
	pub vector_field: String,
	pub timeout_ms: u64,
	#[serde(default = "default_search_auth_header")]
	pub auth_header: String,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

/// Standalone search server reached through its HTTP tool endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ProtocolProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlannerProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub agent_name: String,
	pub api_version: String,
	pub timeout_ms: u64,
	#[serde(default = "default_search_auth_header")]
	pub auth_header: String,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub score_threshold: f32,
	pub rerank_threshold: f32,
	/// Upper bound on a caller-supplied `top_k`.
	pub top_k: u32,
	pub fast_top_k: u32,
	pub protocol_top_k: u32,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			score_threshold: 0.01,
			rerank_threshold: 1.0,
			top_k: 10,
			fast_top_k: 5,
			protocol_top_k: 5,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Citations {
	pub max_excerpt_chars: u32,
}
impl Default for Citations {
	fn default() -> Self {
		Self { max_excerpt_chars: 300 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Context {
	pub max_turns: u32,
	pub turn_char_budget: u32,
	pub entity_hints: bool,
	pub entities: Vec<EntityHint>,
}
impl Default for Context {
	fn default() -> Self {
		Self {
			max_turns: 4,
			turn_char_budget: 500,
			entity_hints: true,
			entities: default_entities(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityHint {
	pub label: String,
	pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Synthesis {
	/// Either "llm" or "template".
	pub fast_answer: String,
	pub temperature: f32,
	pub max_tokens: u32,
	pub max_documents: u32,
	pub document_excerpt_chars: u32,
	pub history_turns: u32,
	pub history_chars: u32,
	pub methodology_note: bool,
}
impl Default for Synthesis {
	fn default() -> Self {
		Self {
			fast_answer: "llm".to_string(),
			temperature: 0.1,
			max_tokens: 1_500,
			max_documents: 5,
			document_excerpt_chars: 1_500,
			history_turns: 3,
			history_chars: 200,
			methodology_note: true,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Agentic {
	pub history_turns: u32,
	pub history_chars: u32,
	pub max_subqueries: u32,
	pub top_k: u32,
	pub reranker_threshold: f32,
	pub grounding_items: u32,
	pub grounding_excerpt_chars: u32,
	pub summary_items: u32,
}
impl Default for Agentic {
	fn default() -> Self {
		Self {
			history_turns: 8,
			history_chars: 2_000,
			max_subqueries: 5,
			top_k: 20,
			reranker_threshold: 1.0,
			grounding_items: 5,
			grounding_excerpt_chars: 800,
			summary_items: 3,
		}
	}
}

fn default_auth_header() -> String {
	"bearer".to_string()
}

fn default_search_auth_header() -> String {
	"api-key".to_string()
}

fn default_semantic_configuration() -> String {
	"default".to_string()
}

fn default_vector_field() -> String {
	"content_vector".to_string()
}

fn default_entities() -> Vec<EntityHint> {
	[
		("Microsoft", &["microsoft"][..]),
		("Apple", &["apple"][..]),
		("Google/Alphabet", &["google", "alphabet"][..]),
		("Amazon", &["amazon"][..]),
		("Meta", &["meta"][..]),
		("Tesla", &["tesla"][..]),
	]
	.into_iter()
	.map(|(label, aliases)| EntityHint {
		label: label.to_string(),
		aliases: aliases.iter().map(|alias| alias.to_string()).collect(),
	})
	.collect()
}
