pub mod answer;
pub mod citation;
pub mod context;
pub mod doc_key;
pub mod filter;
pub mod grounding;
pub mod model;
pub mod prompt;
pub mod scoring;
pub mod text;
pub mod time_serde;

pub use model::{
	ActivityCategory, ActivityStep, Citation, ConversationTurn, DocumentMetadata, Mode, Query,
	Role, SearchHit, SearchMode, SynthesisResult, TokenBreakdown, TokenUsage,
};
