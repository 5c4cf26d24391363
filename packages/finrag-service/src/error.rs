pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Pipeline stage a gateway call belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
	Embedding,
	Search,
	Completion,
	Planning,
}
impl Stage {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Embedding => "embedding",
			Self::Search => "search",
			Self::Completion => "completion",
			Self::Planning => "planning",
		}
	}

	pub fn error(self, message: impl Into<String>) -> Error {
		let message = message.into();

		match self {
			Self::Embedding => Error::Embedding { message },
			Self::Search => Error::Search { message },
			Self::Completion => Error::Completion { message },
			Self::Planning => Error::Planning { message },
		}
	}
}

/// Variant text carries raw upstream detail for logs; callers only ever see [`Error::summary`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Embedding error: {message}")]
	Embedding { message: String },
	#[error("Search error: {message}")]
	Search { message: String },
	#[error("Completion error: {message}")]
	Completion { message: String },
	#[error("Planning error: {message}")]
	Planning { message: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Unsupported mode: {mode}")]
	UnsupportedMode { mode: String },
}
impl Error {
	pub fn stage(&self) -> &'static str {
		match self {
			Self::Embedding { .. } => Stage::Embedding.as_str(),
			Self::Search { .. } => Stage::Search.as_str(),
			Self::Completion { .. } => Stage::Completion.as_str(),
			Self::Planning { .. } => Stage::Planning.as_str(),
			Self::InvalidRequest { .. } | Self::UnsupportedMode { .. } => "request",
		}
	}

	/// Embedding, search and completion failures degrade to a lower tier instead of failing.
	pub fn is_recoverable(&self) -> bool {
		matches!(self, Self::Embedding { .. } | Self::Search { .. } | Self::Completion { .. })
	}

	pub fn summary(&self) -> String {
		match self {
			Self::Embedding { .. } =>
				"The embedding service is unavailable; results use keyword search only.".to_string(),
			Self::Search { .. } => "The document search service is unavailable.".to_string(),
			Self::Completion { .. } => "The answer generation service is unavailable.".to_string(),
			Self::Planning { .. } =>
				"Agentic retrieval failed: the planning service could not complete the request. Please try again or use fast mode."
					.to_string(),
			Self::InvalidRequest { .. } =>
				"The question could not be processed because the request was invalid.".to_string(),
			Self::UnsupportedMode { mode } => format!(
				"Unsupported mode \"{}\". Use fast, agentic or protocol.",
				sanitize_mode(mode)
			),
		}
	}
}

fn sanitize_mode(mode: &str) -> String {
	mode.chars()
		.filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_'))
		.take(32)
		.collect()
}

#[cfg(test)]
mod tests {
	use crate::error::{Error, Stage};

	#[test]
	fn summaries_never_echo_upstream_detail() {
		let err = Stage::Planning.error(r#"500 {"error":{"code":"InternalServerError"}}"#);

		assert!(!err.summary().contains('{'));
		assert!(!err.summary().contains("InternalServerError"));
		assert!(!err.is_recoverable());
	}

	#[test]
	fn recoverable_stages() {
		assert!(Stage::Embedding.error("x").is_recoverable());
		assert!(Stage::Search.error("x").is_recoverable());
		assert!(Stage::Completion.error("x").is_recoverable());
		assert!(!Error::UnsupportedMode { mode: "x".to_string() }.is_recoverable());
	}

	#[test]
	fn unsupported_mode_summary_is_sanitized() {
		let err = Error::UnsupportedMode { mode: "deep{research}".to_string() };

		assert_eq!(err.summary(), "Unsupported mode \"deepresearch\". Use fast, agentic or protocol.");
	}
}
