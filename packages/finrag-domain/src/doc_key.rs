use std::sync::LazyLock;

use regex::Regex;

static CHUNKED_KEY: LazyLock<Option<Regex>> =
	LazyLock::new(|| Regex::new(r"^(?P<filing>[^_\s]+)_chunk_(?P<chunk>\d+)$").ok());

/// Best-effort readable title for a planner reference that arrived without one.
///
/// `0001564590-19-027952_chunk_25` becomes `SEC Filing 0001564590-19-027952 - Section 25`. Any
/// other key is used as-is, and a missing key falls back to the ordinal.
pub fn title_from_doc_key(doc_key: &str, ordinal: usize) -> String {
	let doc_key = doc_key.trim();

	if doc_key.is_empty() {
		return format!("Document {ordinal}");
	}

	if let Some(caps) = CHUNKED_KEY.as_ref().and_then(|re| re.captures(doc_key)) {
		return format!("SEC Filing {} - Section {}", &caps["filing"], &caps["chunk"]);
	}

	format!("Document {doc_key}")
}
