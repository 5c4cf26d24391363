use serde_json::{Map, Value};

/// Renders explicit filters as an AND-joined `field eq value` clause.
///
/// Strings are single-quoted with embedded quotes doubled; every other value is emitted as its
/// JSON literal. Returns `None` when there is nothing to filter on.
pub fn filter_expression(filters: &Map<String, Value>) -> Option<String> {
	let clauses: Vec<String> = filters
		.iter()
		.filter(|(field, _)| !field.trim().is_empty())
		.map(|(field, value)| format!("{} eq {}", field.trim(), literal(value)))
		.collect();

	if clauses.is_empty() { None } else { Some(clauses.join(" and ")) }
}

pub fn chunk_id_filter(doc_key: &str) -> String {
	format!("chunk_id eq {}", quote(doc_key))
}

fn literal(value: &Value) -> String {
	match value {
		Value::String(raw) => quote(raw),
		other => other.to_string(),
	}
}

fn quote(raw: &str) -> String {
	format!("'{}'", raw.replace('\'', "''"))
}
