use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::text;

pub const NO_GROUNDING_ANSWER: &str = "I found relevant financial documents but couldn't generate a comprehensive analysis. Please try rephrasing your question or ask about a specific company or metric.";

const MIN_PROSE_CHARS: usize = 50;
const SUMMARY_PREVIEW_CHARS: usize = 400;

/// A raw retrieved snippet handed back by the planner instead of prose.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroundingItem {
	pub title: Option<String>,
	pub company: String,
	pub document_type: String,
	pub filing_date: String,
	pub content: String,
}
impl GroundingItem {
	pub fn from_object(obj: &Map<String, Value>) -> Self {
		Self {
			title: Some(string_field(obj, "title")).filter(|title| !title.is_empty()),
			company: string_field(obj, "company"),
			document_type: string_field(obj, "document_type"),
			filing_date: string_field(obj, "filing_date"),
			content: string_field(obj, "content"),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.title.is_none() && self.content.trim().is_empty()
	}
}

/// What the planner's answer text turned out to be.
#[derive(Clone, Debug, PartialEq)]
pub enum AnswerPayload {
	Prose(String),
	/// JSON grounding data. May be empty when the payload looked like JSON but did not parse.
	Grounding(Vec<GroundingItem>),
	Empty,
}

pub fn classify_answer(raw: &str) -> AnswerPayload {
	let trimmed = raw.trim();

	if trimmed.starts_with('[') || trimmed.starts_with('{') {
		match serde_json::from_str::<Value>(trimmed) {
			Ok(value @ (Value::Array(_) | Value::Object(_))) =>
				return AnswerPayload::Grounding(grounding_items(&value)),
			_ if opens_json_structure(trimmed) => return AnswerPayload::Grounding(Vec::new()),
			_ => {},
		}
	}

	if text::is_longer_than(trimmed, MIN_PROSE_CHARS) {
		AnswerPayload::Prose(trimmed.to_string())
	} else {
		AnswerPayload::Empty
	}
}

pub fn grounding_items(value: &Value) -> Vec<GroundingItem> {
	match value {
		Value::Array(items) => items
			.iter()
			.filter_map(Value::as_object)
			.map(GroundingItem::from_object)
			.filter(|item| !item.is_empty())
			.collect(),
		Value::Object(obj) => {
			let item = GroundingItem::from_object(obj);

			if item.is_empty() { Vec::new() } else { vec![item] }
		},
		_ => Vec::new(),
	}
}

/// Deterministic last-resort answer built from grounding items.
pub fn structured_summary(items: &[GroundingItem], summary_items: usize) -> String {
	let companies: BTreeSet<&str> = items
		.iter()
		.map(|item| item.company.trim())
		.filter(|company| !company.is_empty())
		.collect();
	let document_types: BTreeSet<&str> = items
		.iter()
		.map(|item| item.document_type.trim())
		.filter(|doc_type| !doc_type.is_empty())
		.collect();
	let company_list = if companies.is_empty() {
		"the analyzed companies".to_string()
	} else {
		companies.iter().copied().collect::<Vec<_>>().join(", ")
	};
	let type_list = if document_types.is_empty() {
		"financial documents".to_string()
	} else {
		document_types.iter().copied().collect::<Vec<_>>().join(", ")
	};
	let mut lines = vec![
		"# Financial Analysis Summary".to_string(),
		format!("Based on analysis of {type_list} for {company_list}:"),
		String::new(),
		"## Key Findings".to_string(),
	];

	for (idx, item) in items.iter().take(summary_items).enumerate() {
		if item.content.trim().is_empty() {
			continue;
		}

		let title = item.title.clone().unwrap_or_else(|| format!("Document {}", idx + 1));

		lines.push(format!("**{title}:**"));
		lines.push(text::preview(&item.content, SUMMARY_PREVIEW_CHARS));
		lines.push(String::new());
	}

	lines.push("## Summary".to_string());

	if companies.is_empty() || document_types.is_empty() {
		lines.push(format!(
			"This analysis covers {} relevant document sections from the financial document repository.",
			items.len()
		));
	} else {
		lines.push(format!(
			"This analysis covers {} relevant document sections from {} companies across {} document types.",
			items.len(),
			companies.len(),
			document_types.len()
		));
	}

	lines.join("\n")
}

/// `[` or `{`, then, past any whitespace, an object, a key or a closing token.
pub fn opens_json_structure(text: &str) -> bool {
	let mut chars = text.chars();

	matches!(chars.next(), Some('[' | '{'))
		&& matches!(chars.find(|ch| !ch.is_whitespace()), Some('{' | '"' | '}' | ']'))
}

fn string_field(obj: &Map<String, Value>, key: &str) -> String {
	match obj.get(key) {
		Some(Value::String(value)) => value.trim().to_string(),
		Some(Value::Number(value)) => value.to_string(),
		_ => String::new(),
	}
}
