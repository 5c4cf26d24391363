use regex::{Regex, RegexBuilder};

use finrag_config::{Context, EntityHint};

use crate::{
	model::{ConversationTurn, Role},
	prompt::{self, HistoryWindow},
	text,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComposedContext {
	/// Text sent to the search gateway. Entity hints only ever land here.
	pub retrieval_query: String,
	/// Conversation block prepended to the synthesis prompt.
	pub conversation: String,
}

pub fn compose(
	question: &str,
	history: &[ConversationTurn],
	cfg: &Context,
	synthesis_window: HistoryWindow,
) -> ComposedContext {
	ComposedContext {
		retrieval_query: retrieval_query(question, history, cfg),
		conversation: prompt::conversation_block(history, synthesis_window),
	}
}

/// Prefixes the question with a short digest of the last `max_turns` turns.
///
/// User turns contribute "Previous question: ..."; assistant turns contribute at most one
/// "Context: <entity>" hint when hints are enabled.
pub fn retrieval_query(question: &str, history: &[ConversationTurn], cfg: &Context) -> String {
	let question = question.trim();
	let start = history.len().saturating_sub(cfg.max_turns as usize);
	let matchers = if cfg.entity_hints { entity_matchers(&cfg.entities) } else { Vec::new() };
	let mut parts = Vec::new();

	for turn in &history[start..] {
		let content = turn.content.trim();

		if content.is_empty() {
			continue;
		}

		match turn.role {
			Role::User => parts.push(format!(
				"Previous question: {}",
				text::clip(content, cfg.turn_char_budget as usize).trim_end()
			)),
			Role::Assistant =>
				if let Some(label) = detect_entity(content, &matchers) {
					parts.push(format!("Context: {label}"));
				},
			_ => {},
		}
	}

	if parts.is_empty() { question.to_string() } else { format!("{} - {question}", parts.join(" ")) }
}

pub fn detect_entity<'a>(content: &str, matchers: &'a [(String, Regex)]) -> Option<&'a str> {
	matchers.iter().find(|(_, re)| re.is_match(content)).map(|(label, _)| label.as_str())
}

pub fn entity_matchers(entities: &[EntityHint]) -> Vec<(String, Regex)> {
	entities
		.iter()
		.filter(|entity| !entity.aliases.is_empty())
		.filter_map(|entity| {
			let alternation = entity
				.aliases
				.iter()
				.map(|alias| regex::escape(alias.trim()))
				.collect::<Vec<_>>()
				.join("|");
			let re = RegexBuilder::new(&format!(r"\b(?:{alternation})\b"))
				.case_insensitive(true)
				.build()
				.ok()?;

			Some((entity.label.clone(), re))
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use finrag_config::Context;

	use crate::{
		context::{compose, retrieval_query},
		model::{ConversationTurn, Role},
		prompt::HistoryWindow,
	};

	fn turn(role: Role, content: &str) -> ConversationTurn {
		ConversationTurn::new(role, content)
	}

	#[test]
	fn no_history_returns_question() {
		assert_eq!(retrieval_query("  What is EBITDA? ", &[], &Context::default()), "What is EBITDA?");
	}

	#[test]
	fn user_turns_and_entity_hints_prefix_the_question() {
		let history = vec![
			turn(Role::User, "Tell me about cloud revenue"),
			turn(Role::Assistant, "MICROSOFT reported Azure growth of 29%."),
		];
		let query = retrieval_query("What about margins?", &history, &Context::default());

		assert_eq!(
			query,
			"Previous question: Tell me about cloud revenue Context: Microsoft - What about margins?"
		);
	}

	#[test]
	fn aliases_match_whole_words_only() {
		let history = vec![turn(Role::Assistant, "The metadata field was missing.")];

		assert_eq!(retrieval_query("Q", &history, &Context::default()), "Q");

		let history = vec![turn(Role::Assistant, "Alphabet's ad revenue rose.")];

		assert_eq!(retrieval_query("Q", &history, &Context::default()), "Context: Google/Alphabet - Q");
	}

	#[test]
	fn hints_can_be_disabled_and_window_is_bounded() {
		let cfg = Context { entity_hints: false, max_turns: 2, ..Context::default() };
		let history = vec![
			turn(Role::User, "old question"),
			turn(Role::Assistant, "Apple results"),
			turn(Role::User, "new question"),
		];

		assert_eq!(retrieval_query("Q", &history, &cfg), "Previous question: new question - Q");
	}

	#[test]
	fn user_turns_respect_char_budget() {
		let cfg = Context { turn_char_budget: 5, ..Context::default() };
		let history = vec![turn(Role::User, "abcdefghij")];

		assert_eq!(retrieval_query("Q", &history, &cfg), "Previous question: abcde - Q");
	}

	#[test]
	fn compose_keeps_hints_out_of_conversation_block() {
		let history = vec![turn(Role::Assistant, "Tesla deliveries fell.")];
		let composed =
			compose("Why?", &history, &Context::default(), HistoryWindow { turns: 3, chars: 200 });

		assert_eq!(composed.retrieval_query, "Context: Tesla - Why?");
		assert!(!composed.conversation.contains("Context: Tesla"));
		assert!(composed.conversation.contains("Assistant: Tesla deliveries fell.\n"));
	}
}
