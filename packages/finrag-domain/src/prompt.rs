use crate::{
	grounding::GroundingItem,
	model::{ConversationTurn, Role, SearchHit},
	text,
};

pub const ANALYST_SYSTEM_PROMPT: &str = "You are a senior financial analyst with expertise in analyzing SEC filings and financial documents.
Your task is to provide comprehensive, analytical responses based on the provided document excerpts.

Guidelines:
- Provide detailed, analytical insights based on the document content
- Structure your response with clear sections and headings
- Use specific data points and quotes from the documents
- Reference document sources appropriately
- Focus on factual information and avoid speculation
- Use professional financial analysis language
- If documents contain conflicting information, acknowledge and explain the differences
- Always cite which documents support your statements";

pub const GROUNDING_SYSTEM_PROMPT: &str = "You are a senior financial analyst. Provide comprehensive, analytical responses based on the provided document excerpts. Focus on key insights, trends, and actionable information. Use professional financial language and structure your analysis logically.";

const ANSWER_INSTRUCTIONS: &str = "Please provide a detailed analysis that addresses the question using the information from these documents. Structure your response clearly and cite specific information from the documents.";

const GROUNDING_INSTRUCTIONS: &str = "Analysis instructions:
1. Provide a comprehensive analysis of the key financial information
2. Identify trends, patterns, and significant metrics
3. Compare data across companies/time periods where applicable
4. Structure your response with clear headings and sections
5. Cite specific document sources for all claims
6. Focus on actionable insights and professional analysis";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HistoryWindow {
	pub turns: usize,
	pub chars: usize,
}
impl HistoryWindow {
	pub const NONE: Self = Self { turns: 0, chars: 0 };
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PromptDocument {
	pub title: String,
	pub company: String,
	pub document_type: String,
	pub filing_date: String,
	pub content: String,
}
impl From<&SearchHit> for PromptDocument {
	fn from(hit: &SearchHit) -> Self {
		Self {
			title: hit.title.clone(),
			company: hit.metadata.company.clone(),
			document_type: hit.metadata.document_type.clone(),
			filing_date: hit.metadata.filing_date.clone(),
			content: hit.content.clone(),
		}
	}
}
impl From<&GroundingItem> for PromptDocument {
	fn from(item: &GroundingItem) -> Self {
		Self {
			title: item.title.clone().unwrap_or_default(),
			company: item.company.clone(),
			document_type: item.document_type.clone(),
			filing_date: item.filing_date.clone(),
			content: item.content.clone(),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionPrompt {
	pub system: String,
	pub user: String,
}

/// One layout shared by every strategy; only the role text, caps and history window vary.
#[derive(Clone, Copy, Debug)]
pub struct PromptTemplate<'a> {
	pub system: &'a str,
	pub instructions: &'a str,
	pub max_documents: usize,
	pub excerpt_chars: usize,
	pub history: HistoryWindow,
}
impl<'a> PromptTemplate<'a> {
	pub fn answer(max_documents: usize, excerpt_chars: usize, history: HistoryWindow) -> Self {
		Self {
			system: ANALYST_SYSTEM_PROMPT,
			instructions: ANSWER_INSTRUCTIONS,
			max_documents,
			excerpt_chars,
			history,
		}
	}

	pub fn grounding(max_documents: usize, excerpt_chars: usize) -> Self {
		Self {
			system: GROUNDING_SYSTEM_PROMPT,
			instructions: GROUNDING_INSTRUCTIONS,
			max_documents,
			excerpt_chars,
			history: HistoryWindow::NONE,
		}
	}

	pub fn render(
		&self,
		question: &str,
		history: &[ConversationTurn],
		documents: &[PromptDocument],
	) -> CompletionPrompt {
		let conversation = conversation_block(history, self.history);

		self.render_with_conversation(&conversation, question, documents)
	}

	/// Like [`PromptTemplate::render`], with a conversation block that was already composed.
	pub fn render_with_conversation(
		&self,
		conversation: &str,
		question: &str,
		documents: &[PromptDocument],
	) -> CompletionPrompt {
		let mut user = conversation.to_string();

		user.push_str(&format!("Question: {}\n\n", question.trim()));
		user.push_str(
			"Based on the following financial document excerpts, provide a comprehensive analytical response:\n\n",
		);

		for (idx, doc) in documents.iter().take(self.max_documents).enumerate() {
			user.push_str(&render_document(idx + 1, doc, self.excerpt_chars));
		}

		user.push_str(self.instructions);

		CompletionPrompt { system: self.system.to_string(), user }
	}
}

/// "Previous conversation context" block over the last `window.turns` turns, or empty.
pub fn conversation_block(history: &[ConversationTurn], window: HistoryWindow) -> String {
	let start = history.len().saturating_sub(window.turns);
	let turns = &history[start..];

	if turns.is_empty() {
		return String::new();
	}

	let mut block = String::from("Previous conversation context:\n");

	for turn in turns {
		let role = match turn.role {
			Role::Other => "User",
			role => role.label(),
		};

		block.push_str(&format!("{role}: {}\n", text::preview(&turn.content, window.chars)));
	}

	block.push('\n');

	block
}

fn render_document(number: usize, doc: &PromptDocument, excerpt_chars: usize) -> String {
	let title = if doc.title.trim().is_empty() {
		format!("Document {number}")
	} else {
		doc.title.trim().to_string()
	};
	let mut out = format!("**Document {number}: {title}**\n");

	for (label, value) in [
		("Company", &doc.company),
		("Document Type", &doc.document_type),
		("Filing Date", &doc.filing_date),
	] {
		if !value.trim().is_empty() {
			out.push_str(&format!("{label}: {}\n", value.trim()));
		}
	}

	out.push_str(&format!("Content: {}\n\n", text::preview(&doc.content, excerpt_chars)));

	out
}
