use std::collections::HashSet;

use finrag_domain::{ActivityCategory, ActivityStep};
use finrag_providers::planner::PlanningResponse;

pub const SYNTHETIC_STEP_KIND: &str = "AgenticRetrievalQuery";

const SYNTHETIC_SUBQUERY: &str = "Complex query processed";

/// Planner-side token counts, split into the planning and ranking buckets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlanningTokens {
	pub prompt_tokens: u64,
	pub completion_tokens: u64,
	pub planning: u64,
	pub ranking: u64,
}
impl PlanningTokens {
	pub fn total(&self) -> u64 {
		self.prompt_tokens + self.completion_tokens
	}
}

/// Executed steps from the activity trace, numbered from 1.
///
/// An empty or malformed trace yields one synthetic search step against `index`.
pub fn steps(response: &PlanningResponse, index: &str) -> Vec<ActivityStep> {
	if !response.activity_well_formed || response.activity.is_empty() {
		return vec![synthetic_step(index)];
	}

	let mut subqueries = 0;

	response
		.activity
		.iter()
		.enumerate()
		.map(|(idx, activity)| {
			let subquery = activity.search.as_ref().map(|search| {
				subqueries += 1;

				format!("Subquery {subqueries}: {search}")
			});

			ActivityStep {
				step_number: idx as u32 + 1,
				kind: activity.kind.clone(),
				category: ActivityCategory::from_kind(&activity.kind),
				subquery,
				input_tokens: activity.input_tokens.unwrap_or(0),
				output_tokens: activity.output_tokens.unwrap_or(0),
				elapsed_ms: activity.elapsed_ms,
				count: activity.count,
				target_index: activity.target_index.clone(),
			}
		})
		.collect()
}

pub fn synthetic_step(index: &str) -> ActivityStep {
	ActivityStep {
		step_number: 1,
		kind: SYNTHETIC_STEP_KIND.to_string(),
		category: ActivityCategory::Search,
		subquery: Some(format!("Subquery 1: {SYNTHETIC_SUBQUERY}")),
		input_tokens: 0,
		output_tokens: 0,
		elapsed_ms: None,
		count: None,
		target_index: Some(index.to_string()).filter(|index| !index.is_empty()),
	}
}

/// Planner rewrites when reported, else the distinct subquery texts in execution order.
pub fn query_rewrites(response: &PlanningResponse) -> Vec<String> {
	if !response.query_rewrites.is_empty() {
		return response.query_rewrites.clone();
	}

	let mut seen = HashSet::new();

	response
		.activity
		.iter()
		.filter_map(|activity| activity.search.clone())
		.filter(|search| seen.insert(search.clone()))
		.collect()
}

/// Sums the usage block and every step. Ranker steps count as ranking; the rest as planning.
pub fn planning_tokens(response: &PlanningResponse) -> PlanningTokens {
	let mut tokens = PlanningTokens::default();

	if let Some(usage) = response.usage {
		tokens.prompt_tokens += usage.prompt_tokens;
		tokens.completion_tokens += usage.completion_tokens;
		tokens.planning += usage.prompt_tokens + usage.completion_tokens;
	}

	for activity in &response.activity {
		let input = activity.input_tokens.unwrap_or(0);
		let output = activity.output_tokens.unwrap_or(0);

		tokens.prompt_tokens += input;
		tokens.completion_tokens += output;

		if is_ranker(&activity.kind) {
			tokens.ranking += input + output;
		} else {
			tokens.planning += input + output;
		}
	}

	tokens
}

fn is_ranker(kind: &str) -> bool {
	kind.to_ascii_lowercase().contains("ranker")
}
