mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Agentic, Citations, Config, Context, EmbeddingProviderConfig, EntityHint, LlmProviderConfig,
	PlannerProviderConfig, ProtocolProviderConfig, Providers, Retrieval, SearchProviderConfig,
	Service, Synthesis,
};

use std::{env, fs, path::Path};

const ENV_PREFIX: &str = "env:";

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	resolve_env(&mut cfg)?;
	normalize(&mut cfg);
	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	let providers = &cfg.providers;

	for (field, api_base) in [
		("providers.embedding.api_base", &providers.embedding.api_base),
		("providers.completion.api_base", &providers.completion.api_base),
		("providers.search.api_base", &providers.search.api_base),
		("providers.protocol.api_base", &providers.protocol.api_base),
		("providers.planner.api_base", &providers.planner.api_base),
	] {
		if api_base.trim().is_empty() {
			return Err(invalid(format!("{field} must be non-empty.")));
		}
	}
	for (field, api_key) in [
		("providers.embedding.api_key", &providers.embedding.api_key),
		("providers.completion.api_key", &providers.completion.api_key),
		("providers.search.api_key", &providers.search.api_key),
		("providers.planner.api_key", &providers.planner.api_key),
	] {
		if api_key.trim().is_empty() {
			return Err(invalid(format!("{field} must be non-empty.")));
		}
	}
	for (field, auth_header) in [
		("providers.embedding.auth_header", &providers.embedding.auth_header),
		("providers.completion.auth_header", &providers.completion.auth_header),
		("providers.search.auth_header", &providers.search.auth_header),
		("providers.planner.auth_header", &providers.planner.auth_header),
	] {
		if !matches!(auth_header.as_str(), "bearer" | "api-key") {
			return Err(invalid(format!("{field} must be one of bearer or api-key.")));
		}
	}

	if providers.search.index.trim().is_empty() {
		return Err(invalid("providers.search.index must be non-empty."));
	}
	if providers.planner.agent_name.trim().is_empty() {
		return Err(invalid("providers.planner.agent_name must be non-empty."));
	}
	if let Some(dimensions) = providers.embedding.dimensions
		&& dimensions == 0
	{
		return Err(invalid("providers.embedding.dimensions must be greater than zero."));
	}

	for (field, value) in [
		("retrieval.score_threshold", cfg.retrieval.score_threshold),
		("retrieval.rerank_threshold", cfg.retrieval.rerank_threshold),
		("agentic.reranker_threshold", cfg.agentic.reranker_threshold),
	] {
		if !value.is_finite() {
			return Err(invalid(format!("{field} must be a finite number.")));
		}
		if value < 0.0 {
			return Err(invalid(format!("{field} must be zero or greater.")));
		}
	}
	for (field, value) in [
		("retrieval.top_k", cfg.retrieval.top_k),
		("retrieval.fast_top_k", cfg.retrieval.fast_top_k),
		("retrieval.protocol_top_k", cfg.retrieval.protocol_top_k),
		("citations.max_excerpt_chars", cfg.citations.max_excerpt_chars),
		("context.max_turns", cfg.context.max_turns),
		("synthesis.max_documents", cfg.synthesis.max_documents),
		("agentic.top_k", cfg.agentic.top_k),
		("agentic.max_subqueries", cfg.agentic.max_subqueries),
		("agentic.grounding_items", cfg.agentic.grounding_items),
	] {
		if value == 0 {
			return Err(invalid(format!("{field} must be greater than zero.")));
		}
	}

	if !cfg.synthesis.temperature.is_finite() || !(0.0..=2.0).contains(&cfg.synthesis.temperature)
	{
		return Err(invalid("synthesis.temperature must be in the range 0.0-2.0."));
	}
	if !matches!(cfg.synthesis.fast_answer.as_str(), "llm" | "template") {
		return Err(invalid("synthesis.fast_answer must be one of llm or template."));
	}
	if cfg.agentic.summary_items > cfg.agentic.grounding_items {
		return Err(invalid("agentic.summary_items must be at most agentic.grounding_items."));
	}
	if cfg.context.entities.iter().any(|entity| entity.label.trim().is_empty()) {
		return Err(invalid("context.entities.label must be non-empty."));
	}

	Ok(())
}

fn invalid(message: impl Into<String>) -> Error {
	Error::Validation { message: message.into() }
}

fn resolve_env(cfg: &mut Config) -> Result<()> {
	let providers = &mut cfg.providers;

	for (field, api_key) in [
		("providers.embedding.api_key", &mut providers.embedding.api_key),
		("providers.completion.api_key", &mut providers.completion.api_key),
		("providers.search.api_key", &mut providers.search.api_key),
		("providers.planner.api_key", &mut providers.planner.api_key),
	] {
		let Some(name) = api_key.strip_prefix(ENV_PREFIX).map(|name| name.trim().to_string()) else {
			continue;
		};

		*api_key = env::var(&name)
			.map_err(|_| Error::MissingEnv { field: field.to_string(), name: name.clone() })?;
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	let providers = &mut cfg.providers;

	for api_base in [
		&mut providers.embedding.api_base,
		&mut providers.completion.api_base,
		&mut providers.search.api_base,
		&mut providers.protocol.api_base,
		&mut providers.planner.api_base,
	] {
		let trimmed = api_base.trim().trim_end_matches('/').to_string();

		*api_base = trimmed;
	}
	for auth_header in [
		&mut providers.embedding.auth_header,
		&mut providers.completion.auth_header,
		&mut providers.search.auth_header,
		&mut providers.planner.auth_header,
	] {
		*auth_header = auth_header.trim().to_ascii_lowercase();
	}

	cfg.synthesis.fast_answer = cfg.synthesis.fast_answer.trim().to_ascii_lowercase();

	for entity in &mut cfg.context.entities {
		for alias in &mut entity.aliases {
			*alias = alias.trim().to_lowercase();
		}

		entity.aliases.retain(|alias| !alias.is_empty());
	}

	cfg.context.entities.retain(|entity| !entity.aliases.is_empty());
}
