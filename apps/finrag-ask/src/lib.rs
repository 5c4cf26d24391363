use std::{fs, path::PathBuf, sync::Arc};

use clap::Parser;
use color_eyre::eyre;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use finrag_domain::{ConversationTurn, Query};
use finrag_service::{FinragService, TokenLedger};

#[derive(Debug, Parser)]
#[command(
	version = finrag_cli::VERSION,
	rename_all = "kebab",
	styles = finrag_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// fast, agentic or protocol (aliases: fast-rag, agentic-rag, mcp-rag).
	#[arg(long, short = 'm', value_name = "MODE", default_value = "fast")]
	pub mode: String,
	/// JSON array of `{ "role": "user" | "assistant", "content": "..." }` turns.
	#[arg(long, value_name = "FILE.json")]
	pub history: Option<PathBuf>,
	#[arg(long = "filter", short = 'f', value_name = "FIELD=VALUE", value_parser = parse_filter)]
	pub filters: Vec<(String, Value)>,
	#[arg(long, value_name = "N")]
	pub top_k: Option<u32>,
	#[arg(long, value_name = "ID")]
	pub session: Option<String>,
	/// Re-run in fast mode when the agentic strategy fails.
	#[arg(long)]
	pub strategy_fallback: bool,
	#[arg(value_name = "QUESTION", required = true, num_args = 1..)]
	pub question: Vec<String>,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = finrag_config::load(&args.config)?;

	init_tracing(&config.service.log_level)?;

	let query = build_query(&args)?;
	let service = FinragService::new(config, Arc::new(TokenLedger::new()));
	let result = if args.strategy_fallback {
		service.synthesize_with_strategy_fallback(&query).await
	} else {
		service.synthesize(&query).await
	};

	if let Some(tracking_id) = result.tracking_id
		&& let Some(record) = service.ledger().record(tracking_id)
	{
		let totals = record.totals();

		tracing::info!(
			%tracking_id,
			entries = record.entries.len(),
			total_tokens = totals.total_tokens,
			"Token usage recorded."
		);
	}

	let json = serde_json::to_string_pretty(&result)?;

	println!("{json}");

	Ok(())
}

fn init_tracing(log_level: &str) -> color_eyre::Result<()> {
	let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.try_init()
		.map_err(|err| eyre::eyre!("Failed to initialize tracing: {err}."))
}

fn build_query(args: &Args) -> color_eyre::Result<Query> {
	let mut query = Query::new(args.question.join(" "), args.mode.clone());

	if let Some(path) = &args.history {
		let raw = fs::read_to_string(path)?;
		let history: Vec<ConversationTurn> = serde_json::from_str(&raw)
			.map_err(|err| eyre::eyre!("Invalid history file {}: {err}.", path.display()))?;

		query = query.with_history(history);
	}
	for (field, value) in &args.filters {
		query = query.with_filter(field.clone(), value.clone());
	}
	if let Some(top_k) = args.top_k {
		query = query.with_top_k(top_k);
	}
	if let Some(session) = &args.session {
		query = query.with_session(session.clone());
	}

	Ok(query)
}

/// `field=value`. Numbers and booleans stay unquoted in the filter expression.
fn parse_filter(raw: &str) -> Result<(String, Value), String> {
	let (field, value) =
		raw.split_once('=').ok_or_else(|| format!("Expected FIELD=VALUE, got {raw:?}."))?;
	let field = field.trim();

	if field.is_empty() {
		return Err("Filter field must not be empty.".to_string());
	}

	let value = value.trim();
	let value = if let Ok(flag) = value.parse::<bool>() {
		Value::Bool(flag)
	} else if let Ok(int) = value.parse::<i64>() {
		Value::from(int)
	} else if let Ok(float) = value.parse::<f64>()
		&& float.is_finite()
	{
		Value::from(float)
	} else {
		Value::String(value.to_string())
	};

	Ok((field.to_string(), value))
}
