pub mod agentic;
pub mod error;
pub mod fallback;
pub mod fast;
pub mod ledger;
pub mod synthesize;

pub use error::{Error, Result, Stage};
pub use ledger::{OperationType, TokenLedger, TrackingRequest, UsageEntry, UsageRecord};

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use time::OffsetDateTime;

use finrag_config::{
	Config, EmbeddingProviderConfig, LlmProviderConfig, PlannerProviderConfig,
	ProtocolProviderConfig, SearchProviderConfig,
};
use finrag_domain::SearchHit;
use finrag_providers::{
	completion::{self, Completion, CompletionRequest},
	embedding,
	planner::{self, PlanningRequest, PlanningResponse},
	protocol,
	search::{self, SearchRequest},
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, finrag_providers::Result<Vec<Vec<f32>>>>;
}

pub trait SearchProvider
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a SearchProviderConfig,
		request: &'a SearchRequest,
	) -> BoxFuture<'a, finrag_providers::Result<Vec<SearchHit>>>;

	fn lookup<'a>(
		&'a self,
		cfg: &'a SearchProviderConfig,
		doc_key: &'a str,
	) -> BoxFuture<'a, finrag_providers::Result<Option<SearchHit>>>;
}

pub trait ProtocolSearchProvider
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a ProtocolProviderConfig,
		request: &'a SearchRequest,
	) -> BoxFuture<'a, finrag_providers::Result<Vec<SearchHit>>>;
}

pub trait CompletionProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		request: &'a CompletionRequest,
	) -> BoxFuture<'a, finrag_providers::Result<Completion>>;
}

pub trait PlannerProvider
where
	Self: Send + Sync,
{
	fn retrieve<'a>(
		&'a self,
		cfg: &'a PlannerProviderConfig,
		request: &'a PlanningRequest,
	) -> BoxFuture<'a, finrag_providers::Result<PlanningResponse>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub search: Arc<dyn SearchProvider>,
	pub protocol: Arc<dyn ProtocolSearchProvider>,
	pub completion: Arc<dyn CompletionProvider>,
	pub planner: Arc<dyn PlannerProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		search: Arc<dyn SearchProvider>,
		protocol: Arc<dyn ProtocolSearchProvider>,
		completion: Arc<dyn CompletionProvider>,
		planner: Arc<dyn PlannerProvider>,
	) -> Self {
		Self { embedding, search, protocol, completion, planner }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self {
			embedding: provider.clone(),
			search: provider.clone(),
			protocol: provider.clone(),
			completion: provider.clone(),
			planner: provider,
		}
	}
}

pub struct FinragService {
	pub cfg: Config,
	pub providers: Providers,
	ledger: Arc<TokenLedger>,
}
impl FinragService {
	pub fn new(cfg: Config, ledger: Arc<TokenLedger>) -> Self {
		Self { cfg, providers: Providers::default(), ledger }
	}

	pub fn with_providers(cfg: Config, providers: Providers, ledger: Arc<TokenLedger>) -> Self {
		Self { cfg, providers, ledger }
	}

	pub fn ledger(&self) -> &Arc<TokenLedger> {
		&self.ledger
	}
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, finrag_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl SearchProvider for DefaultProviders {
	fn search<'a>(
		&'a self,
		cfg: &'a SearchProviderConfig,
		request: &'a SearchRequest,
	) -> BoxFuture<'a, finrag_providers::Result<Vec<SearchHit>>> {
		Box::pin(search::search(cfg, request))
	}

	fn lookup<'a>(
		&'a self,
		cfg: &'a SearchProviderConfig,
		doc_key: &'a str,
	) -> BoxFuture<'a, finrag_providers::Result<Option<SearchHit>>> {
		Box::pin(search::lookup(cfg, doc_key))
	}
}

impl ProtocolSearchProvider for DefaultProviders {
	fn search<'a>(
		&'a self,
		cfg: &'a ProtocolProviderConfig,
		request: &'a SearchRequest,
	) -> BoxFuture<'a, finrag_providers::Result<Vec<SearchHit>>> {
		Box::pin(protocol::search(cfg, request))
	}
}

impl CompletionProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		request: &'a CompletionRequest,
	) -> BoxFuture<'a, finrag_providers::Result<Completion>> {
		Box::pin(completion::complete(cfg, request))
	}
}

impl PlannerProvider for DefaultProviders {
	fn retrieve<'a>(
		&'a self,
		cfg: &'a PlannerProviderConfig,
		request: &'a PlanningRequest,
	) -> BoxFuture<'a, finrag_providers::Result<PlanningResponse>> {
		Box::pin(planner::retrieve(cfg, request))
	}
}

/// Stable 12-hex-char fingerprint logged in place of the question text.
pub fn query_hash(text: &str) -> String {
	let hash = blake3::hash(text.trim().as_bytes()).to_hex();

	hash[..12].to_string()
}

/// Awaits a gateway call under `timeout_ms`; a timeout counts as a failure of `stage`.
pub(crate) async fn guarded<T, F>(stage: Stage, timeout_ms: u64, fut: F) -> Result<T>
where
	F: Future<Output = finrag_providers::Result<T>>,
{
	match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
		Ok(Ok(value)) => Ok(value),
		Ok(Err(err)) => Err(stage.error(err.to_string())),
		Err(_) => Err(stage.error(format!("Timed out after {timeout_ms} ms."))),
	}
}

pub(crate) fn elapsed_ms(started: OffsetDateTime) -> u64 {
	let elapsed = OffsetDateTime::now_utc() - started;

	elapsed.whole_milliseconds().max(0) as u64
}
