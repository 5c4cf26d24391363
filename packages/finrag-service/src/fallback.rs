use std::future::Future;

use uuid::Uuid;

use crate::{BoxFuture, Error, Result, Stage};

/// Outcome of one tier.
#[derive(Debug)]
pub enum Attempt<T> {
	Done(T),
	/// Hand over to the next tier, with the error that caused it if there was one.
	TryNext(Option<Error>),
}

pub struct Tier<'a, T> {
	label: &'static str,
	run: BoxFuture<'a, Attempt<T>>,
}
impl<'a, T> Tier<'a, T>
where
	T: 'a,
{
	pub fn new<F>(label: &'static str, fut: F) -> Self
	where
		F: Future<Output = Attempt<T>> + Send + 'a,
	{
		Self { label, run: Box::pin(fut) }
	}

	pub fn fallible<F>(label: &'static str, fut: F) -> Self
	where
		F: Future<Output = Result<T>> + Send + 'a,
	{
		Self::new(label, async move {
			match fut.await {
				Ok(value) => Attempt::Done(value),
				Err(err) => Attempt::TryNext(Some(err)),
			}
		})
	}

	pub fn infallible<F>(label: &'static str, fut: F) -> Self
	where
		F: Future<Output = T> + Send + 'a,
	{
		Self::new(label, async move { Attempt::Done(fut.await) })
	}
}

#[derive(Debug)]
pub struct Resolved<T> {
	pub value: T,
	pub tier: &'static str,
	/// Errors from the tiers skipped on the way, in order.
	pub failures: Vec<Error>,
}
impl<T> Resolved<T> {
	pub fn degraded(&self) -> bool {
		!self.failures.is_empty()
	}
}

/// Ordered list of strategies for one stage, tried until one is done.
///
/// Tiers are lazy: a tier's gateway call only starts when every earlier tier has handed over.
pub struct FallbackChain<'a, T> {
	stage: Stage,
	query_id: Uuid,
	tiers: Vec<Tier<'a, T>>,
}
impl<'a, T> FallbackChain<'a, T>
where
	T: 'a,
{
	pub fn new(stage: Stage, query_id: Uuid) -> Self {
		Self { stage, query_id, tiers: Vec::new() }
	}

	pub fn tier(mut self, tier: Tier<'a, T>) -> Self {
		self.tiers.push(tier);

		self
	}

	/// Runs the tiers in order; fails with the last tier error when none is done.
	pub async fn run(self) -> Result<Resolved<T>> {
		let stage = self.stage;
		let (outcome, mut failures) = self.attempt().await;

		match outcome {
			Some((value, tier)) => Ok(Resolved { value, tier, failures }),
			None => Err(failures.pop().unwrap_or_else(|| stage.error("No tier produced a result."))),
		}
	}

	/// Runs the tiers in order, ending with `floor` when every tier hands over.
	pub async fn settle<F>(self, label: &'static str, floor: F) -> Resolved<T>
	where
		F: Future<Output = T>,
	{
		let (stage, query_id) = (self.stage, self.query_id);
		let (outcome, failures) = self.attempt().await;

		match outcome {
			Some((value, tier)) => Resolved { value, tier, failures },
			None => {
				tracing::info!(
					stage = stage.as_str(),
					query_id = %query_id,
					tier = label,
					"Resolved by fallback tier."
				);

				Resolved { value: floor.await, tier: label, failures }
			},
		}
	}

	async fn attempt(self) -> (Option<(T, &'static str)>, Vec<Error>) {
		let Self { stage, query_id, tiers } = self;
		let mut failures = Vec::new();

		for (position, tier) in tiers.into_iter().enumerate() {
			match tier.run.await {
				Attempt::Done(value) => {
					if position > 0 {
						tracing::info!(
							stage = stage.as_str(),
							query_id = %query_id,
							tier = tier.label,
							"Resolved by fallback tier."
						);
					}

					return (Some((value, tier.label)), failures);
				},
				Attempt::TryNext(Some(err)) => {
					tracing::warn!(
						error = %err,
						stage = stage.as_str(),
						query_id = %query_id,
						tier = tier.label,
						"Tier failed; trying the next tier."
					);

					failures.push(err);
				},
				Attempt::TryNext(None) => {
					tracing::debug!(
						stage = stage.as_str(),
						query_id = %query_id,
						tier = tier.label,
						"Tier declined; trying the next tier."
					);
				},
			}
		}

		(None, failures)
	}
}
