use std::{future::Future, time::Duration};

use tokio::time::Instant;

/// Overall time budget of one request, shared by every stage.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
	started: Instant,
	budget: Duration,
}
impl Deadline {
	pub fn after_ms(budget_ms: u64) -> Self {
		Self { started: Instant::now(), budget: Duration::from_millis(budget_ms) }
	}

	pub fn remaining(&self) -> Duration {
		self.budget.saturating_sub(self.started.elapsed())
	}

	pub fn is_expired(&self) -> bool {
		self.remaining().is_zero()
	}

	/// The stage's own timeout, capped by what is left of the request budget.
	pub fn stage_timeout(&self, stage_timeout_ms: u64) -> Duration {
		Duration::from_millis(stage_timeout_ms).min(self.remaining())
	}

	/// Awaits `fut` for at most [`Self::stage_timeout`].
	pub async fn run<T, F>(&self, stage_timeout_ms: u64, fut: F) -> Result<T, StageError>
	where
		F: Future<Output = color_eyre::Result<T>>,
	{
		let timeout = self.stage_timeout(stage_timeout_ms);

		if timeout.is_zero() {
			return Err(StageError::DeadlineExceeded);
		}

		match tokio::time::timeout(timeout, fut).await {
			Ok(Ok(value)) => Ok(value),
			Ok(Err(err)) => Err(StageError::Failed { message: err.to_string() }),
			Err(_) if self.is_expired() => Err(StageError::DeadlineExceeded),
			Err(_) => Err(StageError::TimedOut { timeout_ms: timeout.as_millis() as u64 }),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
	#[error("Stage timed out after {timeout_ms} ms.")]
	TimedOut { timeout_ms: u64 },
	#[error("Request deadline exceeded.")]
	DeadlineExceeded,
	#[error("{message}")]
	Failed { message: String },
}
impl StageError {
	pub fn is_deadline(&self) -> bool {
		matches!(self, Self::DeadlineExceeded)
	}
}
