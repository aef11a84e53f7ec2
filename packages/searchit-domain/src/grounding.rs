use serde::{Deserialize, Serialize};

use crate::citations::CitationValidation;

pub const DEFAULT_COVERAGE_THRESHOLD: f32 = 0.3;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbstainReason {
	LowCoverage,
	Ungrounded,
	GenerationUnavailable,
}
impl AbstainReason {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::LowCoverage => "low_coverage",
			Self::Ungrounded => "ungrounded",
			Self::GenerationUnavailable => "generation_unavailable",
		}
	}
}

/// Phases of one ask request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AskPhase {
	Retrieving,
	Assembling,
	Generating,
	Validating,
	Answered,
	Abstained,
}
impl AskPhase {
	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Answered | Self::Abstained)
	}

	pub fn can_advance_to(self, next: Self) -> bool {
		matches!(
			(self, next),
			(Self::Retrieving, Self::Assembling)
				| (Self::Retrieving, Self::Abstained)
				| (Self::Assembling, Self::Generating)
				| (Self::Assembling, Self::Abstained)
				| (Self::Generating, Self::Generating)
				| (Self::Generating, Self::Validating)
				| (Self::Generating, Self::Abstained)
				| (Self::Validating, Self::Answered)
				| (Self::Validating, Self::Abstained)
		)
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[error("Invalid ask transition from {from:?} to {to:?}.")]
pub struct InvalidTransition {
	pub from: AskPhase,
	pub to: AskPhase,
}

/// Records the path an ask request takes through its phases.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AskStateMachine {
	history: Vec<AskPhase>,
}
impl AskStateMachine {
	pub fn new() -> Self {
		Self { history: vec![AskPhase::Retrieving] }
	}

	pub fn phase(&self) -> AskPhase {
		self.history.last().copied().unwrap_or(AskPhase::Retrieving)
	}

	pub fn history(&self) -> &[AskPhase] {
		&self.history
	}

	pub fn advance(&mut self, next: AskPhase) -> Result<(), InvalidTransition> {
		let from = self.phase();

		if !from.can_advance_to(next) {
			return Err(InvalidTransition { from, to: next });
		}

		tracing::debug!(from = ?from, to = ?next, "Ask phase transition.");

		self.history.push(next);

		Ok(())
	}
}
impl Default for AskStateMachine {
	fn default() -> Self {
		Self::new()
	}
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Verdict {
	Answered { coverage: f32 },
	Abstained { reason: AbstainReason, coverage: f32 },
}

/// Fraction of the supplied chunks cited at least once, clamped to `[0, 1]`.
pub fn evidence_coverage(distinct_cited_chunks: usize, context_chunks: usize) -> f32 {
	if context_chunks == 0 {
		return 0.0;
	}

	(distinct_cited_chunks as f32 / context_chunks as f32).clamp(0.0, 1.0)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundingPolicy {
	coverage_threshold: f32,
}
impl GroundingPolicy {
	pub fn new(coverage_threshold: f32) -> Self {
		let coverage_threshold = if coverage_threshold.is_finite() {
			coverage_threshold.clamp(0.0, 1.0)
		} else {
			DEFAULT_COVERAGE_THRESHOLD
		};

		Self { coverage_threshold }
	}

	pub fn from_config(cfg: &searchit_config::Grounding) -> Self {
		Self::new(cfg.coverage_threshold)
	}

	pub fn coverage_threshold(&self) -> f32 {
		self.coverage_threshold
	}

	/// Decides the terminal outcome after validation.
	///
	/// With `enforce` unset only the empty-context rule applies.
	pub fn decide(
		&self,
		context_chunks: usize,
		validation: &CitationValidation,
		enforce: bool,
	) -> Verdict {
		if context_chunks == 0 {
			return Verdict::Abstained { reason: AbstainReason::LowCoverage, coverage: 0.0 };
		}

		let coverage = evidence_coverage(validation.distinct_chunks(), context_chunks);

		if !enforce {
			return Verdict::Answered { coverage };
		}
		if validation.valid.is_empty() || validation.answer_text.trim().is_empty() {
			return Verdict::Abstained { reason: AbstainReason::Ungrounded, coverage };
		}
		if coverage < self.coverage_threshold {
			return Verdict::Abstained { reason: AbstainReason::LowCoverage, coverage };
		}

		Verdict::Answered { coverage }
	}
}
impl Default for GroundingPolicy {
	fn default() -> Self {
		Self::new(DEFAULT_COVERAGE_THRESHOLD)
	}
}
