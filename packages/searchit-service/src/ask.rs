use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use searchit_domain::{
	AbstainReason, AskPhase, AskStateMachine, AssembledContext, Citation, ContextAssembler,
	GroundingPolicy, RrfFusion, Verdict, citations,
};

use crate::{Deadline, Degradation, Result, SearchItService};

const SYSTEM_PROMPT: &str = "\
You answer questions using only the numbered context chunks supplied by the user.
Cite every claim inline with a marker of the form [chunk_id:start-end], where chunk_id is the \
id shown in the chunk header and start-end is the half-open character range of the supporting \
text inside that chunk.
Never cite chunks that were not supplied. If the context does not contain the answer, say so \
without citations.";

#[derive(Clone, Debug, Deserialize)]
pub struct AskRequest {
	pub question: String,
	/// Overrides the configured rerank depth for this request.
	#[serde(default)]
	pub top_k: Option<u32>,
	#[serde(default = "default_true")]
	pub ground: bool,
	#[serde(default)]
	pub filters: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AskResponse {
	pub answer: Option<String>,
	pub citations: Vec<Citation>,
	pub evidence_coverage: f32,
	pub abstained: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<AbstainReason>,
	#[serde(flatten)]
	pub degradation: Degradation,
}
impl AskResponse {
	pub fn abstained(reason: AbstainReason, coverage: f32, degradation: Degradation) -> Self {
		Self {
			answer: None,
			citations: Vec::new(),
			evidence_coverage: coverage,
			abstained: true,
			reason: Some(reason),
			degradation,
		}
	}
}

impl SearchItService {
	pub async fn ask(&self, req: AskRequest) -> Result<AskResponse> {
		let deadline = Deadline::after_ms(self.cfg.service.request_timeout_ms);
		let top_k = req.top_k.unwrap_or(self.cfg.rerank.top_m);
		let query = self.build_query("question", &req.question, Some(top_k), req.filters)?;
		let mut machine = AskStateMachine::new();

		tracing::info!(
			question_len = query.text.len(),
			top_k = query.top_k,
			ground = req.ground,
			"Ask request."
		);

		let retrieval = self.retrieve(&query, &deadline).await?;
		let fused = RrfFusion::from_config(&self.cfg.fusion).fuse(&retrieval.lists);
		let reranked = self
			.rerank_stage(&query.text, &fused, &retrieval.chunks, query.top_k as usize, &deadline)
			.await;
		let mut degradation = Degradation::from_retrieval(&retrieval);

		degradation.unreranked = reranked.unreranked;
		degradation.deadline_exceeded |= reranked.deadline_exceeded;

		machine.advance(AskPhase::Assembling)?;

		let context = ContextAssembler::from_config(&self.cfg.context)
			.assemble(&reranked.candidates, &retrieval.chunks);

		if context.is_empty() {
			machine.advance(AskPhase::Abstained)?;

			tracing::info!(
				reason = AbstainReason::LowCoverage.as_str(),
				"Ask abstained without context."
			);

			return Ok(AskResponse::abstained(AbstainReason::LowCoverage, 0.0, degradation));
		}

		machine.advance(AskPhase::Generating)?;

		let generated = self
			.generate_with_retry(&query.text, context, &deadline, &mut machine, &mut degradation)
			.await?;
		let Some((text, context)) = generated else {
			machine.advance(AskPhase::Abstained)?;

			let reason = AbstainReason::GenerationUnavailable;

			tracing::warn!(reason = reason.as_str(), "Ask abstained after generation failures.");

			return Ok(AskResponse::abstained(reason, 0.0, degradation));
		};

		machine.advance(AskPhase::Validating)?;

		let validation = citations::validate_citations(&text, &context);

		for dropped in &validation.dropped {
			tracing::debug!(
				chunk_id = %dropped.citation.chunk_id,
				start = dropped.citation.span.start,
				end = dropped.citation.span.end,
				reason = ?dropped.reason,
				"Dropped invalid citation."
			);
		}

		let policy = GroundingPolicy::from_config(&self.cfg.grounding);
		let verdict = policy.decide(context.len(), &validation, req.ground);

		match verdict {
			Verdict::Answered { coverage } => {
				machine.advance(AskPhase::Answered)?;

				tracing::info!(
					citations = validation.valid.len(),
					dropped = validation.dropped.len(),
					coverage,
					"Ask answered."
				);

				Ok(AskResponse {
					answer: Some(validation.answer_text),
					citations: validation.valid,
					evidence_coverage: coverage,
					abstained: false,
					reason: None,
					degradation,
				})
			},
			Verdict::Abstained { reason, coverage } => {
				machine.advance(AskPhase::Abstained)?;

				tracing::info!(
					reason = reason.as_str(),
					citations = validation.valid.len(),
					dropped = validation.dropped.len(),
					coverage,
					"Ask abstained."
				);

				Ok(AskResponse::abstained(reason, coverage, degradation))
			},
		}
	}

	/// One call on the full context, then one retry on a shortened context.
	///
	/// Returns the generated text with the context it was produced from, or `None` when both
	/// attempts failed or the request deadline ran out.
	async fn generate_with_retry(
		&self,
		question: &str,
		context: AssembledContext,
		deadline: &Deadline,
		machine: &mut AskStateMachine,
		degradation: &mut Degradation,
	) -> Result<Option<(String, AssembledContext)>> {
		let cfg = &self.cfg.providers.generation;
		let mut context = context;

		for attempt in 1..=2_u32 {
			if attempt > 1 {
				context = context.shortened(self.cfg.grounding.retry_context_ratio);

				machine.advance(AskPhase::Generating)?;
			}

			let messages = prompt_messages(question, &context);
			let generated = self.providers.generation.generate(cfg, &messages);

			match deadline.run(cfg.timeout_ms, generated).await {
				Ok(text) => return Ok(Some((text, context))),
				Err(err) => {
					tracing::warn!(
						attempt,
						context_chunks = context.len(),
						error = %err,
						"Generation call failed."
					);

					if err.is_deadline() {
						degradation.deadline_exceeded = true;

						break;
					}
				},
			}
		}

		Ok(None)
	}
}

/// Chat messages asking for an answer grounded in `context`.
pub fn prompt_messages(question: &str, context: &AssembledContext) -> Vec<Value> {
	let mut user = String::new();

	for chunk in &context.chunks {
		user.push_str(&format!(
			"[{}] chunk_id={} doc_id={} chars={}\n{}\n\n",
			chunk.position, chunk.chunk_id, chunk.doc_id, chunk.char_len, chunk.text
		));
	}

	user.push_str("Question: ");
	user.push_str(question);

	vec![
		serde_json::json!({ "role": "system", "content": SYSTEM_PROMPT }),
		serde_json::json!({ "role": "user", "content": user }),
	]
}

fn default_true() -> bool {
	true
}

#[cfg(test)]
mod tests {
	use searchit_domain::ContextChunk;

	use super::*;

	#[test]
	fn prompt_lists_every_chunk_with_its_id() {
		let context = AssembledContext {
			chunks: vec![
				ContextChunk {
					chunk_id: "c1".to_string(),
					doc_id: "d1".to_string(),
					text: "Alpha".to_string(),
					token_count: 1,
					char_len: 5,
					position: 1,
				},
				ContextChunk {
					chunk_id: "c2".to_string(),
					doc_id: "d2".to_string(),
					text: "Beta".to_string(),
					token_count: 1,
					char_len: 4,
					position: 2,
				},
			],
			total_tokens: 2,
		};
		let messages = prompt_messages("What?", &context);
		let user = messages[1]["content"].as_str().expect("Missing user content.");

		assert_eq!(messages[0]["role"], "system");
		assert!(user.contains("chunk_id=c1 doc_id=d1 chars=5\nAlpha"));
		assert!(user.contains("chunk_id=c2"));
		assert!(user.ends_with("Question: What?"));
	}
}
