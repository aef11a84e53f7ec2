use std::collections::HashMap;

use unicode_segmentation::UnicodeSegmentation;

use crate::types::{ChunkRecord, ContextChunk, RerankedCandidate};

pub const DEFAULT_MAX_TOKENS: u32 = 2_048;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextAssembler {
	max_tokens: u32,
}
impl ContextAssembler {
	pub fn new(max_tokens: u32) -> Self {
		Self { max_tokens }
	}

	pub fn from_config(cfg: &searchit_config::Context) -> Self {
		Self::new(cfg.max_tokens)
	}

	pub fn max_tokens(&self) -> u32 {
		self.max_tokens
	}

	/// Packs whole chunks in rank order until the next one would overflow the budget.
	///
	/// Candidates without chunk text are skipped. The first usable chunk is always included,
	/// even when it alone exceeds the budget.
	pub fn assemble(
		&self,
		reranked: &[RerankedCandidate],
		chunks: &HashMap<String, ChunkRecord>,
	) -> AssembledContext {
		let mut out: Vec<ContextChunk> = Vec::new();
		let mut total_tokens = 0_u32;

		for candidate in reranked {
			let Some(record) = chunks.get(candidate.chunk_id()) else { continue };

			if record.text.trim().is_empty() {
				continue;
			}

			let token_count =
				record.token_count.filter(|count| *count > 0).unwrap_or_else(|| {
					estimate_tokens(record.text.as_str())
				});
			let next_total = total_tokens.saturating_add(token_count);

			if !out.is_empty() && next_total > self.max_tokens {
				break;
			}

			total_tokens = next_total;

			out.push(ContextChunk {
				chunk_id: record.chunk_id.clone(),
				doc_id: record.doc_id.clone(),
				text: record.text.clone(),
				token_count,
				char_len: record.text.chars().count(),
				position: out.len() as u32 + 1,
			});
		}

		AssembledContext { chunks: out, total_tokens }
	}
}
impl Default for ContextAssembler {
	fn default() -> Self {
		Self::new(DEFAULT_MAX_TOKENS)
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssembledContext {
	pub chunks: Vec<ContextChunk>,
	pub total_tokens: u32,
}
impl AssembledContext {
	pub fn is_empty(&self) -> bool {
		self.chunks.is_empty()
	}

	pub fn len(&self) -> usize {
		self.chunks.len()
	}

	pub fn get(&self, chunk_id: &str) -> Option<&ContextChunk> {
		self.chunks.iter().find(|chunk| chunk.chunk_id == chunk_id)
	}

	/// Leading `ceil(len * ratio)` chunks, never fewer than one when non-empty.
	pub fn shortened(&self, ratio: f32) -> Self {
		if self.chunks.is_empty() {
			return Self::default();
		}

		let ratio = if ratio.is_finite() { ratio.clamp(0.0, 1.0) } else { 1.0 };
		let keep = ((self.chunks.len() as f32) * ratio).ceil() as usize;
		let keep = keep.clamp(1, self.chunks.len());
		let chunks: Vec<ContextChunk> = self.chunks.iter().take(keep).cloned().collect();
		let total_tokens = chunks.iter().map(|chunk| chunk.token_count).sum();

		Self { chunks, total_tokens }
	}
}

/// Rough token estimate for chunks the indexer did not annotate.
pub fn estimate_tokens(text: &str) -> u32 {
	let words = text.unicode_words().count();
	let by_chars = text.chars().count().div_ceil(4);
	let estimate = words.max(by_chars);

	if estimate == 0 && !text.is_empty() { 1 } else { estimate as u32 }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn estimate_counts_words_or_quarter_chars() {
		assert_eq!(estimate_tokens(""), 0);
		assert_eq!(estimate_tokens("a b c d e"), 5);
		assert_eq!(estimate_tokens("abcdefghijklmnop"), 4);
		assert_eq!(estimate_tokens("  "), 1);
	}
}
