//! Citation markers embedded in generated answers.
//!
//! Grammar, one citation per bracket:
//!
//! ```text
//! marker   = "[" chunk_id ":" start sep end "]"
//! chunk_id = 1*( any char except whitespace, "[" and "]" )
//! sep      = "-" / ".."
//! start    = 1*DIGIT
//! end      = 1*DIGIT
//! ```
//!
//! Whitespace is allowed around every token. A chunk id may itself contain `:`; the last
//! `:<start><sep><end>]` suffix is the span. Spans are half-open char offsets into the cited
//! chunk's original text.

use std::{collections::HashSet, ops::Range, sync::LazyLock};

use regex::Regex;

use crate::{
	context::AssembledContext,
	types::{Citation, Span},
};

static MARKER: LazyLock<Option<Regex>> = LazyLock::new(|| {
	Regex::new(r"\[\s*([^\[\]\s]+?)\s*:\s*(\d+)\s*(?:-|\.\.)\s*(\d+)\s*\]").ok()
});

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CitationMarker {
	pub citation: Citation,
	/// Byte range of the whole marker inside the generated text.
	pub range: Range<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
	UnknownChunk,
	SpanOutOfBounds,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DroppedCitation {
	pub citation: Citation,
	pub reason: DropReason,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CitationValidation {
	/// Distinct valid citations in order of first appearance.
	pub valid: Vec<Citation>,
	pub dropped: Vec<DroppedCitation>,
	/// Generated text with the markers of dropped citations removed.
	pub answer_text: String,
}
impl CitationValidation {
	pub fn distinct_chunks(&self) -> usize {
		self.valid.iter().map(|citation| citation.chunk_id.as_str()).collect::<HashSet<_>>().len()
	}
}

/// Every well-formed marker in `text`, in order. Markers whose offsets overflow are skipped.
pub fn parse_markers(text: &str) -> Vec<CitationMarker> {
	scan_markers(text).0
}

/// Well-formed markers plus the byte ranges of bracketed markers whose offsets overflow.
fn scan_markers(text: &str) -> (Vec<CitationMarker>, Vec<Range<usize>>) {
	let Some(re) = MARKER.as_ref() else { return (Vec::new(), Vec::new()) };
	let mut markers = Vec::new();
	let mut overflowed = Vec::new();

	for caps in re.captures_iter(text) {
		let (Some(whole), Some(chunk_id), Some(start), Some(end)) =
			(caps.get(0), caps.get(1), caps.get(2), caps.get(3))
		else {
			continue;
		};
		let (Ok(start), Ok(end)) = (start.as_str().parse(), end.as_str().parse()) else {
			overflowed.push(whole.range());

			continue;
		};

		markers.push(CitationMarker {
			citation: Citation { chunk_id: chunk_id.as_str().to_string(), span: Span { start, end } },
			range: whole.range(),
		});
	}

	(markers, overflowed)
}

/// Checks a citation against the chunks that were actually supplied to the generator.
pub fn check_citation(citation: &Citation, context: &AssembledContext) -> Result<(), DropReason> {
	let Some(chunk) = context.get(citation.chunk_id.as_str()) else {
		return Err(DropReason::UnknownChunk);
	};

	if citation.span.start >= citation.span.end || citation.span.end > chunk.char_len {
		return Err(DropReason::SpanOutOfBounds);
	}

	Ok(())
}

pub fn validate_citations(text: &str, context: &AssembledContext) -> CitationValidation {
	let (markers, mut removed) = scan_markers(text);
	let mut seen = HashSet::new();
	let mut valid = Vec::new();
	let mut dropped = Vec::new();

	for marker in markers {
		match check_citation(&marker.citation, context) {
			Ok(()) =>
				if seen.insert(marker.citation.clone()) {
					valid.push(marker.citation);
				},
			Err(reason) => {
				removed.push(marker.range);
				dropped.push(DroppedCitation { citation: marker.citation, reason });
			},
		}
	}

	removed.sort_by_key(|range| range.start);

	CitationValidation { valid, dropped, answer_text: remove_ranges(text, &removed) }
}

fn remove_ranges(text: &str, ranges: &[Range<usize>]) -> String {
	if ranges.is_empty() {
		return text.trim().to_string();
	}

	let mut out = String::with_capacity(text.len());
	let mut cursor = 0;

	for range in ranges {
		out.push_str(&text[cursor..range.start]);
		cursor = range.end;
	}

	out.push_str(&text[cursor..]);

	out.trim().to_string()
}
