use std::{collections::HashSet, ops::Range};

use unicode_segmentation::UnicodeSegmentation;

pub const EM_OPEN: &str = "<em>";
pub const EM_CLOSE: &str = "</em>";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Highlighter {
	max_fragments: usize,
	fragment_chars: usize,
}
impl Highlighter {
	pub fn new(max_fragments: u32, fragment_chars: u32) -> Self {
		Self { max_fragments: max_fragments as usize, fragment_chars: fragment_chars as usize }
	}

	pub fn from_config(cfg: &searchit_config::Search) -> Self {
		Self::new(cfg.highlight_fragments, cfg.highlight_fragment_chars)
	}

	/// Fragments of `text` around case-insensitive query term matches, terms wrapped in `<em>`.
	pub fn highlight(&self, query: &str, text: &str) -> Vec<String> {
		if self.max_fragments == 0 || self.fragment_chars == 0 {
			return Vec::new();
		}

		let terms: HashSet<String> = query.unicode_words().map(str::to_lowercase).collect();

		if terms.is_empty() {
			return Vec::new();
		}

		let matches: Vec<Range<usize>> = text
			.unicode_word_indices()
			.filter(|(_, word)| terms.contains(&word.to_lowercase()))
			.map(|(start, word)| start..start + word.len())
			.collect();
		let mut fragments = Vec::new();
		let mut covered_until = 0;

		for hit in &matches {
			if fragments.len() >= self.max_fragments {
				break;
			}
			if hit.start < covered_until {
				continue;
			}

			let window = self.window(text, hit, &matches);

			fragments.push(render_fragment(text, &window, &matches));

			covered_until = window.end;
		}

		fragments
	}

	/// About `fragment_chars` chars starting half a fragment before `hit`, widened so no match is
	/// cut at the end.
	fn window(&self, text: &str, hit: &Range<usize>, matches: &[Range<usize>]) -> Range<usize> {
		let half = self.fragment_chars / 2;
		let start = text[..hit.start]
			.char_indices()
			.rev()
			.take(half)
			.last()
			.map(|(idx, _)| idx)
			.unwrap_or(hit.start);
		let mut end = text[start..]
			.char_indices()
			.nth(self.fragment_chars)
			.map(|(idx, _)| start + idx)
			.unwrap_or(text.len())
			.max(hit.end);

		if let Some(straddling) = matches.iter().find(|m| m.start < end && m.end > end) {
			end = straddling.end;
		}

		start..end
	}
}

fn render_fragment(text: &str, window: &Range<usize>, matches: &[Range<usize>]) -> String {
	let mut out = String::with_capacity(window.len() + 16);
	let mut cursor = window.start;

	for hit in matches.iter().filter(|hit| hit.start >= window.start && hit.end <= window.end) {
		out.push_str(&text[cursor..hit.start]);
		out.push_str(EM_OPEN);
		out.push_str(&text[hit.clone()]);
		out.push_str(EM_CLOSE);

		cursor = hit.end;
	}

	out.push_str(&text[cursor..window.end]);

	out.trim().to_string()
}
