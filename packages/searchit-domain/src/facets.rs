use std::collections::{BTreeMap, BTreeSet};

use crate::types::ChunkRecord;

/// Facet name -> facet value -> number of results carrying that value.
pub type FacetCounts = BTreeMap<String, BTreeMap<String, u64>>;

/// Counts facet values over the final result set. Every requested field is present in the
/// output, possibly with no values.
pub fn facet_counts<'a, I>(records: I, fields: &[String]) -> FacetCounts
where
	I: IntoIterator<Item = &'a ChunkRecord>,
{
	let mut counts: FacetCounts =
		fields.iter().map(|field| (field.clone(), BTreeMap::new())).collect();

	for record in records {
		for field in fields {
			let Some(bucket) = counts.get_mut(field) else { continue };

			for value in facet_values(record, field) {
				*bucket.entry(value).or_insert(0) += 1;
			}
		}
	}

	counts
}

fn facet_values(record: &ChunkRecord, field: &str) -> BTreeSet<String> {
	let raw: Vec<&str> = match field {
		"lang" => vec![record.lang.as_str()],
		"tags" => record.tags.iter().map(String::as_str).collect(),
		"section" => vec![record.section.as_str()],
		"doc_id" => vec![record.doc_id.as_str()],
		"url" => vec![record.url.as_str()],
		_ => Vec::new(),
	};

	raw.into_iter().map(str::trim).filter(|value| !value.is_empty()).map(str::to_string).collect()
}
