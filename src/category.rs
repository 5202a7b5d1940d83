//! Dominant weather category for a week of daily descriptions.
//!
//! Severe-weather terms outrank raw frequency: a single rainy day classifies
//! the whole week as `Rain` even when clear days are more common.

use std::collections::BTreeMap;

use serde::Serialize;

pub const HIGH_PRIORITY_TERMS: [&str; 3] = ["rain", "thunderstorm", "storm"];
pub const SECONDARY_PRIORITY_TERMS: [&str; 2] = ["drizzle", "shower"];
pub const UNCLASSIFIED: &str = "Unclassified";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DominantWeather {
    pub category: String,
    pub description: Option<String>,
    pub matched_by_priority: bool,
}

struct Sample<'a> {
    original: &'a str,
    normalized: String,
}

fn samples<S: AsRef<str>>(descriptions: &[S]) -> Vec<Sample<'_>> {
    descriptions
        .iter()
        .map(|d| d.as_ref().trim())
        .filter(|d| !d.is_empty())
        .map(|original| Sample {
            original,
            normalized: original.to_lowercase(),
        })
        .collect()
}

/// Trimmed, lower-cased description, or `None` for blank input.
pub(crate) fn normalize(description: &str) -> Option<String> {
    let trimmed = description.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
}

pub(crate) fn contains_any(normalized: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| normalized.contains(term))
}

fn find_by_terms<'a>(
    samples: &'a [Sample<'a>],
    terms: &[&'static str],
) -> Option<(&'a Sample<'a>, &'static str)> {
    samples.iter().find_map(|sample| {
        terms
            .iter()
            .find(|term| sample.normalized.contains(*term))
            .map(|term| (sample, *term))
    })
}

fn title_case(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if at_word_start {
            output.extend(ch.to_uppercase());
        } else {
            output.extend(ch.to_lowercase());
        }
        at_word_start = !ch.is_alphanumeric();
    }
    output
}

/// Most frequent description, compared case-insensitively. The returned
/// spelling is the ordinally smallest original within the winning group.
fn most_common(samples: &[Sample<'_>]) -> Option<String> {
    let mut groups: BTreeMap<&str, (usize, &str)> = BTreeMap::new();
    for sample in samples {
        let entry = groups
            .entry(sample.normalized.as_str())
            .or_insert((0, sample.original));
        entry.0 += 1;
        if sample.original < entry.1 {
            entry.1 = sample.original;
        }
    }

    // Ascending key order plus a strict `>` breaks count ties on the
    // ordinally smallest normalized form.
    let mut best: Option<(usize, &str)> = None;
    for (count, original) in groups.into_values() {
        if best.map_or(true, |(best_count, _)| count > best_count) {
            best = Some((count, original));
        }
    }
    best.map(|(_, original)| original.to_string())
}

pub fn classify<S: AsRef<str>>(descriptions: &[S]) -> DominantWeather {
    let samples = samples(descriptions);

    if samples.is_empty() {
        return DominantWeather {
            category: UNCLASSIFIED.to_string(),
            description: None,
            matched_by_priority: false,
        };
    }

    for terms in [&HIGH_PRIORITY_TERMS[..], &SECONDARY_PRIORITY_TERMS[..]] {
        if let Some((sample, term)) = find_by_terms(&samples, terms) {
            return DominantWeather {
                category: title_case(term),
                description: Some(sample.original.to_string()),
                matched_by_priority: true,
            };
        }
    }

    let description = most_common(&samples);
    DominantWeather {
        category: description
            .as_deref()
            .map(title_case)
            .unwrap_or_else(|| UNCLASSIFIED.to_string()),
        description,
        matched_by_priority: false,
    }
}
