use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::model::CitationRef;
use super::similarity::{length_bound, ratio};
use crate::documents::numbered::NumberedLine;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ResolveParams {
    pub max_candidates: usize,
    pub cutoff: f64,
}

impl Default for ResolveParams {
    fn default() -> Self {
        Self {
            max_candidates: 3,
            cutoff: 0.80,
        }
    }
}

pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Map a quoted phrase back to 1-based line numbers.
///
/// Exact containment (after whitespace normalization) wins; only when no line
/// contains the quote are fuzzy candidates considered, best ratio first, and
/// each candidate maps to the first line carrying that normalized text.
pub fn resolve(
    lines: &[NumberedLine],
    quote: &str,
    max_candidates: usize,
    cutoff: f64,
) -> Vec<usize> {
    let quote_norm = normalize_ws(quote);
    if quote_norm.is_empty() || lines.is_empty() {
        return Vec::new();
    }

    let normalized: Vec<(usize, String)> = lines
        .iter()
        .map(|l| (l.line_number, normalize_ws(&l.text)))
        .collect();

    let hits: Vec<usize> = normalized
        .iter()
        .filter(|(_, text)| text.contains(&quote_norm))
        .map(|(ln, _)| *ln)
        .collect();
    if !hits.is_empty() {
        return hits;
    }

    fuzzy_candidates(&normalized, &quote_norm, max_candidates, cutoff)
}

fn fuzzy_candidates(
    normalized: &[(usize, String)],
    quote_norm: &str,
    max_candidates: usize,
    cutoff: f64,
) -> Vec<usize> {
    if max_candidates == 0 {
        return Vec::new();
    }
    // normalized text -> first line number carrying it
    let mut first_line: HashMap<&str, usize> = HashMap::new();
    for (ln, text) in normalized {
        first_line.entry(text.as_str()).or_insert(*ln);
    }

    let mut scored: Vec<(f64, usize)> = Vec::new();
    for (ln, text) in normalized {
        if first_line.get(text.as_str()) != Some(ln) {
            continue;
        }
        if length_bound(text, quote_norm) < cutoff {
            continue;
        }
        let score = ratio(text, quote_norm);
        if score >= cutoff {
            scored.push((score, *ln));
        }
    }
    // Descending score; equal scores keep document order.
    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
    scored
        .into_iter()
        .take(max_candidates)
        .map(|(_, ln)| ln)
        .collect()
}

/// Summary-path citations: resolve each hint against a numbered document.
pub fn attach_lines(
    lines: &[NumberedLine],
    hints: &[String],
    params: &ResolveParams,
) -> Vec<CitationRef> {
    hints
        .iter()
        .map(|hint| CitationRef {
            line_hint: hint.clone(),
            line_numbers: resolve(lines, hint, params.max_candidates, params.cutoff),
            verify_error: None,
        })
        .collect()
}
