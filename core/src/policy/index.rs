use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::documents::model::{ExtractedDocument, Snippet};
use crate::documents::windower::{window_document, WindowParams};

/// Terms for the account/authentication focus query.
pub const FOCUS_TERMS: &[&str] = &[
    "user account",
    "authentication",
    "password",
    "lockout",
    "locked out",
    "failed logon",
    "brute force",
    "multi-factor",
    "mfa",
    "monitoring",
    "alert",
    "ssh",
    "rdp",
    "remote access",
];

/// Single-term queries tried when the focus query retrieves nothing.
pub const FALLBACK_TERMS: &[&str] = &[
    "password",
    "lockout",
    "failed attempt",
    "account",
    "SSH",
    "RDP",
    "review",
    "monitor",
];

pub const FALLBACK_TOP_K: usize = 8;

/// Windowed snippets per policy document, queried by keyword overlap.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyIndex {
    docs: BTreeMap<String, Vec<Snippet>>,
}

impl PolicyIndex {
    pub fn build(docs: &[ExtractedDocument], params: &WindowParams) -> Self {
        let mut index = Self::default();
        for doc in docs {
            index.insert(doc.source.clone(), window_document(doc, params));
        }
        index
    }

    pub fn insert(&mut self, key: String, snippets: Vec<Snippet>) {
        self.docs.insert(key, snippets);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.docs.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.docs.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn snippets(&self, key: &str) -> &[Snippet] {
        self.docs.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Top `top_k` snippets of one document by case-insensitive term
    /// occurrences; ties go to the earlier page and line. Zero scores never
    /// qualify.
    pub fn retrieve(&self, key: &str, terms: &[&str], top_k: usize) -> Vec<Snippet> {
        let terms: Vec<String> = terms.iter().map(|t| t.to_lowercase()).collect();
        let mut scored: Vec<(usize, &Snippet)> = self
            .snippets(key)
            .iter()
            .map(|s| (score(&s.text.to_lowercase(), &terms), s))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then(a.1.page.cmp(&b.1.page))
                .then(a.1.line_start.cmp(&b.1.line_start))
        });
        scored
            .into_iter()
            .take(top_k)
            .map(|(_, s)| s.clone())
            .collect()
    }

    /// Focus query first; if it finds nothing, one query per fallback term,
    /// de-duplicated by `(source, page, line_start, line_end)`.
    pub fn retrieve_with_fallback(&self, key: &str, top_k: usize) -> Vec<Snippet> {
        let primary = self.retrieve(key, FOCUS_TERMS, top_k);
        if !primary.is_empty() {
            return primary;
        }
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for term in FALLBACK_TERMS {
            for s in self.retrieve(key, &[term], FALLBACK_TOP_K) {
                if seen.insert(s.key()) {
                    out.push(s);
                }
            }
        }
        out
    }
}

fn score(text_lower: &str, terms_lower: &[String]) -> usize {
    terms_lower
        .iter()
        .map(|t| text_lower.matches(t.as_str()).count())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> PolicyIndex {
        let doc = ExtractedDocument::from_text(
            "cis.txt",
            "Scope\nAll staff.\n\nPassword length 14.\nLockout after 5 failed attempts.\nPassword reuse is forbidden.\n",
        );
        PolicyIndex::build(
            &[doc],
            &WindowParams {
                window_chars: 30,
                overlap: 0,
            },
        )
    }

    #[test]
    fn best_scoring_snippets_come_first() {
        let idx = index();
        let out = idx.retrieve("cis.txt", &["password", "lockout"], 2);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|s| s.text.to_lowercase().contains("password")
            || s.text.to_lowercase().contains("lockout")));
        assert!(idx.retrieve("cis.txt", &["encryption"], 5).is_empty());
        assert!(idx.retrieve("missing.txt", &["password"], 5).is_empty());
    }

    #[test]
    fn fallback_dedups_by_location() {
        let doc = ExtractedDocument::from_text("p.txt", "Quarterly review of each account.\n");
        let idx = PolicyIndex::build(&[doc], &WindowParams::default());
        let out = idx.retrieve_with_fallback("p.txt", 10);
        assert_eq!(out.len(), 1);
        assert_eq!((out[0].line_start, out[0].line_end), (1, 1));
    }
}
