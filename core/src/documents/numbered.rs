use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NumberedLine {
    pub line_number: usize,
    pub text: String,
}

/// 1-based numbering; blank lines keep their number.
pub fn number_lines(text: &str) -> Vec<NumberedLine> {
    text.lines()
        .enumerate()
        .map(|(idx, line)| NumberedLine {
            line_number: idx + 1,
            text: line.to_string(),
        })
        .collect()
}

/// Numbered full texts keyed by document, built once per run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NumberedCache {
    docs: BTreeMap<String, Vec<NumberedLine>>,
}

impl NumberedCache {
    pub fn build<'a, I>(texts: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let docs = texts
            .into_iter()
            .map(|(key, text)| (key.clone(), number_lines(text)))
            .collect();
        Self { docs }
    }

    pub fn lines(&self, key: &str) -> &[NumberedLine] {
        self.docs.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_count_towards_numbering() {
        let lines = number_lines("a\n\n  \nb");
        let numbers: Vec<usize> = lines.iter().map(|l| l.line_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert_eq!(lines[3].text, "b");
    }

    #[test]
    fn cache_returns_empty_for_unknown_key() {
        let mut texts = BTreeMap::new();
        texts.insert("a.txt".to_string(), "x\ny".to_string());
        let cache = NumberedCache::build(&texts);
        assert_eq!(cache.lines("a.txt").len(), 2);
        assert!(cache.lines("missing").is_empty());
    }
}
