use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// Full text of a policy or log source, keyed by the path it was loaded from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub source: String,
    pub text: String,
    pub pages: Vec<PageText>,
}

impl ExtractedDocument {
    pub fn from_text(source: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let pages = split_pages(&text);
        Self {
            source: source.into(),
            text,
            pages,
        }
    }
}

/// Contiguous line-range excerpt of a document. Line numbers are 1-based and
/// relative to `page` when one is set, otherwise to the whole text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Snippet {
    pub source: String,
    pub page: Option<u32>,
    pub line_start: usize,
    pub line_end: usize,
    pub text: String,
}

impl Snippet {
    pub fn key(&self) -> (String, Option<u32>, usize, usize) {
        (
            self.source.clone(),
            self.page,
            self.line_start,
            self.line_end,
        )
    }
}

/// Pages are separated by form feeds; text without one is a single page.
pub fn split_pages(text: &str) -> Vec<PageText> {
    text.split('\x0C')
        .enumerate()
        .filter(|(_, chunk)| !chunk.trim().is_empty())
        .map(|(idx, chunk)| PageText {
            number: idx as u32 + 1,
            text: chunk.to_string(),
        })
        .collect()
}
