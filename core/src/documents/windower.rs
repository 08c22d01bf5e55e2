use serde::{Deserialize, Serialize};

use super::model::{ExtractedDocument, Snippet};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WindowParams {
    /// Soft cap on characters per window; a single longer line still forms a window.
    pub window_chars: usize,
    /// Trailing lines carried from a flushed window into the next one.
    pub overlap: usize,
}

impl Default for WindowParams {
    fn default() -> Self {
        Self {
            window_chars: 600,
            overlap: 5,
        }
    }
}

/// Split text into overlapping, line-range-tagged snippets.
///
/// Every line number of `text` falls inside at least one snippet range unless
/// it only ever shares a window with whitespace, and `line_end` never
/// decreases from one snippet to the next.
pub fn window_text(
    source: &str,
    page: Option<u32>,
    text: &str,
    params: &WindowParams,
) -> Vec<Snippet> {
    let mut out = Vec::new();
    // (1-based line number, line text)
    let mut buf: Vec<(usize, &str)> = Vec::new();
    let mut cur_len = 0usize;

    for (idx, line) in text.lines().enumerate() {
        let seg_len = segment_len(line);
        if cur_len + seg_len > params.window_chars && !buf.is_empty() {
            flush(&mut out, source, page, &buf);
            // Carry at most len-1 lines so the window always advances.
            let keep = params.overlap.min(buf.len() - 1);
            buf.drain(..buf.len() - keep);
            cur_len = buf.iter().map(|(_, l)| segment_len(l)).sum();
        }
        buf.push((idx + 1, line));
        cur_len += seg_len;
    }
    if !buf.is_empty() {
        flush(&mut out, source, page, &buf);
    }
    out
}

/// Window each page of a document; page-less documents are windowed whole.
pub fn window_document(doc: &ExtractedDocument, params: &WindowParams) -> Vec<Snippet> {
    if doc.pages.is_empty() {
        return window_text(&doc.source, None, &doc.text, params);
    }
    doc.pages
        .iter()
        .flat_map(|p| window_text(&doc.source, Some(p.number), &p.text, params))
        .collect()
}

fn segment_len(line: &str) -> usize {
    line.chars().count() + 1
}

fn flush(out: &mut Vec<Snippet>, source: &str, page: Option<u32>, buf: &[(usize, &str)]) {
    let joined = buf.iter().map(|(_, l)| *l).collect::<Vec<_>>().join("\n");
    let text = joined.trim();
    if text.is_empty() {
        return;
    }
    let (Some(first), Some(last)) = (buf.first(), buf.last()) else {
        return;
    };
    out.push(Snippet {
        source: source.to_string(),
        page,
        line_start: first.0,
        line_end: last.0,
        text: text.to_string(),
    });
}
