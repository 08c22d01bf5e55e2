use tracing::debug;

use super::model::{CitationRef, ClaimedRef, VerifyError};
use crate::documents::model::Snippet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub all_verified: bool,
    pub refs: Vec<CitationRef>,
}

/// Check every claimed ref against the snippets that were actually retrieved.
///
/// A ref must name an existing `(source, page, line_start, line_end)` snippet,
/// and a non-empty quote must occur verbatim (case-sensitive) in that
/// snippet's text. Failing refs stay in the output with their error tag; the
/// batch is verified only when no ref is flagged.
pub fn verify_refs(claims: &[ClaimedRef], pool: &[Snippet]) -> Verification {
    let mut all_verified = true;
    let mut refs = Vec::with_capacity(claims.len());

    for claim in claims {
        let matched = pool.iter().find(|s| {
            s.source == claim.source
                && s.page == claim.page
                && Some(s.line_start) == claim.line_start
                && Some(s.line_end) == claim.line_end
        });

        let Some(snippet) = matched else {
            debug!(
                source = %claim.source,
                page = ?claim.page,
                line_start = ?claim.line_start,
                line_end = ?claim.line_end,
                "claimed ref has no matching snippet"
            );
            all_verified = false;
            refs.push(CitationRef {
                line_hint: claim.quote.clone(),
                line_numbers: Vec::new(),
                verify_error: Some(VerifyError::NoMatchingSnippet),
            });
            continue;
        };

        let verify_error = if !claim.quote.is_empty() && !snippet.text.contains(&claim.quote) {
            all_verified = false;
            Some(VerifyError::QuoteNotInSnippet)
        } else {
            None
        };
        refs.push(CitationRef {
            line_hint: claim.quote.clone(),
            line_numbers: (snippet.line_start..=snippet.line_end).collect(),
            verify_error,
        });
    }

    Verification { all_verified, refs }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snippet() -> Snippet {
        Snippet {
            source: "cis.txt".to_string(),
            page: Some(1),
            line_start: 3,
            line_end: 5,
            text: "Configure account lockout\nafter 5 failed attempts".to_string(),
        }
    }

    fn claim(quote: &str, line_end: usize) -> ClaimedRef {
        ClaimedRef {
            source: "cis.txt".to_string(),
            page: Some(1),
            line_start: Some(3),
            line_end: Some(line_end),
            quote: quote.to_string(),
        }
    }

    #[test]
    fn empty_batch_is_verified() {
        let v = verify_refs(&[], &[snippet()]);
        assert!(v.all_verified);
        assert!(v.refs.is_empty());
    }

    #[test]
    fn quote_check_is_case_sensitive() {
        let v = verify_refs(&[claim("ACCOUNT LOCKOUT", 5)], &[snippet()]);
        assert!(!v.all_verified);
        assert_eq!(v.refs[0].verify_error, Some(VerifyError::QuoteNotInSnippet));
        assert_eq!(v.refs[0].line_numbers, vec![3, 4, 5]);
    }

    #[test]
    fn empty_quote_only_needs_a_matching_snippet() {
        let v = verify_refs(&[claim("", 5)], &[snippet()]);
        assert!(v.all_verified);
        assert_eq!(v.refs[0].verify_error, None);
    }
}
