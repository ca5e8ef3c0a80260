//! Snippet extraction from free-form chat text.
//!
//! Two delimiter conventions are recognised:
//!
//! ````text
//! ```typst            `$e^alpha$`
//! #set page(...)      ^^^^^^^^^^^  inline math span (delimiters kept)
//! ```
//! ^^^^^^^^^^^^^^^^^^  fenced block labelled `typst` (label stripped)
//! ````
//!
//! Extraction is total: unbalanced delimiters never produce an error, they
//! only disable the affected tier.

use serde::Serialize;

/// Marker opening and closing a fenced block.
const FENCE: &str = "```";

/// Marker around an inline span.
const INLINE: char = '`';

/// Delimiter that must bound an inline span's content.
const MATH: char = '$';

/// Label a fenced block must start with to be typeset.
const LABEL: &str = "typst";

/// How a snippet was delimited in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Content of a ```` ```typst ```` fenced block.
    FencedBlock,
    /// A `` `$...$` `` inline math span.
    InlineMath,
    /// Source handed over verbatim, without delimiter extraction.
    Direct,
}

/// One unit of typesetting source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snippet {
    /// Position in the extraction result; names the job's files.
    pub index: usize,
    /// Source text passed to the compiler after the prelude.
    pub text: String,
    /// Delimiter convention the snippet was found with.
    pub origin: Origin,
}

impl Snippet {
    /// Wrap a source string that did not go through extraction.
    pub fn direct(text: impl Into<String>) -> Self {
        Self {
            index: 0,
            text: text.into(),
            origin: Origin::Direct,
        }
    }
}

/// Extract all snippets from `text`.
///
/// Every fenced block comes first, in document order, followed by every
/// inline math span in document order, regardless of how the two kinds
/// interleave in the source.
pub fn extract(text: &str) -> Vec<Snippet> {
    let parts: Vec<&str> = text.split(FENCE).collect();

    let mut found: Vec<(String, Origin)> = Vec::new();
    let outside: Vec<&str> = if is_balanced(parts.len()) {
        for block in parts.iter().skip(1).step_by(2) {
            if let Some(body) = block.strip_prefix(LABEL) {
                found.push((body.trim().to_string(), Origin::FencedBlock));
            }
        }
        parts.iter().step_by(2).copied().collect()
    } else {
        // Unterminated fence: the whole text is one outside segment.
        vec![text]
    };

    for segment in outside {
        found.extend(
            inline_spans(segment)
                .into_iter()
                .map(|span| (span.to_string(), Origin::InlineMath)),
        );
    }

    found
        .into_iter()
        .enumerate()
        .map(|(index, (text, origin))| Snippet {
            index,
            text,
            origin,
        })
        .collect()
}

/// Inline math spans of one outside segment, delimiters included.
fn inline_spans(segment: &str) -> Vec<&str> {
    let parts: Vec<&str> = segment.split(INLINE).collect();
    if !is_balanced(parts.len()) {
        return Vec::new();
    }

    parts
        .into_iter()
        .skip(1)
        .step_by(2)
        .filter(|quote| quote.starts_with(MATH) && quote.ends_with(MATH))
        .collect()
}

/// A split into `n` parts closes every opened delimiter pair.
fn is_balanced(n: usize) -> bool {
    n >= 3 && n % 2 == 1
}
