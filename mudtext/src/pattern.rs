//! Regex engine with a shared compile cache.
//!
//! Script triggers and the substitution engine compile the same handful of
//! patterns over and over.  [`RegexEngine`] owns an append-only cache keyed
//! by pattern source, and is shared by `Arc` with whoever needs it rather
//! than living in a global.
//!
//! Match ranges are reported in **character** indices, not byte offsets, so
//! callers can splice replacements into text that contains non-ASCII
//! characters (see [`replace_ranges`]).

use std::collections::HashMap;
use std::ops::Range;
use std::sync::{Arc, RwLock};

use regex::Regex;
use thiserror::Error;
use tracing::{trace, warn};

// ── Public types ─────────────────────────────────────────────────────────────

/// Error returned when a pattern cannot be compiled.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// One match: group 0 is the whole match, followed by each capture group.
/// `None` means the group did not participate.
pub type MatchRanges = Vec<Option<Range<usize>>>;

/// Compiles and caches regular expressions.
#[derive(Debug, Default)]
pub struct RegexEngine {
    cache: RwLock<HashMap<String, Arc<Regex>>>,
}

impl RegexEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `pattern`, returning the cached copy if it was seen before.
    ///
    /// Returns [`PatternError::InvalidPattern`] if the pattern is
    /// syntactically invalid.  Failures are not cached.
    pub fn compile(&self, pattern: &str) -> Result<Arc<Regex>, PatternError> {
        if let Some(re) = self.read_cache().get(pattern) {
            return Ok(Arc::clone(re));
        }

        let re = Regex::new(pattern).map_err(|source| {
            warn!(pattern, "rejecting invalid pattern");
            PatternError::InvalidPattern {
                pattern: pattern.to_owned(),
                source,
            }
        })?;

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        // Another thread may have raced us here; keep whichever got in first.
        let re = cache
            .entry(pattern.to_owned())
            .or_insert_with(|| {
                trace!(pattern, "compiled pattern");
                Arc::new(re)
            });
        Ok(Arc::clone(re))
    }

    /// Every non-overlapping match of `pattern` in `text`, left to right.
    pub fn captures(&self, pattern: &str, text: &str) -> Result<Vec<MatchRanges>, PatternError> {
        let re = self.compile(pattern)?;
        let index = CharIndex::new(text);
        Ok(re
            .captures_iter(text)
            .map(|caps| {
                caps.iter()
                    .map(|m| m.map(|m| index.range(m.start()..m.end())))
                    .collect()
            })
            .collect())
    }

    /// Number of cached patterns.
    pub fn len(&self) -> usize {
        self.read_cache().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_cache().is_empty()
    }

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<Regex>>> {
        self.cache.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Replace each character range in `text` with its replacement.
///
/// Ranges are character indices, must not overlap, and may be given in any
/// order.  Ranges that fall outside `text` are ignored.
pub fn replace_ranges(text: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    let mut chars: Vec<char> = text.chars().collect();
    // Right to left, so earlier ranges stay valid.
    edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));
    for (range, replacement) in edits {
        if range.start > range.end || range.end > chars.len() {
            continue;
        }
        chars.splice(range, replacement.chars());
    }
    chars.into_iter().collect()
}

// ── Byte → char offset mapping ───────────────────────────────────────────────

/// Maps byte offsets on char boundaries to character indices.
struct CharIndex {
    /// Byte offset of every char, plus a final entry for `text.len()`.
    starts: Vec<usize>,
}

impl CharIndex {
    fn new(text: &str) -> Self {
        let mut starts: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        starts.push(text.len());
        Self { starts }
    }

    fn char_at(&self, byte: usize) -> usize {
        // Regex offsets always land on char boundaries.
        self.starts.binary_search(&byte).unwrap_or_else(|i| i)
    }

    fn range(&self, bytes: Range<usize>) -> Range<usize> {
        self.char_at(bytes.start)..self.char_at(bytes.end)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
