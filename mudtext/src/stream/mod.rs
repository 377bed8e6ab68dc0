//! Game stream tokenizer.
//!
//! The server interleaves plain text with pseudo-XML tags:
//!
//! ```text
//! <pushStream id="inv"/>Your pack holds: a <d>rope</d>.<popStream/>
//! <component id='room exits'>Obvious paths: <d>north</d>.<compass></compass></component>
//! <prompt time="1710000000">&gt;</prompt>
//! ```
//!
//! [`tokenize`] turns one such line into a flat list of [`Tag`]s, in two
//! stages: [`scan`] splits the line into open / close / self-closing / text
//! events, and [`tree`] folds those into tags.  Text outside any tag becomes
//! a tag named `text`.
//!
//! This is deliberately not an XML parser.  The stream is often malformed
//! (unbalanced quotes, stray `<`, tags left open), and every such case
//! degrades to text or an implicitly closed tag instead of an error.

pub mod scan;
pub mod tag;
pub mod tree;

pub use tag::{Attributes, Tag};

/// Tokenize one line of game stream.
///
/// Pure function of `line`: nothing carries over between calls.
pub fn tokenize(line: &str) -> Vec<Tag> {
    tree::build(scan::scan(line))
}
