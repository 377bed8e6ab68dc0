//! Text-processing core of a MUD client.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`stream`] | Tokenize pseudo-XML game stream lines into [`stream::Tag`]s |
//! | [`script`] | Lex script lines and substitute `$name` style variables |
//! | [`var`] | Thread-safe variable store with computed `date`/`time` keys |
//! | [`pattern`] | Cached regex compilation and char-indexed match ranges |
//! | [`clock`] | Time source for computed variables |
//! | [`config`] | Settings file loader |
//! | [`cli`] | Command-line arguments for the `mudtext` binary |

pub mod cli;
pub mod clock;
pub mod config;
pub mod pattern;
pub mod script;
pub mod stream;
pub mod var;
