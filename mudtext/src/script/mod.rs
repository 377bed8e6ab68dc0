//! Automation script support.
//!
//! This module covers the text side of scripting:
//!
//! - [`lexer`]: one source line → one [`ScriptTokenValue`]
//! - [`expand`]: `$name` / `$name[n]` substitution over payloads
//!
//! Executing instructions (sending, waiting for matches, branching on
//! labels) belongs to the interpreter, which calls
//! [`SubstitutionEngine::substitute`] on payloads before acting on them.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use mudtext::pattern::RegexEngine;
//! use mudtext::script::{ScriptLexer, ScriptTokenValue, SubstitutionEngine, VariableSetting};
//! use mudtext::var::VariableStore;
//!
//! let vars = Arc::new(VariableStore::new());
//! vars.set("target", "orc");
//! let engine = SubstitutionEngine::new(
//!     Arc::new(RegexEngine::new()),
//!     vec![VariableSetting::new("$", vars.resolver())],
//! )
//! .unwrap();
//!
//! let mut lexer = ScriptLexer::new();
//! let Some(ScriptTokenValue::Put(text)) = lexer.tokenize("put attack $target") else {
//!     panic!("expected put");
//! };
//! assert_eq!(engine.substitute(&text), "attack orc");
//! ```

pub mod expand;
pub mod lexer;
pub mod token;

// Re-exports for convenience.
pub use expand::{Resolver, SubstitutionEngine, VariableSetting, MAX_ITERATIONS};
pub use lexer::{tokenize_script, ScriptLexer};
pub use token::ScriptTokenValue;
