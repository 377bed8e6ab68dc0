//! Command-line argument parsing.
//!
//! Usage:
//!   mudtext [--config <file>] tokenize
//!   mudtext [--config <file>] lex
//!   mudtext [--config <file>] expand [--var name=value]...
//!
//! Every subcommand reads lines from stdin and writes one result per line
//! to stdout.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::stream::Tag;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "mudtext", version, about = "Inspect game stream and script text")]
pub struct CliArgs {
    /// Settings file (defaults to the platform config directory).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Tokenize game stream lines into tags.
    Tokenize,
    /// Lex script lines into instructions.
    Lex,
    /// Substitute variables in each line.
    Expand {
        /// Set a variable before expanding (repeatable).
        #[arg(short = 'v', long = "var", value_parser = parse_binding)]
        vars: Vec<(String, String)>,
    },
}

fn parse_binding(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_owned(), value.to_owned())),
        _ => Err(format!("expected name=value, got '{s}'")),
    }
}

/// One-line description of a tag and its children, for `tokenize` output.
pub fn describe(tag: &Tag) -> String {
    let mut out = tag.name().to_owned();
    for (k, v) in tag.attrs().iter() {
        out.push_str(&format!(" {k}={v:?}"));
    }
    if tag.is_self_closing() {
        out.push_str(" /");
    }
    out.push_str(&format!(" value={:?}", tag.value()));
    if !tag.children().is_empty() {
        out.push_str(&format!(" children={}", tag.children().len()));
    }
    out
}
