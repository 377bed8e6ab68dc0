//! Settings file parser.
//!
//! A settings file is a list of lines:
//!
//! | Line | Action |
//! |------|--------|
//! | `date_format = %Y-%m-%d` | format for `$date` |
//! | `datetime_format = …` / `time_format = …` | formats for `$datetime` / `$time` |
//! | `sigils = $ %` | space-separated variable sigils |
//! | `log = debug` | default log filter (`RUST_LOG` wins) |
//! | `var name value` / `setvariable name value` | preset a variable |
//! | Lines starting with `;` or `#` | comment, ignored |
//!
//! Bad lines are reported and skipped; the rest of the file still loads.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::format::{Item, StrftimeItems};
use directories::ProjectDirs;
use thiserror::Error;

use crate::clock::{DateFormats, SystemClock};
use crate::pattern::{PatternError, RegexEngine};
use crate::script::{ScriptLexer, ScriptTokenValue, SubstitutionEngine, VariableSetting};
use crate::var::VariableStore;

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading a settings file.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

/// Parsed settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub formats: DateFormats,
    pub sigils: Vec<String>,
    pub log: Option<String>,
    /// Variables preset with `var`, in file order.
    pub vars: Vec<(String, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            formats: DateFormats::default(),
            sigils: vec!["$".to_owned()],
            log: None,
            vars: Vec::new(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a settings string.
    ///
    /// Returns the config and a list of any errors on individual lines.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = Config::new();
        let mut errors = Vec::new();
        let mut lexer = ScriptLexer::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                // `var x=1` is a variable, not a setting.
                if !key.contains(char::is_whitespace) {
                    if let Err(message) = config.apply(key, value.trim()) {
                        errors.push(ConfigError { line: lineno, message });
                    }
                    continue;
                }
            }

            match lexer.tokenize(line) {
                Some(ScriptTokenValue::Variable { name, value }) if !name.is_empty() => {
                    config.vars.push((name, value));
                }
                _ => errors.push(ConfigError {
                    line: lineno,
                    message: format!("unrecognised line: {line}"),
                }),
            }
        }

        (config, errors)
    }

    /// Read and parse a settings file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    /// Where the settings file lives by default, if the platform has a
    /// config directory.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "mudtext").map(|dirs| dirs.config_dir().join("mudtext.conf"))
    }

    /// A variable store on the system clock, preloaded with `vars`.
    pub fn build_store(&self) -> Arc<VariableStore> {
        let store = VariableStore::with_clock(Arc::new(SystemClock), self.formats.clone());
        for (name, value) in &self.vars {
            store.set(name.as_str(), value.as_str());
        }
        Arc::new(store)
    }

    /// A substitution engine resolving every configured sigil from `store`.
    pub fn build_engine(
        &self,
        regex: Arc<RegexEngine>,
        store: &Arc<VariableStore>,
    ) -> Result<SubstitutionEngine, PatternError> {
        let settings = self
            .sigils
            .iter()
            .map(|sigil| VariableSetting::new(sigil.as_str(), store.resolver()))
            .collect();
        SubstitutionEngine::new(regex, settings)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "date_format" => self.formats.date = check_format(value)?,
            "datetime_format" => self.formats.datetime = check_format(value)?,
            "time_format" => self.formats.time = check_format(value)?,
            "sigils" => {
                let sigils: Vec<String> = value.split_whitespace().map(str::to_owned).collect();
                if sigils.is_empty() {
                    return Err("sigils: need at least one sigil".into());
                }
                self.sigils = sigils;
            }
            "log" => self.log = Some(value.to_owned()),
            _ => return Err(format!("unknown setting '{key}'")),
        }
        Ok(())
    }
}

fn check_format(value: &str) -> Result<String, String> {
    if value.is_empty() {
        return Err("empty date format".into());
    }
    if StrftimeItems::new(value).any(|item| matches!(item, Item::Error)) {
        return Err(format!("invalid date format '{value}'"));
    }
    Ok(value.to_owned())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
