//! Variable substitution.
//!
//! Expands sigil-marked references in a script payload before it is acted
//! on.  Each [`VariableSetting`] pairs a sigil with a resolver; the engine is
//! built once from a set of them and is then shared freely between threads.
//!
//! | Form             | Meaning                                              |
//! |------------------|------------------------------------------------------|
//! | `$name`          | Value of `name`, if the resolver knows it            |
//! | `$name[n]`       | Element `n` (0-based) of the `|`-separated value     |
//! | `$name(n)`       | Same, paren form                                     |
//!
//! Anything that does not resolve is left as written, so a script author can
//! see exactly which reference failed.
//!
//! Expansion repeats until the text stops changing, no sigil is left, or
//! [`MAX_ITERATIONS`] passes have run.  A variable may therefore expand to
//! text holding further references, and a binding like `x = "$x"` still
//! terminates.  Lookups made while expanding `name[n]` draw on the same pass
//! budget as the text around them, so `x = "$x[0]"` terminates too.

use std::ops::Range;
use std::sync::Arc;

use aho_corasick::AhoCorasick;
use tracing::{debug, warn};

use crate::pattern::{replace_ranges, PatternError, RegexEngine};

/// Upper bound on expansion passes over one piece of text.
pub const MAX_ITERATIONS: usize = 15;

/// Expansion stops early once the text grows past this many characters.
/// Bindings like `x = "$x$x"` would otherwise double on every pass.
pub const MAX_EXPANDED_CHARS: usize = 64 * 1024;

/// Identifier classes tried for each sigil, most permissive first.
///
/// `$name.` first tries `name.`; if that is unbound the next class tries
/// `name`, leaving the trailing `.` alone.
const NAME_CLASSES: [&str; 3] = [r"[A-Za-z0-9_.\-]+", r"[A-Za-z0-9_\-]+", r"[A-Za-z0-9_]+"];

/// Looks a variable name up.  `None` leaves the reference unexpanded.
pub type Resolver = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// A sigil and the resolver for names that follow it.
#[derive(Clone)]
pub struct VariableSetting {
    sigil: String,
    resolver: Resolver,
}

impl std::fmt::Debug for VariableSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableSetting")
            .field("sigil", &self.sigil)
            .finish()
    }
}

impl VariableSetting {
    pub fn new(sigil: impl Into<String>, resolver: Resolver) -> Self {
        Self {
            sigil: sigil.into(),
            resolver,
        }
    }

    pub fn sigil(&self) -> &str {
        &self.sigil
    }

    pub fn resolve(&self, name: &str) -> Option<String> {
        (self.resolver)(name)
    }
}

/// A setting with its three name patterns, compiled up front.
struct SigilPass {
    setting: VariableSetting,
    patterns: Vec<String>,
}

/// Expands variable references in text.
pub struct SubstitutionEngine {
    regex: Arc<RegexEngine>,
    passes: Vec<SigilPass>,
    /// Finds any registered sigil; `None` when there are none.
    sigils: Option<AhoCorasick>,
}

impl std::fmt::Debug for SubstitutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sigils: Vec<&str> = self.passes.iter().map(|p| p.setting.sigil()).collect();
        f.debug_struct("SubstitutionEngine")
            .field("sigils", &sigils)
            .finish()
    }
}

impl SubstitutionEngine {
    /// Build an engine for `settings`, compiling their patterns into `regex`.
    ///
    /// Settings with an empty sigil are ignored.
    pub fn new(regex: Arc<RegexEngine>, settings: Vec<VariableSetting>) -> Result<Self, PatternError> {
        let mut passes = Vec::with_capacity(settings.len());
        for setting in settings {
            if setting.sigil.is_empty() {
                warn!("ignoring variable setting with an empty sigil");
                continue;
            }
            let escaped = regex::escape(&setting.sigil);
            let patterns: Vec<String> = NAME_CLASSES
                .iter()
                .map(|class| format!("{escaped}({class})"))
                .collect();
            for p in &patterns {
                regex.compile(p)?;
            }
            passes.push(SigilPass { setting, patterns });
        }

        let sigils = if passes.is_empty() {
            None
        } else {
            Some(AhoCorasick::new(passes.iter().map(|p| p.setting.sigil.as_str())))
        };

        Ok(Self {
            regex,
            passes,
            sigils,
        })
    }

    /// Returns `true` if any registered sigil occurs in `text`.
    pub fn has_sigil(&self, text: &str) -> bool {
        self.sigils.as_ref().map_or(false, |ac| ac.is_match(text))
    }

    /// Expand every resolvable reference in `text`.
    pub fn substitute(&self, text: &str) -> String {
        let mut budget = MAX_ITERATIONS - 1;
        self.substitute_with(text, &mut budget)
    }

    /// The expansion loop.  The first pass over `text` is free; every pass
    /// after it draws on `budget`, which nested index lookups share.
    fn substitute_with(&self, text: &str, budget: &mut usize) -> String {
        if !self.has_sigil(text) {
            return text.to_owned();
        }

        let mut current = text.to_owned();
        loop {
            let mut next = if current.contains(&['[', '('][..]) {
                self.expand_indexed(&current, budget)
            } else {
                current.clone()
            };
            for pass in &self.passes {
                next = self.expand_sigil(pass, next);
            }

            let changed = next != current;
            current = next;
            if !changed || !self.has_sigil(&current) {
                return current;
            }
            let len = current.chars().count();
            if len > MAX_EXPANDED_CHARS {
                debug!(len, "substitution stopped: text too long");
                return current;
            }
            if *budget == 0 {
                debug!(bound = MAX_ITERATIONS, "substitution stopped at iteration bound");
                return current;
            }
            *budget -= 1;
        }
    }

    // ── Indexed access: name[n] / name(n) ────────────────────────────────────

    fn expand_indexed(&self, text: &str, budget: &mut usize) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        // chars[..emitted] has already been copied to `out`.
        let mut emitted = 0;
        let mut i = 0;

        while i < chars.len() {
            let close = match chars[i] {
                '[' => ']',
                '(' => ')',
                _ => {
                    i += 1;
                    continue;
                }
            };
            let Some(end) = matching_close(&chars, i, close) else {
                i += 1;
                continue;
            };
            let Some(start) = self.reference_start(&chars, emitted, i) else {
                i += 1;
                continue;
            };

            let name: String = chars[start..i].iter().collect();
            let index: String = chars[i + 1..end].iter().collect();
            if let Some(element) = self.element(&name, &index, budget) {
                out.extend(&chars[emitted..start]);
                out.push_str(&element);
                emitted = end + 1;
            }
            // Unresolvable forms stay as written.
            i = end + 1;
        }

        out.extend(&chars[emitted..]);
        out
    }

    /// Start of the variable reference ending at `bracket`: the last sigil in
    /// the run of non-space, non-bracket characters before it.  Text ahead of
    /// that sigil is not part of the name.
    fn reference_start(&self, chars: &[char], floor: usize, bracket: usize) -> Option<usize> {
        let run = run_start(chars, floor, bracket);
        let word: String = chars[run..bracket].iter().collect();
        let sigil = self.sigils.as_ref()?.find_iter(&word).last()?;
        Some(run + word[..sigil.start()].chars().count())
    }

    fn element(&self, name: &str, index: &str, budget: &mut usize) -> Option<String> {
        let n: usize = self.substitute_with(index, budget).trim().parse().ok()?;
        let list = self.substitute_with(name, budget);
        if list == name {
            return None;
        }
        list.split('|').nth(n).map(str::to_owned)
    }

    // ── Sigil references ─────────────────────────────────────────────────────

    fn expand_sigil(&self, pass: &SigilPass, mut text: String) -> String {
        for pattern in &pass.patterns {
            if !text.contains(pass.setting.sigil.as_str()) {
                break;
            }
            let matches = match self.regex.captures(pattern, &text) {
                Ok(m) => m,
                Err(e) => {
                    warn!("skipping substitution pattern: {e}");
                    continue;
                }
            };
            if matches.is_empty() {
                continue;
            }

            let chars: Vec<char> = text.chars().collect();
            let edits: Vec<(Range<usize>, String)> = matches
                .into_iter()
                .filter_map(|groups| {
                    let whole = groups.first()?.clone()?;
                    let name = groups.get(1)?.clone()?;
                    let name: String = chars[name].iter().collect();
                    pass.setting.resolve(&name).map(|value| (whole, value))
                })
                .collect();
            if !edits.is_empty() {
                text = replace_ranges(&text, edits);
            }
        }
        text
    }
}

/// Index of the bracket closing the one at `open_at`, honouring nesting.
fn matching_close(chars: &[char], open_at: usize, close: char) -> Option<usize> {
    let open = chars[open_at];
    let mut depth = 0usize;
    for (j, &c) in chars.iter().enumerate().skip(open_at) {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(j);
            }
        }
    }
    None
}

/// Start of the run of characters before `bracket` that are neither
/// whitespace nor brackets, not reaching back past `floor`.
fn run_start(chars: &[char], floor: usize, bracket: usize) -> usize {
    let mut s = bracket;
    while s > floor {
        let c = chars[s - 1];
        if c.is_whitespace() || matches!(c, '[' | ']' | '(' | ')') {
            break;
        }
        s -= 1;
    }
    s
}

// ── Tests ─────────────────────────────────────────────────────────────────────
