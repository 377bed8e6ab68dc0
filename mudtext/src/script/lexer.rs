//! Script line lexer.
//!
//! Every script line is one instruction.  The lexer starts in
//! [`Mode::Command`], which reads the leading word and looks it up in
//! [`DISPATCH`].  The mode it finds is pushed on the mode stack, reads the
//! rest of the line, appends its instruction and yields no further mode, so
//! the stack unwinds back to `Command` ready for the next line.
//!
//! | Input                    | Instruction                       |
//! |--------------------------|-----------------------------------|
//! | `# note`                 | `Comment(" note")`                |
//! | `start:`                 | `Label("start")`                  |
//! | `echo hello world`       | `Echo("hello world")`             |
//! | `match found You see`    | `Match { "found", "You see" }`    |
//! | `var target orc`         | `Variable { "target", "orc" }`    |
//! | `dance wildly`           | nothing (not a command)           |

use tracing::trace;

use super::token::ScriptTokenValue;

/// Commands whose whole remainder is the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Single {
    Debug,
    Echo,
    Goto,
    MatchWait,
    Pause,
    Put,
    Save,
    Send,
    WaitFor,
    WaitForRe,
}

impl Single {
    fn build(self, payload: String) -> ScriptTokenValue {
        match self {
            Single::Debug => ScriptTokenValue::Debug(payload),
            Single::Echo => ScriptTokenValue::Echo(payload),
            Single::Goto => ScriptTokenValue::Goto(payload),
            Single::MatchWait => ScriptTokenValue::MatchWait(payload),
            Single::Pause => ScriptTokenValue::Pause(payload),
            Single::Put => ScriptTokenValue::Put(payload),
            Single::Save => ScriptTokenValue::Save(payload),
            Single::Send => ScriptTokenValue::Send(payload),
            Single::WaitFor => ScriptTokenValue::WaitFor(payload),
            Single::WaitForRe => ScriptTokenValue::WaitForRe(payload),
        }
    }
}

/// Commands taking a leading word plus the rest of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pair {
    Match,
    MatchRe,
    Random,
    Variable,
}

impl Pair {
    fn build(self, first: String, rest: String) -> ScriptTokenValue {
        match self {
            Pair::Match => ScriptTokenValue::Match { label: first, text: rest },
            Pair::MatchRe => ScriptTokenValue::MatchRe { label: first, pattern: rest },
            Pair::Random => ScriptTokenValue::Random { min: first, max: rest },
            Pair::Variable => ScriptTokenValue::Variable { name: first, value: rest },
        }
    }
}

/// A lexer reading mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Top level: read the leading word and dispatch.
    Command,
    Comment,
    Label,
    Exit,
    Single(Single),
    Pair(Pair),
}

/// Leading word (lowercased) → mode.
const DISPATCH: &[(&str, Mode)] = &[
    ("debug", Mode::Single(Single::Debug)),
    ("echo", Mode::Single(Single::Echo)),
    ("exit", Mode::Exit),
    ("goto", Mode::Single(Single::Goto)),
    ("match", Mode::Pair(Pair::Match)),
    ("matchre", Mode::Pair(Pair::MatchRe)),
    ("matchwait", Mode::Single(Single::MatchWait)),
    ("pause", Mode::Single(Single::Pause)),
    ("put", Mode::Single(Single::Put)),
    ("random", Mode::Pair(Pair::Random)),
    ("save", Mode::Single(Single::Save)),
    ("send", Mode::Single(Single::Send)),
    ("setvariable", Mode::Pair(Pair::Variable)),
    ("var", Mode::Pair(Pair::Variable)),
    ("waitfor", Mode::Single(Single::WaitFor)),
    ("waitforre", Mode::Single(Single::WaitForRe)),
];

fn dispatch(word: &str) -> Option<Mode> {
    let key = word.to_lowercase();
    DISPATCH
        .iter()
        .find(|(name, _)| *name == key)
        .map(|&(_, mode)| mode)
}

// ── Cursor ───────────────────────────────────────────────────────────────────

fn is_space(c: char) -> bool {
    c == ' ' || c == '\t'
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_spaces(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start_matches(is_space).len();
    }

    /// Consume up to the next space (or end of line).
    fn word(&mut self) -> &'a str {
        let rest = self.rest();
        let len = rest.find(is_space).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn take_rest(&mut self) -> &'a str {
        let rest = self.rest();
        self.pos = self.src.len();
        rest
    }
}

// ── Lexer ────────────────────────────────────────────────────────────────────

/// Lexes script lines one at a time.
///
/// The lexer is reusable: no line state survives between calls.
#[derive(Debug)]
pub struct ScriptLexer {
    modes: Vec<Mode>,
    out: Vec<ScriptTokenValue>,
}

impl Default for ScriptLexer {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptLexer {
    pub fn new() -> Self {
        Self {
            modes: vec![Mode::Command],
            out: Vec::new(),
        }
    }

    /// Lex one line.  `None` for blank lines and unknown commands.
    pub fn tokenize(&mut self, line: &str) -> Option<ScriptTokenValue> {
        let mut cursor = Cursor::new(line);
        loop {
            let mode = *self.modes.last().unwrap_or(&Mode::Command);
            match self.step(mode, &mut cursor) {
                Some(next) => self.modes.push(next),
                None => {
                    if self.modes.len() > 1 {
                        self.modes.pop();
                    }
                    if self.modes.len() == 1 {
                        break;
                    }
                }
            }
        }
        self.out.pop()
    }

    /// Run `mode` once.  Returns the mode to push next, if any.
    fn step(&mut self, mode: Mode, cursor: &mut Cursor<'_>) -> Option<Mode> {
        match mode {
            Mode::Command => {
                cursor.skip_spaces();
                if cursor.peek() == Some('#') {
                    return Some(Mode::Comment);
                }
                let start = cursor.pos;
                let word = cursor.word();
                if word.is_empty() {
                    return None;
                }
                if let Some(next) = dispatch(word) {
                    return Some(next);
                }
                if word.len() > 1 && word.ends_with(':') {
                    // Label mode re-reads the word.
                    cursor.pos = start;
                    return Some(Mode::Label);
                }
                trace!(word, "not a script command");
                None
            }
            Mode::Comment => {
                let text = cursor.take_rest();
                let text = text.strip_prefix('#').unwrap_or(text);
                self.out.push(ScriptTokenValue::Comment(text.to_owned()));
                None
            }
            Mode::Label => {
                let word = cursor.word();
                let name = word.strip_suffix(':').unwrap_or(word);
                self.out.push(ScriptTokenValue::Label(name.to_owned()));
                None
            }
            Mode::Exit => {
                self.out.push(ScriptTokenValue::Exit);
                None
            }
            Mode::Single(kind) => {
                cursor.skip_spaces();
                let payload = cursor.take_rest().to_owned();
                self.out.push(kind.build(payload));
                None
            }
            Mode::Pair(kind) => {
                cursor.skip_spaces();
                let first = cursor.word().to_owned();
                cursor.skip_spaces();
                let rest = cursor.take_rest().to_owned();
                self.out.push(kind.build(first, rest));
                None
            }
        }
    }
}

/// Lex every line of `src`, returning `(line_number, instruction)` pairs for
/// lines that produced one.  Line numbers are 1-based.
pub fn tokenize_script(src: &str) -> Vec<(usize, ScriptTokenValue)> {
    let mut lexer = ScriptLexer::new();
    src.lines()
        .enumerate()
        .filter_map(|(i, line)| lexer.tokenize(line).map(|t| (i + 1, t)))
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
