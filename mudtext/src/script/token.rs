//! Lexed script instructions.

/// One instruction, produced from one line of script source.
///
/// The interpreter runs substitution over the payloads before acting on
/// them; the lexer stores them exactly as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptTokenValue {
    /// `# text`: everything after the `#`.
    Comment(String),
    /// `debug level`
    Debug(String),
    /// `echo text`
    Echo(String),
    /// `exit`
    Exit,
    /// `goto label`
    Goto(String),
    /// `name:`
    Label(String),
    /// `match label text`
    Match { label: String, text: String },
    /// `matchre label pattern`
    MatchRe { label: String, pattern: String },
    /// `matchwait [timeout]`
    MatchWait(String),
    /// `pause [seconds]`
    Pause(String),
    /// `put text`
    Put(String),
    /// `random min max`
    Random { min: String, max: String },
    /// `save text`
    Save(String),
    /// `send text`
    Send(String),
    /// `setvariable name value` / `var name value`
    Variable { name: String, value: String },
    /// `waitfor text`
    WaitFor(String),
    /// `waitforre pattern`
    WaitForRe(String),
}

impl ScriptTokenValue {
    /// The command keyword this instruction was lexed from.
    pub fn keyword(&self) -> &'static str {
        match self {
            ScriptTokenValue::Comment(_) => "#",
            ScriptTokenValue::Debug(_) => "debug",
            ScriptTokenValue::Echo(_) => "echo",
            ScriptTokenValue::Exit => "exit",
            ScriptTokenValue::Goto(_) => "goto",
            ScriptTokenValue::Label(_) => "label",
            ScriptTokenValue::Match { .. } => "match",
            ScriptTokenValue::MatchRe { .. } => "matchre",
            ScriptTokenValue::MatchWait(_) => "matchwait",
            ScriptTokenValue::Pause(_) => "pause",
            ScriptTokenValue::Put(_) => "put",
            ScriptTokenValue::Random { .. } => "random",
            ScriptTokenValue::Save(_) => "save",
            ScriptTokenValue::Send(_) => "send",
            ScriptTokenValue::Variable { .. } => "setvariable",
            ScriptTokenValue::WaitFor(_) => "waitfor",
            ScriptTokenValue::WaitForRe(_) => "waitforre",
        }
    }
}

impl std::fmt::Display for ScriptTokenValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptTokenValue::Comment(s) => write!(f, "#{s}"),
            ScriptTokenValue::Label(s) => write!(f, "{s}:"),
            ScriptTokenValue::Exit => f.write_str("exit"),
            ScriptTokenValue::Match { label, text } => write!(f, "match {label} {text}"),
            ScriptTokenValue::MatchRe { label, pattern } => write!(f, "matchre {label} {pattern}"),
            ScriptTokenValue::Random { min, max } => write!(f, "random {min} {max}"),
            ScriptTokenValue::Variable { name, value } => write!(f, "setvariable {name} {value}"),
            ScriptTokenValue::Debug(s)
            | ScriptTokenValue::Echo(s)
            | ScriptTokenValue::Goto(s)
            | ScriptTokenValue::MatchWait(s)
            | ScriptTokenValue::Pause(s)
            | ScriptTokenValue::Put(s)
            | ScriptTokenValue::Save(s)
            | ScriptTokenValue::Send(s)
            | ScriptTokenValue::WaitFor(s)
            | ScriptTokenValue::WaitForRe(s) => {
                if s.is_empty() {
                    f.write_str(self.keyword())
                } else {
                    write!(f, "{} {s}", self.keyword())
                }
            }
        }
    }
}
