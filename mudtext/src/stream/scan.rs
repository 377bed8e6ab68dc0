//! Flat event scanner.
//!
//! Splits one protocol line into [`Event`]s without building any tree.
//! All of the grammar's tolerance for bad input lives here:
//!
//! - `<` not followed by a tag name is literal text
//! - a tag with no `>` before end of line turns the rest of the line into text
//! - attribute values may use either quote, contain the other quote, and use
//!   `\"` / `\'` for literal quotes
//! - a stray delimiter inside a value does not end it (see [`closes_value`])

use tracing::trace;

use super::tag::Attributes;

/// One scanned piece of a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Text(String),
    Open { name: String, attrs: Attributes },
    SelfClose { name: String, attrs: Attributes },
    Close { name: String },
}

/// Result of trying to read a tag at a `<`.
enum TagScan {
    Tag(Event, usize),
    NotATag,
    Unterminated,
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | ':' | '.')
}

fn is_quote(c: char) -> bool {
    c == '"' || c == '\''
}

/// Scan `line` into events.  Adjacent text is merged.
pub fn scan(line: &str) -> Vec<Event> {
    let chars: Vec<char> = line.chars().collect();
    let mut events = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '<' {
            match scan_tag(&chars, i) {
                TagScan::Tag(event, next) => {
                    if !text.is_empty() {
                        events.push(Event::Text(std::mem::take(&mut text)));
                    }
                    events.push(event);
                    i = next;
                    continue;
                }
                TagScan::Unterminated => {
                    trace!(at = i, "unterminated tag, keeping rest of line as text");
                    text.extend(&chars[i..]);
                    break;
                }
                TagScan::NotATag => {}
            }
        }
        text.push(chars[i]);
        i += 1;
    }

    if !text.is_empty() {
        events.push(Event::Text(text));
    }
    events
}

// ── Tags ─────────────────────────────────────────────────────────────────────

fn skip_ws(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

fn read_name(chars: &[char], mut i: usize) -> (String, usize) {
    let start = i;
    while i < chars.len() && is_name_char(chars[i]) {
        i += 1;
    }
    (chars[start..i].iter().collect(), i)
}

fn is_terminator(chars: &[char], i: usize) -> bool {
    match chars.get(i) {
        Some('>') => true,
        Some('/') => chars.get(i + 1) == Some(&'>'),
        _ => false,
    }
}

fn scan_tag(chars: &[char], at: usize) -> TagScan {
    let mut i = at + 1;

    if chars.get(i) == Some(&'/') {
        let (name, next) = read_name(chars, i + 1);
        if name.is_empty() {
            return TagScan::NotATag;
        }
        // Anything between the name and `>` is ignored.
        return match chars[next..].iter().position(|&c| c == '>') {
            Some(off) => TagScan::Tag(
                Event::Close {
                    name: name.to_lowercase(),
                },
                next + off + 1,
            ),
            None => TagScan::Unterminated,
        };
    }

    match chars.get(i) {
        Some(&c) if is_name_start(c) => {}
        _ => return TagScan::NotATag,
    }
    let (name, next) = read_name(chars, i);
    let name = name.to_lowercase();
    i = next;

    let mut attrs = Attributes::new();
    loop {
        i = skip_ws(chars, i);
        match chars.get(i) {
            None => return TagScan::Unterminated,
            Some('>') => return TagScan::Tag(Event::Open { name, attrs }, i + 1),
            Some('/') if chars.get(i + 1) == Some(&'>') => {
                return TagScan::Tag(Event::SelfClose { name, attrs }, i + 2);
            }
            Some(&c) if !is_name_char(c) => {
                // Stray `/`, `=`, quote, … between attributes.
                i += 1;
                continue;
            }
            Some(_) => {}
        }

        let (key, next) = read_name(chars, i);
        i = skip_ws(chars, next);
        if chars.get(i) != Some(&'=') {
            attrs.insert(key, "");
            continue;
        }
        i = skip_ws(chars, i + 1);
        match read_value(chars, i) {
            Some((value, next)) => {
                attrs.insert(key, value);
                i = next;
            }
            None => return TagScan::Unterminated,
        }
    }
}

// ── Attribute values ─────────────────────────────────────────────────────────

/// Read an attribute value starting at `i`.  Returns the value and the index
/// just past it, or `None` if the line ends with no way to finish the tag.
fn read_value(chars: &[char], i: usize) -> Option<(String, usize)> {
    let Some(&q) = chars.get(i) else {
        return None;
    };
    if !is_quote(q) {
        let mut j = i;
        while j < chars.len() && !chars[j].is_whitespace() && !is_terminator(chars, j) {
            j += 1;
        }
        return Some((chars[i..j].iter().collect(), j));
    }

    let mut value = String::new();
    let mut j = i + 1;
    while j < chars.len() {
        let c = chars[j];
        if c == '\\' && chars.get(j + 1).copied().is_some_and(is_quote) {
            value.push(chars[j + 1]);
            j += 2;
            continue;
        }
        if c == q && closes_value(chars, j + 1) {
            return Some((value, j + 1));
        }
        value.push(c);
        j += 1;
    }

    recover_value(chars, i + 1, q)
}

/// Whether a delimiter just before `k` really ends the value: it must be
/// followed by end of line, the tag terminator, or whitespace and then
/// another attribute (or the terminator).
fn closes_value(chars: &[char], k: usize) -> bool {
    if k >= chars.len() || is_terminator(chars, k) {
        return true;
    }
    if !chars[k].is_whitespace() {
        return false;
    }
    let k = skip_ws(chars, k);
    if k >= chars.len() || is_terminator(chars, k) {
        return true;
    }
    let (key, next) = read_name(chars, k);
    if key.is_empty() {
        return false;
    }
    let next = skip_ws(chars, next);
    next >= chars.len() || chars[next] == '=' || is_terminator(chars, next)
}

/// No delimiter qualified.  Take up to the first delimiter sitting right
/// before a terminator, else up to the first `>`.
fn recover_value(chars: &[char], start: usize, q: char) -> Option<(String, usize)> {
    let unescape = |range: &[char]| -> String {
        let mut out = String::with_capacity(range.len());
        let mut it = range.iter().peekable();
        while let Some(&c) = it.next() {
            if c == '\\' && it.peek().is_some_and(|&&n| is_quote(n)) {
                continue;
            }
            out.push(c);
        }
        out
    };

    if let Some(p) = (start..chars.len()).find(|&p| chars[p] == q && is_terminator(chars, p + 1)) {
        trace!("recovered attribute value at delimiter before terminator");
        return Some((unescape(&chars[start..p]), p + 1));
    }
    let gt = (start..chars.len()).find(|&p| chars[p] == '>')?;
    trace!("recovered unclosed attribute value at '>'");
    Some((unescape(&chars[start..gt]), gt))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        let mut a = Attributes::new();
        for (k, v) in pairs {
            a.insert(*k, *v);
        }
        a
    }

    #[test]
    fn plain_text() {
        assert_eq!(scan("hello"), vec![Event::Text("hello".into())]);
        assert!(scan("").is_empty());
    }

    #[test]
    fn self_closing() {
        assert_eq!(
            scan("<popStream/>\n"),
            vec![
                Event::SelfClose { name: "popstream".into(), attrs: Attributes::new() },
                Event::Text("\n".into()),
            ]
        );
    }

    #[test]
    fn open_text_close() {
        assert_eq!(
            scan("<Spell>None</SPELL>"),
            vec![
                Event::Open { name: "spell".into(), attrs: Attributes::new() },
                Event::Text("None".into()),
                Event::Close { name: "spell".into() },
            ]
        );
    }

    #[test]
    fn attribute_quoting() {
        let events = scan(r#"<a x="1" y='2' z=3 flag w = "4"/>"#);
        assert_eq!(
            events,
            vec![Event::SelfClose {
                name: "a".into(),
                attrs: attrs(&[("x", "1"), ("y", "2"), ("z", "3"), ("flag", ""), ("w", "4")]),
            }]
        );
    }

    #[test]
    fn other_quote_inside_value() {
        let events = scan(r#"<a t="it's" u='say "hi"'>"#);
        assert_eq!(
            events,
            vec![Event::Open {
                name: "a".into(),
                attrs: attrs(&[("t", "it's"), ("u", "say \"hi\"")]),
            }]
        );
    }

    #[test]
    fn escaped_quotes() {
        let line = r#"<streamWindow id='main' subtitle=" - [\"Kertigen's Honor\"]" location='center'/>"#;
        let events = scan(line);
        let Event::SelfClose { name, attrs } = &events[0] else {
            panic!("expected self-closing tag, got {events:?}");
        };
        assert_eq!(name, "streamwindow");
        assert_eq!(attrs.get("subtitle"), Some(r#" - ["Kertigen's Honor"]"#));
        assert_eq!(attrs.get("location"), Some("center"));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn unbalanced_quote_inside_value() {
        let events = scan(r#"<a t="foo "bar" baz" id='x'>rest"#);
        assert_eq!(
            events,
            vec![
                Event::Open {
                    name: "a".into(),
                    attrs: attrs(&[("t", r#"foo "bar" baz"#), ("id", "x")]),
                },
                Event::Text("rest".into()),
            ]
        );
    }

    #[test]
    fn apostrophe_in_single_quoted_value() {
        let events = scan("<a title='Kertigen's Honor'>x</a>");
        let Event::Open { attrs, .. } = &events[0] else {
            panic!("expected open tag");
        };
        assert_eq!(attrs.get("title"), Some("Kertigen's Honor"));
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn gt_inside_quoted_value() {
        let events = scan(r#"<a t="1>2">"#);
        assert_eq!(
            events,
            vec![Event::Open { name: "a".into(), attrs: attrs(&[("t", "1>2")]) }]
        );
    }

    #[test]
    fn recovery_to_first_gt() {
        // The delimiter never closes; the value runs to the first `>`.
        let events = scan(r#"<a t="open x>tail"#);
        assert_eq!(
            events,
            vec![
                Event::Open { name: "a".into(), attrs: attrs(&[("t", "open x")]) },
                Event::Text("tail".into()),
            ]
        );
    }

    #[test]
    fn lone_lt_is_text() {
        assert_eq!(scan("a < b <3"), vec![Event::Text("a < b <3".into())]);
        assert_eq!(scan("</>"), vec![Event::Text("</>".into())]);
    }

    #[test]
    fn unterminated_tag_becomes_text() {
        assert_eq!(
            scan("ok <b>bold</b> <i class='x'"),
            vec![
                Event::Text("ok ".into()),
                Event::Open { name: "b".into(), attrs: Attributes::new() },
                Event::Text("bold".into()),
                Event::Close { name: "b".into() },
                Event::Text(" <i class='x'".into()),
            ]
        );
    }

    #[test]
    fn close_tag_with_junk() {
        assert_eq!(scan("</b junk>"), vec![Event::Close { name: "b".into() }]);
    }

    #[test]
    fn non_ascii_text() {
        assert_eq!(
            scan("héllo <b>wörld</b>"),
            vec![
                Event::Text("héllo ".into()),
                Event::Open { name: "b".into(), attrs: Attributes::new() },
                Event::Text("wörld".into()),
                Event::Close { name: "b".into() },
            ]
        );
    }
}
