//! End-to-end behaviour across the stream tokenizer, script lexer, variable
//! store and substitution engine.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use mudtext::clock::{DateFormats, FixedClock};
use mudtext::config::Config;
use mudtext::pattern::{PatternError, RegexEngine};
use mudtext::script::{tokenize_script, ScriptLexer, ScriptTokenValue, SubstitutionEngine, VariableSetting};
use mudtext::stream::{tokenize, Tag};
use mudtext::var::{VariableEvent, VariableStore};

fn engine(store: &Arc<VariableStore>) -> SubstitutionEngine {
    SubstitutionEngine::new(
        Arc::new(RegexEngine::new()),
        vec![VariableSetting::new("$", store.resolver())],
    )
    .unwrap()
}

// ── Stream ───────────────────────────────────────────────────────────────────

#[test]
fn stream_lines() {
    let line = "A goblin arrives.";
    assert_eq!(tokenize(line), vec![Tag::text(line)]);

    let tags = tokenize("<popStream/>\n");
    assert_eq!(tags.len(), 2);
    assert_eq!(tags[0].name(), "popstream");
    assert!(tags[0].is_self_closing());
    assert!(tags[1].is_text());

    let tags = tokenize("<spell>None</spell>\n");
    assert_eq!((tags[0].name(), tags[0].value()), ("spell", "None"));
    assert_eq!(tags[1].value(), "\n");

    let tags = tokenize("<dialogData><skin>one</skin><skin>two</skin></dialogData>\n");
    assert_eq!((tags[0].name(), tags[0].value()), ("dialogdata", "one,two"));
}

#[test]
fn room_exits_component() {
    let tags = tokenize(
        "<component id='room exits'>Obvious paths: <d>north</d>, <d>south</d>.<compass></compass></component>",
    );
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name(), "component");
    assert_eq!(tags[0].attr("id"), Some("room exits"));
    assert_eq!(tags[0].children().len(), 8);
}

#[test]
fn escaped_quotes_in_subtitle() {
    let tags = tokenize(
        r#"<streamWindow id='main' title='Story' subtitle=" - [\"Kertigen's Honor\"]" location='center' target='drop' resident='true'/>"#,
    );
    assert_eq!(tags.len(), 1);
    let w = &tags[0];
    assert_eq!(w.attr("subtitle"), Some(r#" - ["Kertigen's Honor"]"#));
    assert_eq!(w.attr("location"), Some("center"));
    assert_eq!(w.attr("resident"), Some("true"));
    assert!(w.is_self_closing());
}

// ── Lexer ────────────────────────────────────────────────────────────────────

#[test]
fn lexer_lines() {
    let mut lexer = ScriptLexer::new();
    assert_eq!(lexer.tokenize("echo hello world"), Some(ScriptTokenValue::Echo("hello world".into())));
    assert_eq!(
        lexer.tokenize("match mylabel some text"),
        Some(ScriptTokenValue::Match {
            label: "mylabel".into(),
            text: "some text".into(),
        })
    );
    assert_eq!(lexer.tokenize("  goto start"), Some(ScriptTokenValue::Goto("start".into())));
    assert_eq!(lexer.tokenize("foo:"), Some(ScriptTokenValue::Label("foo".into())));
    assert_eq!(lexer.tokenize("# note"), Some(ScriptTokenValue::Comment(" note".into())));
    assert_eq!(lexer.tokenize("dance wildly"), None);
}

#[test]
fn script_runs_through_substitution() {
    let src = "\
# hunt loop
setvariable weapons sword|axe|bow
var target orc
start:
put wield $weapons[1]
put attack $target
goto start
";
    let store = Arc::new(VariableStore::new());
    let engine = engine(&store);
    let mut sent = Vec::new();

    for (_, token) in tokenize_script(src) {
        match token {
            ScriptTokenValue::Variable { name, value } => store.set(name, engine.substitute(&value)),
            ScriptTokenValue::Put(text) => sent.push(engine.substitute(&text)),
            _ => {}
        }
    }
    assert_eq!(sent, ["wield axe", "attack orc"]);
}

// ── Variables ────────────────────────────────────────────────────────────────

#[test]
fn dynamic_date_ignores_set_and_follows_clock() {
    let start = NaiveDate::from_ymd_opt(2024, 3, 9)
        .unwrap()
        .and_hms_opt(23, 59, 59)
        .unwrap();
    let clock = Arc::new(FixedClock::new(start));
    let store = VariableStore::with_clock(clock.clone(), DateFormats::default());

    store.set("date", "yesterday");
    assert_eq!(store.get("date").as_deref(), Some("2024-03-09"));

    let before = store.get("time");
    clock.advance(Duration::seconds(1));
    assert_eq!(store.get("date").as_deref(), Some("2024-03-10"));
    assert_ne!(store.get("time"), before);
}

#[test]
fn clear_keeps_dynamic_keys_and_notifies() {
    let store = VariableStore::new();
    let mut events = store.subscribe();
    store.set("hp", "10");
    store.set("hp", "10");
    store.clear();

    assert_eq!(
        events.try_recv().unwrap(),
        VariableEvent::Set {
            key: "hp".into(),
            value: "10".into()
        }
    );
    assert_eq!(events.try_recv().unwrap(), VariableEvent::Cleared);
    assert!(events.try_recv().is_err());
    assert!(store.get("hp").is_none());
    assert!(store.get("datetime").is_some());
}

// ── Substitution ─────────────────────────────────────────────────────────────

#[test]
fn indexed_and_self_referential() {
    let store = Arc::new(VariableStore::new());
    store.set("name", "a|b|c");
    store.set("x", "$x");
    let engine = engine(&store);

    assert_eq!(engine.substitute("$name[1]"), "b");
    assert_eq!(engine.substitute("$name[3]"), "a|b|c[3]");
    assert_eq!(engine.substitute("$x"), "$x");
    assert_eq!(engine.substitute("no references here"), "no references here");
}

#[test]
fn substitution_is_shared_across_threads() {
    let store = Arc::new(VariableStore::new());
    store.set("who", "Kertigen");
    let engine = Arc::new(engine(&store));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                store.set(format!("n{i}"), i.to_string());
                for _ in 0..100 {
                    assert_eq!(engine.substitute("hi $who"), "hi Kertigen");
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(engine.substitute("$n0 $n3"), "0 3");
}

#[test]
fn invalid_pattern_is_reported() {
    let regex = RegexEngine::new();
    assert!(matches!(regex.compile("(unclosed"), Err(PatternError::InvalidPattern { .. })));
}

// ── Settings ─────────────────────────────────────────────────────────────────

#[test]
fn settings_file_drives_engine() {
    let (config, errors) = Config::load_str("sigils = $ %\nvar where Crossing\ndate_format = %d.%m.%Y\n");
    assert!(errors.is_empty(), "{errors:?}");
    let store = config.build_store();
    let engine = config
        .build_engine(Arc::new(RegexEngine::new()), &store)
        .unwrap();
    assert_eq!(engine.substitute("in $where / %where"), "in Crossing / Crossing");
    let date = store.get("date").unwrap();
    assert_eq!(date.matches('.').count(), 2);
}
