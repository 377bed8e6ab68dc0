//! Global variable store.
//!
//! Both the protocol parser (network side) and running scripts read and write
//! variables, so the store is shared behind an `Arc` and guarded by an
//! `RwLock`: many readers, one writer at a time.
//!
//! A handful of keys are *dynamic*: they hold a [`ComputedKind`] instead of a
//! literal and are re-evaluated against the store's [`Clock`] on every read.
//! Dynamic keys cannot be overwritten or removed, and survive [`clear`].
//!
//! Every change is announced on a `tokio::sync::broadcast` channel.  Sending
//! never blocks, so a slow subscriber can lag but cannot stall the writer.
//!
//! [`clear`]: VariableStore::clear

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::clock::{Clock, DateFormats, SystemClock};
use crate::script::expand::Resolver;

/// Buffered events per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 256;

// ── Values ───────────────────────────────────────────────────────────────────

/// The closed set of computed variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputedKind {
    CurrentDate,
    CurrentDateTime,
    CurrentTime,
}

impl ComputedKind {
    /// Default dynamic bindings installed by [`VariableStore::new`].
    pub const DEFAULTS: &'static [(&'static str, ComputedKind)] = &[
        ("date", ComputedKind::CurrentDate),
        ("datetime", ComputedKind::CurrentDateTime),
        ("time", ComputedKind::CurrentTime),
    ];

    /// Evaluate against `clock`.  `None` if the configured format is invalid.
    pub fn evaluate(self, clock: &dyn Clock, formats: &DateFormats) -> Option<String> {
        let fmt = match self {
            ComputedKind::CurrentDate => &formats.date,
            ComputedKind::CurrentDateTime => &formats.datetime,
            ComputedKind::CurrentTime => &formats.time,
        };
        let mut out = String::new();
        write!(out, "{}", clock.now().format(fmt)).ok()?;
        Some(out)
    }
}

/// A stored binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DynamicValue {
    Literal(String),
    Computed(ComputedKind),
}

/// A change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableEvent {
    Set { key: String, value: String },
    Removed { key: String },
    Cleared,
}

// ── Store ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Inner {
    vars: HashMap<String, DynamicValue>,
    /// Registration order is kept so `clear` can replay it.
    dynamic: Vec<(String, ComputedKind)>,
}

impl Inner {
    fn is_dynamic(&self, key: &str) -> bool {
        self.dynamic.iter().any(|(k, _)| k == key)
    }

    fn install_dynamic(&mut self) {
        for (key, kind) in &self.dynamic {
            self.vars.insert(key.clone(), DynamicValue::Computed(*kind));
        }
    }
}

/// Concurrency-safe name → value store.
pub struct VariableStore {
    inner: RwLock<Inner>,
    clock: Arc<dyn Clock>,
    formats: DateFormats,
    events: broadcast::Sender<VariableEvent>,
}

impl std::fmt::Debug for VariableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableStore")
            .field("len", &self.len())
            .field("formats", &self.formats)
            .finish()
    }
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableStore {
    /// A store on the system clock with the default date/time variables.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock), DateFormats::default())
    }

    /// A store on `clock`, with the default date/time variables.
    pub fn with_clock(clock: Arc<dyn Clock>, formats: DateFormats) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let store = Self {
            inner: RwLock::new(Inner::default()),
            clock,
            formats,
            events,
        };
        for &(key, kind) in ComputedKind::DEFAULTS {
            store.register_dynamic(key, kind);
        }
        store
    }

    /// Register `key` as a computed variable, replacing any literal.
    pub fn register_dynamic(&self, key: impl Into<String>, kind: ComputedKind) {
        let key = key.into();
        let mut inner = self.write();
        if let Some(slot) = inner.dynamic.iter_mut().find(|slot| slot.0 == key) {
            slot.1 = kind;
        } else {
            inner.dynamic.push((key.clone(), kind));
        }
        inner.vars.insert(key, DynamicValue::Computed(kind));
    }

    /// Returns `true` if `key` is computed and therefore write-protected.
    pub fn is_dynamic(&self, key: &str) -> bool {
        self.read().is_dynamic(key)
    }

    /// Current value of `key`.  Dynamic keys are evaluated now.
    pub fn get(&self, key: &str) -> Option<String> {
        let value = self.read().vars.get(key).cloned()?;
        self.evaluate(value)
    }

    /// Store a literal.  Ignored for dynamic keys and for unchanged values.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        {
            let mut inner = self.write();
            if inner.is_dynamic(&key) {
                debug!(key = %key, "ignoring write to dynamic variable");
                return;
            }
            if let Some(DynamicValue::Literal(old)) = inner.vars.get(&key) {
                if *old == value {
                    return;
                }
            }
            inner.vars.insert(key.clone(), DynamicValue::Literal(value.clone()));
        }
        trace!(key = %key, value = %value, "variable set");
        self.notify(VariableEvent::Set { key, value });
    }

    /// Remove a literal.  Returns `true` if it existed.
    pub fn remove(&self, key: &str) -> bool {
        let removed = {
            let mut inner = self.write();
            if inner.is_dynamic(key) {
                debug!(key, "ignoring removal of dynamic variable");
                return false;
            }
            inner.vars.remove(key).is_some()
        };
        if removed {
            self.notify(VariableEvent::Removed { key: key.to_owned() });
        }
        removed
    }

    /// Drop every literal.  Dynamic keys are re-registered afterwards.
    pub fn clear(&self) {
        {
            let mut inner = self.write();
            inner.vars.clear();
            inner.install_dynamic();
        }
        self.notify(VariableEvent::Cleared);
    }

    /// All bindings sorted by key, dynamic values evaluated now.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        let bindings: Vec<(String, DynamicValue)> = self
            .read()
            .vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut out: Vec<(String, String)> = bindings
            .into_iter()
            .filter_map(|(k, v)| Some((k, self.evaluate(v)?)))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Receive every change made after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<VariableEvent> {
        self.events.subscribe()
    }

    /// A resolver for [`crate::script::expand::VariableSetting`] backed by this store.
    pub fn resolver(self: &Arc<Self>) -> Resolver {
        let store = Arc::clone(self);
        Arc::new(move |name: &str| store.get(name))
    }

    pub fn len(&self) -> usize {
        self.read().vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().vars.is_empty()
    }

    fn evaluate(&self, value: DynamicValue) -> Option<String> {
        match value {
            DynamicValue::Literal(s) => Some(s),
            DynamicValue::Computed(kind) => kind.evaluate(self.clock.as_ref(), &self.formats),
        }
    }

    fn notify(&self, event: VariableEvent) {
        // Err only means nobody is subscribed.
        let _ = self.events.send(event);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::NaiveDate;
    use tokio::sync::broadcast::error::TryRecvError;

    fn fixed() -> (Arc<FixedClock>, VariableStore) {
        let now = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(23, 59, 58)
            .unwrap();
        let clock = Arc::new(FixedClock::new(now));
        let store = VariableStore::with_clock(clock.clone(), DateFormats::default());
        (clock, store)
    }

    #[test]
    fn set_and_get() {
        let vars = VariableStore::new();
        vars.set("roomid", "42");
        assert_eq!(vars.get("roomid").as_deref(), Some("42"));
    }

    #[test]
    fn overwrite() {
        let vars = VariableStore::new();
        vars.set("x", "old");
        vars.set("x", "new");
        assert_eq!(vars.get("x").as_deref(), Some("new"));
    }

    #[test]
    fn missing_returns_none() {
        let vars = VariableStore::new();
        assert_eq!(vars.get("nope"), None);
    }

    #[test]
    fn dynamic_key_is_write_protected() {
        let (_, vars) = fixed();
        vars.set("date", "yesterday");
        assert_eq!(vars.get("date").as_deref(), Some("2024-03-09"));
        assert!(!vars.remove("date"));
        assert!(vars.is_dynamic("date"));
    }

    #[test]
    fn dynamic_value_follows_clock() {
        let (clock, vars) = fixed();
        let before = vars.get("datetime").unwrap();
        clock.advance(chrono::Duration::seconds(3));
        let after = vars.get("datetime").unwrap();
        assert_eq!(before, "2024-03-09 11:59:58 PM");
        assert_eq!(after, "2024-03-10 12:00:01 AM");
        assert_ne!(before, after);
    }

    #[test]
    fn remove_literal() {
        let vars = VariableStore::new();
        vars.set("gone", "bye");
        assert!(vars.remove("gone"));
        assert_eq!(vars.get("gone"), None);
        assert!(!vars.remove("gone"));
    }

    #[test]
    fn clear_keeps_dynamic_keys() {
        let (_, vars) = fixed();
        vars.set("a", "1");
        vars.clear();
        assert_eq!(vars.get("a"), None);
        assert_eq!(vars.get("time").as_deref(), Some("11:59:58 PM"));
        assert_eq!(vars.len(), ComputedKind::DEFAULTS.len());
    }

    #[test]
    fn snapshot_is_sorted_and_evaluated() {
        let (_, vars) = fixed();
        vars.set("zeta", "z");
        vars.set("alpha", "a");
        let snap = vars.snapshot();
        let keys: Vec<&str> = snap.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["alpha", "date", "datetime", "time", "zeta"]);
        assert_eq!(snap[1].1, "2024-03-09");
    }

    #[test]
    fn register_dynamic_replaces_literal() {
        let (_, vars) = fixed();
        vars.set("today", "literal");
        vars.register_dynamic("today", ComputedKind::CurrentDate);
        assert_eq!(vars.get("today").as_deref(), Some("2024-03-09"));
        vars.set("today", "again");
        assert_eq!(vars.get("today").as_deref(), Some("2024-03-09"));
    }

    #[test]
    fn invalid_format_yields_none() {
        let clock = Arc::new(FixedClock::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
        ));
        let formats = DateFormats {
            date: "%Q".into(),
            ..DateFormats::default()
        };
        let vars = VariableStore::with_clock(clock, formats);
        assert_eq!(vars.get("date"), None);
    }

    #[test]
    fn events_only_for_changes() {
        let vars = VariableStore::new();
        let mut rx = vars.subscribe();
        vars.set("hp", "10");
        vars.set("hp", "10");
        vars.set("date", "ignored");
        vars.remove("hp");
        vars.clear();
        assert_eq!(
            rx.try_recv().unwrap(),
            VariableEvent::Set { key: "hp".into(), value: "10".into() }
        );
        assert_eq!(rx.try_recv().unwrap(), VariableEvent::Removed { key: "hp".into() });
        assert_eq!(rx.try_recv().unwrap(), VariableEvent::Cleared);
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn set_without_subscribers_does_not_fail() {
        let vars = VariableStore::new();
        vars.set("quiet", "1");
        assert_eq!(vars.get("quiet").as_deref(), Some("1"));
    }

    #[test]
    fn resolver_reads_store() {
        let vars = Arc::new(VariableStore::new());
        let resolve = vars.resolver();
        vars.set("name", "Kertigen");
        assert_eq!(resolve("name").as_deref(), Some("Kertigen"));
        assert_eq!(resolve("missing"), None);
    }

    #[test]
    fn concurrent_writers_and_readers() {
        let vars = Arc::new(VariableStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let vars = Arc::clone(&vars);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        vars.set(format!("t{t}"), i.to_string());
                        let _ = vars.get(&format!("t{}", (t + 1) % 8));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        for t in 0..8 {
            assert_eq!(vars.get(&format!("t{t}")).as_deref(), Some("99"));
        }
    }
}
