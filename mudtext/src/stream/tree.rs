//! Tag tree builder.
//!
//! Folds the scanner's flat [`Event`]s into [`Tag`]s.  Nesting is tracked
//! with an explicit stack of open tags:
//!
//! - a close tag pops back to the nearest open tag of the same name,
//!   closing anything opened inside it
//! - a close tag nobody opened is dropped
//! - tags still open at end of line are closed there

use tracing::trace;

use super::scan::Event;
use super::tag::{Attributes, Tag};

/// An open tag being filled in.
struct OpenTag {
    name: String,
    attrs: Attributes,
    children: Vec<Tag>,
    /// Concatenated direct text children.
    text: Option<String>,
    /// Values of direct tag children.
    child_values: Vec<String>,
}

impl OpenTag {
    fn new(name: String, attrs: Attributes) -> Self {
        Self {
            name,
            attrs,
            children: Vec::new(),
            text: None,
            child_values: Vec::new(),
        }
    }

    fn push_text(&mut self, text: String) {
        self.text.get_or_insert_with(String::new).push_str(&text);
        self.children.push(Tag::text(text));
    }

    fn push_tag(&mut self, tag: Tag) {
        self.child_values.push(tag.value.clone());
        let nested = tag.children.clone();
        self.children.push(tag);
        self.children.extend(nested);
    }

    fn finish(self) -> Tag {
        let value = match self.text {
            Some(text) => text,
            None => self.child_values.join(","),
        };
        Tag {
            name: self.name,
            attrs: self.attrs,
            value,
            children: self.children,
            self_closing: false,
        }
    }
}

struct Builder {
    root: Vec<Tag>,
    open: Vec<OpenTag>,
}

impl Builder {
    fn attach(&mut self, tag: Tag) {
        match self.open.last_mut() {
            Some(parent) => parent.push_tag(tag),
            None => self.root.push(tag),
        }
    }

    fn text(&mut self, text: String) {
        if let Some(parent) = self.open.last_mut() {
            parent.push_text(text);
            return;
        }
        match self.root.last_mut() {
            Some(last) if last.is_text() => last.value.push_str(&text),
            _ => self.root.push(Tag::text(text)),
        }
    }

    /// Close open tags down to and including `depth`.
    fn close_to(&mut self, depth: usize) {
        while self.open.len() > depth {
            if let Some(tag) = self.open.pop() {
                let tag = tag.finish();
                self.attach(tag);
            }
        }
    }
}

/// Build tags from a scanned line.
pub fn build(events: Vec<Event>) -> Vec<Tag> {
    let mut b = Builder {
        root: Vec::new(),
        open: Vec::new(),
    };

    for event in events {
        match event {
            Event::Text(text) => b.text(text),
            Event::Open { name, attrs } => b.open.push(OpenTag::new(name, attrs)),
            Event::SelfClose { name, attrs } => b.attach(Tag {
                name,
                attrs,
                value: String::new(),
                children: Vec::new(),
                self_closing: true,
            }),
            Event::Close { name } => match b.open.iter().rposition(|t| t.name == name) {
                Some(depth) => b.close_to(depth),
                None => trace!(name = %name, "dropping unmatched close tag"),
            },
        }
    }

    b.close_to(0);
    b.root
}

// ── Tests ─────────────────────────────────────────────────────────────────────
