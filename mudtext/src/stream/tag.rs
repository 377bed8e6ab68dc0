//! The `Tag` token produced by the stream tokenizer.

/// Attribute list in source order.  Keys are unique: a repeated key replaces
/// the earlier value but keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(Vec<(String, String)>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|slot| slot.0 == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Name used for plain-text tokens.
pub const TEXT: &str = "text";

/// One parsed unit of the game stream.
///
/// `children` lists every descendant in document order: a nested tag is
/// followed by its own descendants, and text runs appear as `text` tags.
/// `value` is the tag's own text, or if it has none, its child tags' values
/// joined with `,`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub(crate) name: String,
    pub(crate) attrs: Attributes,
    pub(crate) value: String,
    pub(crate) children: Vec<Tag>,
    pub(crate) self_closing: bool,
}

impl Tag {
    /// A plain-text token.
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            name: TEXT.to_owned(),
            attrs: Attributes::new(),
            value: value.into(),
            children: Vec::new(),
            self_closing: false,
        }
    }

    /// Lowercased tag name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key)
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn children(&self) -> &[Tag] {
        &self.children
    }

    pub fn is_self_closing(&self) -> bool {
        self.self_closing
    }

    pub fn is_text(&self) -> bool {
        self.name == TEXT
    }

    /// First descendant named `name` (already lowercase).
    pub fn find(&self, name: &str) -> Option<&Tag> {
        self.children.iter().find(|t| t.name == name)
    }
}
