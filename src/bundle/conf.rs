//! Ordered configuration document model and its text rendering
//!
//! The rendered grammar is the block-oriented HOCON subset bundle.conf
//! consumers expect:
//!
//! ```text
//! key = "string"
//! key = 123
//! list = [
//!   "item"
//! ]
//! object {
//!   nested = true
//! }
//! empty {}
//! ```
//!
//! Entry order is preserved exactly as inserted, since downstream tools
//! diff and hash the rendered text.

use std::fmt::{self, Write};

use serde_json::{Number, Value};

use crate::oci::AnnotationValue;

const INDENT: &str = "  ";

/// A value in a configuration document
#[derive(Debug, Clone, PartialEq)]
pub enum ConfValue {
    String(String),
    Number(Number),
    Bool(bool),
    List(Vec<ConfValue>),
    Object(ConfObject),
}

impl ConfValue {
    pub fn string<S: Into<String>>(s: S) -> Self {
        ConfValue::String(s.into())
    }

    /// List of quoted strings
    pub fn strings<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ConfValue::List(items.into_iter().map(ConfValue::string).collect())
    }

    /// Float rendered bare; non-finite values fall back to a quoted string
    pub fn decimal(value: f64) -> Self {
        match Number::from_f64(value) {
            Some(n) => ConfValue::Number(n),
            None => ConfValue::String(value.to_string()),
        }
    }

    pub fn as_object(&self) -> Option<&ConfObject> {
        match self {
            ConfValue::Object(obj) => Some(obj),
            _ => None,
        }
    }
}

impl From<u64> for ConfValue {
    fn from(n: u64) -> Self {
        ConfValue::Number(n.into())
    }
}

impl From<u16> for ConfValue {
    fn from(n: u16) -> Self {
        ConfValue::Number(n.into())
    }
}

impl From<&str> for ConfValue {
    fn from(s: &str) -> Self {
        ConfValue::String(s.to_string())
    }
}

impl From<String> for ConfValue {
    fn from(s: String) -> Self {
        ConfValue::String(s)
    }
}

impl From<ConfObject> for ConfValue {
    fn from(obj: ConfObject) -> Self {
        ConfValue::Object(obj)
    }
}

impl From<AnnotationValue> for ConfValue {
    fn from(value: AnnotationValue) -> Self {
        match value {
            AnnotationValue::String(s) => ConfValue::String(s),
            AnnotationValue::Number(n) => ConfValue::Number(n),
            AnnotationValue::Bool(b) => ConfValue::Bool(b),
        }
    }
}

/// Insertion-ordered object with unique keys
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfObject {
    entries: Vec<(String, ConfValue)>,
}

impl ConfObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ConfValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ConfValue> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Set `key`, replacing an existing value in place or appending a new entry
    pub fn insert<K: Into<String>, V: Into<ConfValue>>(&mut self, key: K, value: V) {
        let key = key.into();
        let value = value.into();
        match self.get_mut(&key) {
            Some(existing) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder-style [`ConfObject::insert`]
    pub fn with<K: Into<String>, V: Into<ConfValue>>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Render as a top-level document (no surrounding braces, no trailing newline)
    pub fn render(&self) -> String {
        let mut out = String::new();
        // fmt::Write into a String cannot fail
        let _ = write_entries(&mut out, self, 0);
        out
    }
}

/// Quote a string as a JSON string literal, which HOCON reads verbatim
pub fn quote(s: &str) -> String {
    Value::String(s.to_owned()).to_string()
}

/// Keys are written bare unless they contain anything beyond `[A-Za-z0-9_-]`
pub fn render_key(key: &str) -> String {
    let bare = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if bare { key.to_string() } else { quote(key) }
}

fn write_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
}

fn write_entries(out: &mut String, obj: &ConfObject, depth: usize) -> fmt::Result {
    for (i, (key, value)) in obj.entries.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        write_indent(out, depth);
        out.push_str(&render_key(key));
        match value {
            ConfValue::Object(_) => out.push(' '),
            _ => out.push_str(" = "),
        }
        write_value(out, value, depth)?;
    }
    Ok(())
}

fn write_value(out: &mut String, value: &ConfValue, depth: usize) -> fmt::Result {
    match value {
        ConfValue::String(s) => out.push_str(&quote(s)),
        ConfValue::Number(n) => write!(out, "{n}")?,
        ConfValue::Bool(b) => write!(out, "{b}")?,
        ConfValue::List(items) if items.is_empty() => out.push_str("[]"),
        ConfValue::List(items) => {
            out.push_str("[\n");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                }
                write_indent(out, depth + 1);
                write_value(out, item, depth + 1)?;
            }
            out.push('\n');
            write_indent(out, depth);
            out.push(']');
        }
        ConfValue::Object(obj) if obj.is_empty() => out.push_str("{}"),
        ConfValue::Object(obj) => {
            out.push_str("{\n");
            write_entries(out, obj, depth + 1)?;
            out.push('\n');
            write_indent(out, depth);
            out.push('}');
        }
    }
    Ok(())
}

impl fmt::Display for ConfObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_scalars_and_empty_containers() {
        let doc = ConfObject::new()
            .with("name", "world")
            .with("memory", 402_653_184u64)
            .with("nrOfCpus", ConfValue::decimal(0.1))
            .with("enabled", ConfValue::Bool(true))
            .with("roles", ConfValue::List(Vec::new()))
            .with("annotations", ConfObject::new());

        assert_eq!(
            doc.render(),
            "name = \"world\"\n\
             memory = 402653184\n\
             nrOfCpus = 0.1\n\
             enabled = true\n\
             roles = []\n\
             annotations {}"
        );
    }

    #[test]
    fn test_render_nested_blocks() {
        let doc = ConfObject::new().with(
            "components",
            ConfObject::new().with(
                "web",
                ConfObject::new()
                    .with("start-command", ConfValue::strings(["ociImageTag", "latest"]))
                    .with("endpoints", ConfObject::new()),
            ),
        );

        assert_eq!(
            doc.render(),
            "components {\n\
             \x20 web {\n\
             \x20   start-command = [\n\
             \x20     \"ociImageTag\"\n\
             \x20     \"latest\"\n\
             \x20   ]\n\
             \x20   endpoints {}\n\
             \x20 }\n\
             }"
        );
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut doc = ConfObject::new().with("a", "1").with("b", "2");
        doc.insert("a", "3");
        assert_eq!(doc.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(doc.get("a"), Some(&ConfValue::from("3")));
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("plain"), "\"plain\"");
        assert_eq!(quote("say \"hi\"\n"), "\"say \\\"hi\\\"\\n\"");
        assert_eq!(quote("back\\slash"), "\"back\\\\slash\"");
        assert_eq!(quote("\u{1}"), "\"\\u0001\"");
        assert_eq!(quote("\u{8}\u{c}"), "\"\\b\\f\"");
        assert_eq!(quote("caf\u{e9}"), "\"caf\u{e9}\"");
    }

    #[test]
    fn test_render_key_quotes_when_needed() {
        assert_eq!(render_key("my-component_1"), "my-component_1");
        assert_eq!(render_key("has space"), "\"has space\"");
        assert_eq!(render_key("org:thing"), "\"org:thing\"");
        assert_eq!(render_key(""), "\"\"");
    }
}
