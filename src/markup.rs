//! Response document generation.
//!
//! Turns an ordered, nested [`ConfigNode`] into indented XML lines:
//!
//! - scalar and deferred values become attributes of the enclosing element
//! - nested nodes become child elements named after their key
//! - lists become repeated child elements named after their key
//!
//! Key order is significant. Attributes render in the order their keys were
//! inserted, and so do child elements, but the two groups are partitioned:
//! all attributes sit on the opening tag, followed by the child elements.
//!
//! # Escaping
//!
//! Values are inserted verbatim. A value containing `<`, `&` or `"` produces
//! malformed output; callers must sanitize such values before building the
//! node.
//!
//! # Example
//!
//! ```
//! use iminstall::markup::{serialize, ConfigNode, ConfigValue};
//!
//! let node = ConfigNode::new()
//!     .with("clean", true)
//!     .with("server", ConfigNode::new().with(
//!         "repository",
//!         ConfigValue::list([ConfigNode::new().with("location", "/repo")]),
//!     ));
//!
//! let lines = serialize("", "agent-input", &node).unwrap();
//! assert_eq!(lines[0].as_str(), r#"<agent-input clean="true">"#);
//! assert_eq!(lines[2].as_str(), r#"    <repository location="/repo"/>"#);
//! ```

use std::fmt;

use thiserror::Error;
use tracing::debug;

/// Indent added per nesting level
pub const INDENT_UNIT: &str = "  ";

/// Indent of the root element in generated response files
pub const ROOT_INDENT: &str = "  ";

/// Root element of an installer response file
pub const RESPONSE_ROOT: &str = "agent-input";

/// Errors raised while building or serializing a node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    /// A value has no markup representation at this position
    #[error("Invalid node at '{path}': {reason}")]
    InvalidNode { path: String, reason: String },

    /// `try_insert` was given a key the node already holds
    #[error("Duplicate key '{key}'")]
    DuplicateKey { key: String },
}

impl MarkupError {
    fn invalid(path: &str, reason: impl Into<String>) -> Self {
        Self::InvalidNode {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Values
// ============================================================================

/// A plain value rendered as attribute or element text.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Str(s) => f.write_str(s),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(i64::from(value))
    }
}

impl From<u32> for Scalar {
    fn from(value: u32) -> Self {
        Scalar::Int(i64::from(value))
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

/// A scalar computed when the document is rendered, not when the node is
/// built.
///
/// The closure runs once per serialization, immediately before its value is
/// written.
pub struct Deferred(Box<dyn Fn() -> Scalar>);

impl Deferred {
    pub fn new<F, T>(f: F) -> Self
    where
        F: Fn() -> T + 'static,
        T: Into<Scalar>,
    {
        Self(Box::new(move || f().into()))
    }

    pub fn evaluate(&self) -> Scalar {
        (self.0)()
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Deferred(..)")
    }
}

/// Value bound to a key of a [`ConfigNode`].
#[derive(Debug)]
pub enum ConfigValue {
    Scalar(Scalar),
    Deferred(Deferred),
    Node(ConfigNode),
    List(Vec<ConfigValue>),
}

impl ConfigValue {
    /// Build a list value from anything convertible into values.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ConfigValue>,
    {
        ConfigValue::List(items.into_iter().map(Into::into).collect())
    }

    /// Wrap a closure as a deferred scalar.
    pub fn deferred<F, T>(f: F) -> Self
    where
        F: Fn() -> T + 'static,
        T: Into<Scalar>,
    {
        ConfigValue::Deferred(Deferred::new(f))
    }

    /// Whether this value renders on the opening tag.
    pub fn is_attribute(&self) -> bool {
        matches!(self, ConfigValue::Scalar(_) | ConfigValue::Deferred(_))
    }

    fn render_scalar(&self) -> Option<String> {
        match self {
            ConfigValue::Scalar(s) => Some(s.to_string()),
            ConfigValue::Deferred(d) => Some(d.evaluate().to_string()),
            ConfigValue::Node(_) | ConfigValue::List(_) => None,
        }
    }
}

macro_rules! scalar_value_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ConfigValue {
                fn from(value: $ty) -> Self {
                    ConfigValue::Scalar(value.into())
                }
            }
        )*
    };
}

scalar_value_from!(Scalar, &str, String, i64, i32, u32, f64, bool);

impl From<ConfigNode> for ConfigValue {
    fn from(node: ConfigNode) -> Self {
        ConfigValue::Node(node)
    }
}

impl From<Deferred> for ConfigValue {
    fn from(deferred: Deferred) -> Self {
        ConfigValue::Deferred(deferred)
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(items: Vec<ConfigValue>) -> Self {
        ConfigValue::List(items)
    }
}

// ============================================================================
// ConfigNode
// ============================================================================

/// Ordered mapping of unique keys to values.
#[derive(Debug, Default)]
pub struct ConfigNode {
    entries: Vec<(String, ConfigValue)>,
}

impl ConfigNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`ConfigNode::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a value, returning the previous one for this key.
    ///
    /// Replacing a key keeps its original position.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ConfigValue>,
    ) -> Option<ConfigValue> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Insert a value, failing if the key is already present.
    pub fn try_insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ConfigValue>,
    ) -> Result<(), MarkupError> {
        let key = key.into();
        if self.contains_key(&key) {
            return Err(MarkupError::DuplicateKey { key });
        }
        self.entries.push((key, value.into()));
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl TryFrom<&serde_json::Value> for ConfigNode {
    type Error = MarkupError;

    /// Convert a JSON object, keeping its key order.
    ///
    /// Strings, numbers and booleans become scalars, objects become nested
    /// nodes and arrays become lists. `null` has no markup form.
    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Object(map) => node_from_json("", map),
            _ => Err(MarkupError::invalid("", "response description must be a JSON object")),
        }
    }
}

fn node_from_json(
    path: &str,
    map: &serde_json::Map<String, serde_json::Value>,
) -> Result<ConfigNode, MarkupError> {
    let mut node = ConfigNode::new();
    for (key, value) in map {
        let child_path = join_path(path, key);
        node.try_insert(key.clone(), value_from_json(&child_path, value)?)?;
    }
    Ok(node)
}

fn value_from_json(path: &str, value: &serde_json::Value) -> Result<ConfigValue, MarkupError> {
    use serde_json::Value;

    Ok(match value {
        Value::Null => return Err(MarkupError::invalid(path, "null has no markup representation")),
        Value::Bool(b) => ConfigValue::from(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => ConfigValue::from(i),
            // u64 beyond i64 range or a float
            None => match n.as_f64() {
                Some(x) if n.is_f64() => ConfigValue::from(x),
                _ => ConfigValue::from(n.to_string()),
            },
        },
        Value::String(s) => ConfigValue::from(s.as_str()),
        Value::Object(map) => ConfigValue::Node(node_from_json(path, map)?),
        Value::Array(items) => ConfigValue::List(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| value_from_json(&format!("{}[{}]", path, i), item))
                .collect::<Result<_, _>>()?,
        ),
    })
}

// ============================================================================
// Serialization
// ============================================================================

/// A single indented line of generated markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupLine(String);

impl MarkupLine {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for MarkupLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serialize `node` as element `name`, each line prefixed by `indent`.
///
/// The whole tree is validated before the first line is produced, so an
/// error never comes with partial output. Deferred values are evaluated
/// exactly once, during rendering.
pub fn serialize(
    indent: &str,
    name: &str,
    node: &ConfigNode,
) -> Result<Vec<MarkupLine>, MarkupError> {
    validate_node(name, name, node)?;

    let mut out = Vec::new();
    emit_node(indent, name, node, &mut out);
    debug!("Serialized <{}> into {} line(s)", name, out.len());
    Ok(out)
}

/// Render a complete document rooted at `root`, newline-terminated.
pub fn render_document(root: &str, node: &ConfigNode) -> Result<String, MarkupError> {
    let lines = serialize(ROOT_INDENT, root, node)?;
    let mut doc = String::new();
    for line in &lines {
        doc.push_str(line.as_str());
        doc.push('\n');
    }
    Ok(doc)
}

fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

fn validate_name(path: &str, name: &str) -> Result<(), MarkupError> {
    if name.is_empty() {
        return Err(MarkupError::invalid(path, "empty element or attribute name"));
    }
    if name
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '<' | '>' | '"' | '/' | '=' | '&'))
    {
        return Err(MarkupError::invalid(
            path,
            format!("'{}' is not a valid markup name", name),
        ));
    }
    Ok(())
}

fn validate_node(path: &str, name: &str, node: &ConfigNode) -> Result<(), MarkupError> {
    validate_name(path, name)?;
    for (key, value) in node.iter() {
        let child_path = join_path(path, key);
        validate_name(&child_path, key)?;
        match value {
            ConfigValue::Scalar(_) | ConfigValue::Deferred(_) => {}
            ConfigValue::Node(child) => validate_node(&child_path, key, child)?,
            ConfigValue::List(items) => validate_list(&child_path, key, items)?,
        }
    }
    Ok(())
}

/// Lists are either all nodes or all scalars, decided by the first item.
fn validate_list(path: &str, key: &str, items: &[ConfigValue]) -> Result<(), MarkupError> {
    let Some(first) = items.first() else {
        return Ok(());
    };
    let of_nodes = matches!(first, ConfigValue::Node(_));

    for (i, item) in items.iter().enumerate() {
        let item_path = format!("{}[{}]", path, i);
        match item {
            ConfigValue::List(_) => {
                return Err(MarkupError::invalid(&item_path, "lists cannot be nested directly"));
            }
            ConfigValue::Node(child) if of_nodes => validate_node(&item_path, key, child)?,
            ConfigValue::Scalar(_) | ConfigValue::Deferred(_) if !of_nodes => {}
            _ => {
                return Err(MarkupError::invalid(
                    &item_path,
                    "list mixes nested nodes and scalar values",
                ));
            }
        }
    }
    Ok(())
}

fn emit_node(indent: &str, name: &str, node: &ConfigNode, out: &mut Vec<MarkupLine>) {
    let mut line = format!("{}<{}", indent, name);
    let mut elements = Vec::new();

    for (key, value) in node.iter() {
        match value.render_scalar() {
            Some(rendered) => {
                line.push_str(&format!(" {}=\"{}\"", key, rendered));
            }
            None => elements.push((key, value)),
        }
    }

    if elements.is_empty() {
        line.push_str("/>");
        out.push(MarkupLine(line));
        return;
    }

    line.push('>');
    out.push(MarkupLine(line));

    let next_indent = format!("{}{}", INDENT_UNIT, indent);
    for (key, value) in elements {
        match value {
            ConfigValue::Node(child) => emit_node(&next_indent, key, child, out),
            ConfigValue::List(items) if items.is_empty() => {
                out.push(MarkupLine(format!("{}<{}/>", next_indent, key)));
            }
            ConfigValue::List(items) => {
                for item in items {
                    match item {
                        ConfigValue::Node(child) => emit_node(&next_indent, key, child, out),
                        scalar => {
                            // validated: the remaining items are scalars
                            let text = scalar.render_scalar().unwrap_or_default();
                            out.push(MarkupLine(format!(
                                "{}<{}>{}</{}>",
                                next_indent, key, text, key
                            )));
                        }
                    }
                }
            }
            ConfigValue::Scalar(_) | ConfigValue::Deferred(_) => {}
        }
    }

    out.push(MarkupLine(format!("{}</{}>", indent, name)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn lines(indent: &str, name: &str, node: &ConfigNode) -> Vec<String> {
        serialize(indent, name, node)
            .unwrap()
            .into_iter()
            .map(MarkupLine::into_string)
            .collect()
    }

    #[test]
    fn test_empty_node_self_terminates() {
        assert_eq!(lines("", "profile", &ConfigNode::new()), vec!["<profile/>"]);
    }

    #[test]
    fn test_attributes_only_is_single_line() {
        let node = ConfigNode::new()
            .with("id", "IBM WebSphere")
            .with("installLocation", "/opt/IBM/WAS")
            .with("clean", true);
        assert_eq!(
            lines("  ", "profile", &node),
            vec![r#"  <profile id="IBM WebSphere" installLocation="/opt/IBM/WAS" clean="true"/>"#]
        );
    }

    #[test]
    fn test_attributes_precede_elements_regardless_of_position() {
        let node = ConfigNode::new()
            .with("server", ConfigNode::new())
            .with("clean", true)
            .with("install", ConfigNode::new().with("modify", false))
            .with("temporary", false);

        assert_eq!(
            lines("", "agent-input", &node),
            vec![
                r#"<agent-input clean="true" temporary="false">"#,
                "  <server/>",
                r#"  <install modify="false"/>"#,
                "</agent-input>",
            ]
        );
    }

    #[test]
    fn test_empty_list_renders_single_marker() {
        let node = ConfigNode::new().with("offering", ConfigValue::List(vec![]));
        assert_eq!(
            lines("", "install", &node),
            vec!["<install>", "  <offering/>", "</install>"]
        );
    }

    #[test]
    fn test_list_of_nodes_repeats_element() {
        let node = ConfigNode::new().with(
            "repository",
            ConfigValue::list([
                ConfigNode::new().with("location", "/mnt/repo1"),
                ConfigNode::new().with("location", "/mnt/repo2"),
            ]),
        );
        assert_eq!(
            lines("", "server", &node),
            vec![
                "<server>",
                r#"  <repository location="/mnt/repo1"/>"#,
                r#"  <repository location="/mnt/repo2"/>"#,
                "</server>",
            ]
        );
    }

    #[test]
    fn test_list_of_scalars_renders_text_elements() {
        let node = ConfigNode::new().with("feature", ConfigValue::list(["core", "ejb"]));
        assert_eq!(
            lines("", "offering", &node),
            vec![
                "<offering>",
                "  <feature>core</feature>",
                "  <feature>ejb</feature>",
                "</offering>",
            ]
        );
    }

    #[test]
    fn test_indent_grows_two_spaces_per_level() {
        let node = ConfigNode::new().with(
            "a",
            ConfigNode::new().with("b", ConfigNode::new().with("c", ConfigNode::new())),
        );
        assert_eq!(
            lines("  ", "root", &node),
            vec![
                "  <root>",
                "    <a>",
                "      <b>",
                "        <c/>",
                "      </b>",
                "    </a>",
                "  </root>",
            ]
        );
    }

    #[test]
    fn test_deferred_value_runs_once_at_render_time() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let node = ConfigNode::new().with(
            "installLocation",
            ConfigValue::deferred(move || {
                counter.set(counter.get() + 1);
                "/opt/IBM/WebSphere"
            }),
        );

        assert_eq!(calls.get(), 0, "building the node must not evaluate it");
        let out = lines("", "profile", &node);
        assert_eq!(calls.get(), 1);
        assert_eq!(out, vec![r#"<profile installLocation="/opt/IBM/WebSphere"/>"#]);
    }

    #[test]
    fn test_deferred_scalar_in_list() {
        let node = ConfigNode::new().with(
            "feature",
            ConfigValue::List(vec![
                ConfigValue::from("core"),
                ConfigValue::deferred(|| "thinclient"),
            ]),
        );
        assert_eq!(lines("", "offering", &node)[2], "  <feature>thinclient</feature>");
    }

    #[test]
    fn test_mixed_list_rejected_without_evaluating() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let node = ConfigNode::new()
            .with(
                "id",
                ConfigValue::deferred(move || {
                    counter.set(counter.get() + 1);
                    1
                }),
            )
            .with(
                "repository",
                ConfigValue::List(vec![ConfigValue::Node(ConfigNode::new()), ConfigValue::from("x")]),
            );

        let err = serialize("", "server", &node).unwrap_err();
        assert!(matches!(err, MarkupError::InvalidNode { ref path, .. } if path == "server.repository[1]"));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_nested_list_rejected() {
        let node = ConfigNode::new().with(
            "matrix",
            ConfigValue::List(vec![ConfigValue::list([1, 2])]),
        );
        assert!(serialize("", "root", &node).is_err());
    }

    #[test]
    fn test_invalid_names_rejected() {
        let node = ConfigNode::new().with("bad key", 1);
        assert!(serialize("", "root", &node).is_err());
        assert!(serialize("", "", &ConfigNode::new()).is_err());
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut node = ConfigNode::new().with("a", 1).with("b", 2);
        let old = node.insert("a", 3);
        assert!(matches!(old, Some(ConfigValue::Scalar(Scalar::Int(1)))));
        assert_eq!(node.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(lines("", "n", &node), vec![r#"<n a="3" b="2"/>"#]);
    }

    #[test]
    fn test_try_insert_rejects_duplicates() {
        let mut node = ConfigNode::new();
        node.try_insert("id", "x").unwrap();
        assert_eq!(
            node.try_insert("id", "y"),
            Err(MarkupError::DuplicateKey { key: "id".to_string() })
        );
    }

    #[test]
    fn test_json_conversion_keeps_order() {
        let json: serde_json::Value = serde_json::from_str(
            r#"{"zeta": 1, "alpha": "two", "nested": {"b": true, "a": 1.5}, "empty": []}"#,
        )
        .unwrap();
        let node = ConfigNode::try_from(&json).unwrap();
        assert_eq!(node.keys().collect::<Vec<_>>(), vec!["zeta", "alpha", "nested", "empty"]);
        assert_eq!(
            lines("", "root", &node),
            vec![
                r#"<root zeta="1" alpha="two">"#,
                r#"  <nested b="true" a="1.5"/>"#,
                "  <empty/>",
                "</root>",
            ]
        );
    }

    #[test]
    fn test_json_null_is_invalid() {
        let json: serde_json::Value = serde_json::from_str(r#"{"a": {"b": null}}"#).unwrap();
        let err = ConfigNode::try_from(&json).unwrap_err();
        assert!(matches!(err, MarkupError::InvalidNode { ref path, .. } if path == "a.b"));
    }

    #[test]
    fn test_json_top_level_must_be_object() {
        let json = serde_json::json!([1, 2]);
        assert!(ConfigNode::try_from(&json).is_err());
    }

    #[test]
    fn test_render_document_uses_real_newlines() {
        let node = ConfigNode::new().with("server", ConfigNode::new());
        let doc = render_document(RESPONSE_ROOT, &node).unwrap();
        assert_eq!(doc, "  <agent-input>\n    <server/>\n  </agent-input>\n");
        assert!(!doc.contains("\\n"));
    }
}
