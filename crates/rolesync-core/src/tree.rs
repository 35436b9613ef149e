//! State trees - nested string-keyed mappings with a recursive merge
//!
//! A [`StateTree`] maps keys to [`Value`]s, and every value is either a
//! [`Scalar`] leaf or another nested tree. Trees are both the unit of storage
//! (one per role partition) and the unit of update: a delta is just a tree
//! holding the fields that changed, folded into the stored tree with
//! [`StateTree::merge`].
//!
//! Merge rules, for each key of the incoming tree:
//!  - scalar in the incoming tree: overwrite whatever is stored
//!  - tree in the incoming tree, nothing stored: insert it as-is
//!  - tree in the incoming tree, scalar stored: the tree replaces the scalar
//!  - tree in both: recurse
//!
//! Merging is total and touches each incoming key exactly once.

use crate::error::{EncodeError, Result};
use serde::ser::{Error as _, SerializeMap};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

/// A leaf value. Opaque to the merge: a scalar always replaces what it lands on.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Scalar {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    /// Must be finite to be encoded.
    Float(f64),
    String(String),
    /// JSON array carried verbatim; arrays are replaced wholesale, never merged.
    Array(Vec<serde_json::Value>),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Scalar::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Scalar::Float(f) => Some(*f),
            Scalar::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this scalar has a JSON representation.
    pub fn is_representable(&self) -> bool {
        match self {
            Scalar::Float(f) => f.is_finite(),
            _ => true,
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Int(i) => serializer.serialize_i64(*i),
            Scalar::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Scalar::Float(f) => Err(S::Error::custom(format!("non-finite float {}", f))),
            Scalar::String(s) => serializer.serialize_str(s),
            Scalar::Array(items) => items.serialize(serializer),
        }
    }
}

/// A slot in a state tree: exactly a leaf or a nested tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Nested(StateTree),
}

impl Value {
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            Value::Nested(_) => None,
        }
    }

    pub fn as_tree(&self) -> Option<&StateTree> {
        match self {
            Value::Nested(t) => Some(t),
            Value::Scalar(_) => None,
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, Value::Nested(_))
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Scalar(s) => s.serialize(serializer),
            Value::Nested(t) => t.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Scalar(Scalar::Null),
            serde_json::Value::Bool(b) => Value::Scalar(Scalar::Bool(b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Scalar(Scalar::Int(i)),
                // u64 beyond i64::MAX and real numbers both land here
                None => Value::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN))),
            },
            serde_json::Value::String(s) => Value::Scalar(Scalar::String(s)),
            serde_json::Value::Array(items) => Value::Scalar(Scalar::Array(items)),
            serde_json::Value::Object(map) => Value::Nested(StateTree::from(map)),
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

impl From<StateTree> for Value {
    fn from(t: StateTree) -> Self {
        Value::Nested(t)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Scalar(Scalar::Bool(b))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Scalar(Scalar::Int(i))
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Scalar(Scalar::Int(i64::from(i)))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Scalar(Scalar::Float(f))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(Scalar::String(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar(Scalar::String(s))
    }
}

/// A string-keyed tree of values. Key order carries no meaning; entries are
/// kept sorted so encoding is stable.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct StateTree {
    entries: BTreeMap<String, Value>,
}

impl StateTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Follow a dotted path (`"a.b.c"`) through nested trees.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.entries.get(segments.next()?)?;
        for segment in segments {
            current = current.as_tree()?.entries.get(segment)?;
        }
        Some(current)
    }

    /// Set `key` directly, replacing any previous value. Returns the old value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Fold `src` into this tree, consuming it.
    pub fn merge(&mut self, src: StateTree) {
        for (key, incoming) in src.entries {
            match incoming {
                Value::Nested(subtree) => match self.entries.get_mut(&key) {
                    Some(Value::Nested(existing)) => existing.merge(subtree),
                    _ => {
                        self.entries.insert(key, Value::Nested(subtree));
                    }
                },
                scalar => {
                    self.entries.insert(key, scalar);
                }
            }
        }
    }

    /// Fold a borrowed `src` into this tree, cloning only what gets stored.
    pub fn merge_ref(&mut self, src: &StateTree) {
        for (key, incoming) in &src.entries {
            match incoming {
                Value::Nested(subtree) => match self.entries.get_mut(key) {
                    Some(Value::Nested(existing)) => existing.merge_ref(subtree),
                    _ => {
                        self.entries.insert(key.clone(), Value::Nested(subtree.clone()));
                    }
                },
                scalar => {
                    self.entries.insert(key.clone(), scalar.clone());
                }
            }
        }
    }

    /// Dotted path of the first scalar that cannot be encoded, if any.
    pub fn find_non_representable(&self) -> Option<String> {
        for (key, value) in &self.entries {
            match value {
                Value::Scalar(s) if !s.is_representable() => return Some(key.clone()),
                Value::Scalar(_) => {}
                Value::Nested(t) => {
                    if let Some(rest) = t.find_non_representable() {
                        return Some(format!("{}.{}", key, rest));
                    }
                }
            }
        }
        None
    }

    /// Encode as a JSON object string.
    pub fn to_json(&self) -> Result<String> {
        if let Some(path) = self.find_non_representable() {
            return Err(EncodeError::NonRepresentable(path));
        }
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a JSON object string. Anything but an object is rejected.
    pub fn from_json(data: &str) -> Result<Self> {
        match serde_json::from_str::<serde_json::Value>(data)? {
            serde_json::Value::Object(map) => Ok(StateTree::from(map)),
            other => Err(EncodeError::SerializationError(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

impl Serialize for StateTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for StateTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        BTreeMap::<String, Value>::deserialize(deserializer).map(|entries| StateTree { entries })
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for StateTree {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        map.into_iter()
            .map(|(k, v)| (k, Value::from(v)))
            .collect()
    }
}

impl TryFrom<serde_json::Value> for StateTree {
    type Error = EncodeError;

    fn try_from(json: serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::Object(map) => Ok(StateTree::from(map)),
            other => Err(EncodeError::SerializationError(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for StateTree {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl IntoIterator for StateTree {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a StateTree {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl fmt::Display for StateTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => f.write_str(&s),
            Err(_) => write!(f, "{:?}", self.entries),
        }
    }
}

/// Build a [`StateTree`] from `key => value` pairs.
///
/// ```rust
/// use rolesync_core::tree;
///
/// let t = tree! { "user" => tree! { "name" => "ada", "age" => 36 } };
/// assert_eq!(t.to_json().unwrap(), r#"{"user":{"age":36,"name":"ada"}}"#);
/// ```
#[macro_export]
macro_rules! tree {
    () => {
        $crate::StateTree::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut tree = $crate::StateTree::new();
        $( tree.insert($key, $value); )+
        tree
    }};
}
