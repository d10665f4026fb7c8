use crate::core::math::geometry::Vector3;
use std::collections::BTreeMap;
use std::fmt;

/// A dynamically typed attribute value attached to a particle, a snapshot or
/// a whole trajectory.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Vector(Vector3),
    Strings(Vec<String>),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Boolean(v) => write!(f, "{}", v),
            AttributeValue::Integer(v) => write!(f, "{}", v),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::String(v) => write!(f, "{}", v),
            AttributeValue::Vector(v) => write!(f, "({}, {}, {})", v.x, v.y, v.z),
            AttributeValue::Strings(v) => write!(f, "{}", v.join("\n")),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Boolean(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Integer(v)
    }
}

impl From<i32> for AttributeValue {
    fn from(v: i32) -> Self {
        AttributeValue::Integer(v.into())
    }
}

impl From<usize> for AttributeValue {
    fn from(v: usize) -> Self {
        AttributeValue::Integer(v as i64)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<f32> for AttributeValue {
    fn from(v: f32) -> Self {
        AttributeValue::Float(v.into())
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::String(v)
    }
}

impl From<Vector3> for AttributeValue {
    fn from(v: Vector3) -> Self {
        AttributeValue::Vector(v)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(v: Vec<String>) -> Self {
        AttributeValue::Strings(v)
    }
}

/// An ordered map of named attributes with "try" accessors: a missing key or a
/// value of another type yields `None`, never an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeMap {
    entries: BTreeMap<String, AttributeValue>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        key: &str,
        value: impl Into<AttributeValue>,
    ) -> Option<AttributeValue> {
        self.entries.insert(key.to_string(), value.into())
    }

    pub fn with(mut self, key: &str, value: impl Into<AttributeValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<AttributeValue> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn try_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            AttributeValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn try_integer(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            AttributeValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Floats, or integers widened to `f64`.
    pub fn try_float(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            AttributeValue::Float(v) => Some(*v),
            AttributeValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn try_string(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            AttributeValue::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn try_vector(&self, key: &str) -> Option<Vector3> {
        match self.get(key)? {
            AttributeValue::Vector(v) => Some(*v),
            _ => None,
        }
    }

    /// A list of strings; a single string value is returned as a one-element list.
    pub fn try_strings(&self, key: &str) -> Option<Vec<String>> {
        match self.get(key)? {
            AttributeValue::Strings(v) => Some(v.clone()),
            AttributeValue::String(v) => Some(vec![v.clone()]),
            _ => None,
        }
    }

    /// Copies every entry of `other` whose key is not present in `self`.
    pub fn merge_missing_from(&mut self, other: &AttributeMap) {
        for (key, value) in &other.entries {
            self.entries
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

impl FromIterator<(String, AttributeValue)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_accessors_return_none_for_missing_keys() {
        let map = AttributeMap::new();
        assert!(map.try_integer("nset").is_none());
        assert!(map.try_string("name").is_none());
        assert!(map.try_vector("velocity").is_none());
    }

    #[test]
    fn try_accessors_return_none_for_mismatched_types() {
        let map = AttributeMap::new().with("name", "CA");
        assert!(map.try_integer("name").is_none());
        assert_eq!(map.try_string("name"), Some("CA"));
    }

    #[test]
    fn try_float_widens_integers() {
        let map = AttributeMap::new().with("step", 42i64).with("time", 0.5);
        assert_eq!(map.try_float("step"), Some(42.0));
        assert_eq!(map.try_float("time"), Some(0.5));
    }

    #[test]
    fn try_strings_accepts_single_string() {
        let map = AttributeMap::new()
            .with("comment", "one line")
            .with("lines", vec!["a".to_string(), "b".to_string()]);
        assert_eq!(map.try_strings("comment"), Some(vec!["one line".to_string()]));
        assert_eq!(map.try_strings("lines").unwrap().len(), 2);
    }

    #[test]
    fn merge_missing_keeps_existing_values() {
        let mut map = AttributeMap::new().with("name", "CA");
        let other = AttributeMap::new().with("name", "CB").with("chain_id", "A");
        map.merge_missing_from(&other);
        assert_eq!(map.try_string("name"), Some("CA"));
        assert_eq!(map.try_string("chain_id"), Some("A"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn insert_returns_previous_value() {
        let mut map = AttributeMap::new();
        assert!(map.insert("nset", 3usize).is_none());
        assert_eq!(map.insert("nset", 4usize), Some(AttributeValue::Integer(3)));
        assert_eq!(map.remove("nset"), Some(AttributeValue::Integer(4)));
        assert!(map.is_empty());
    }
}
