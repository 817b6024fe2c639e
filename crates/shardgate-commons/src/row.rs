//! Named-field rows and equality clauses.

use crate::value::Value;
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

/// Backend-only column holding the owning bucket id.
pub const BUCKET_ID: &str = "bucket_id";

/// Primary identifier column present on every entity.
pub const ID: &str = "id";

/// A row of named values.
///
/// Rows double as query clauses: a clause matches a row when every one of its
/// key/value pairs is present and equal in the row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row(BTreeMap<String, Value>);

/// A conjunction of equality tests.
pub type Clause = Row;

impl Row {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy every pair of `other` into this row, overwriting existing keys.
    pub fn merge(&mut self, other: &Row) {
        for (key, value) in other.iter() {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// The row's `id`, if it holds a non-negative integer.
    pub fn id(&self) -> Option<u64> {
        self.get(ID)
            .and_then(Value::as_i64)
            .and_then(|id| u64::try_from(id).ok())
    }

    /// Copy of this row with `bucket_id` set, overriding any caller value.
    pub fn scoped(&self, bucket_id: u64) -> Row {
        let mut row = self.clone();
        row.insert(BUCKET_ID, bucket_id);
        row
    }

    /// Does `row` satisfy every pair of this clause?
    pub fn matches(&self, row: &Row) -> bool {
        self.iter().all(|(key, value)| row.get(key) == Some(value))
    }

    /// Does `row` satisfy at least one of `clauses`?
    ///
    /// An empty clause list matches nothing; an empty clause matches everything.
    pub fn matches_any(clauses: &[Clause], row: &Row) -> bool {
        clauses.iter().any(|clause| clause.matches(row))
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", key, value)?;
        }
        write!(f, "}}")
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = (&'a String, &'a Value);
    type IntoIter = btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Build a [`Row`] from `key => value` pairs.
///
/// ```rust,ignore
/// let clause = row! { "type" => "tester", "owner_id" => 0 };
/// ```
#[macro_export]
macro_rules! row {
    () => { $crate::Row::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut row = $crate::Row::new();
        $( row.insert($key, $value); )+
        row
    }};
}
