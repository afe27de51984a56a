//! Data rows handed to the merge driver.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

/// A value substituted into a merge field.
///
/// `Rows` does not render as text: passed to [`Document::merge`] or
/// [`Document::merge_templates`] it repeats the table row anchored on that
/// field name once per entry.
///
/// [`Document::merge`]: crate::Document::merge
/// [`Document::merge_templates`]: crate::Document::merge_templates
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    Rows(Vec<Row>),
}

impl Value {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether `\b` and `\f` decorations apply: `Null`, `false`, zero,
    /// empty text and an empty row list are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Rows(rows) => !rows.is_empty(),
            Value::Date(_) | Value::DateTime(_) | Value::Time(_) => true,
        }
    }

    /// Numeric view used by number pictures. `Null` counts as zero; text is
    /// parsed after trimming.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Null => Some(0.0),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Some(0.0)
                } else {
                    fast_float2::parse(trimmed).ok()
                }
            },
            _ => None,
        }
    }

    /// Date and time components, when the value carries any.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Date(d) => d.and_hms_opt(0, 0, 0),
            Value::DateTime(dt) => Some(*dt),
            Value::Time(t) => NaiveDate::from_ymd_opt(1900, 1, 1).map(|d| d.and_time(*t)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    /// Text shown when no picture switch applies.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null | Value::Rows(_) => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => f.write_str(itoa::Buffer::new().format(*i)),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%x")),
            Value::DateTime(dt) => write!(f, "{}", dt.format("%x %X")),
            Value::Time(t) => write!(f, "{}", t.format("%X")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl From<NaiveTime> for Value {
    fn from(t: NaiveTime) -> Self {
        Value::Time(t)
    }
}

impl From<Vec<Row>> for Value {
    fn from(rows: Vec<Row>) -> Self {
        Value::Rows(rows)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// One record: field names mapped to values, in insertion order.
///
/// # Examples
///
/// ```
/// use docx_mailmerge::{Row, Value};
///
/// let row = Row::new().with("name", "Ada").with("age", 36);
/// assert_eq!(row.get("age"), Some(&Value::Int(36)));
/// assert!(row.get("missing").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    entries: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Row::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a field, replacing an earlier value under the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    #[inline]
    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (name, value) in iter {
            row.insert(name, value);
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_order_and_replace() {
        let mut row: Row = [("b", 1), ("a", 2)].into_iter().collect();
        row.insert("b", 3);
        let names: Vec<_> = row.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(row.get("b"), Some(&Value::Int(3)));
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Int(-42).to_string(), "-42");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        let date = NaiveDate::from_ymd_opt(2018, 7, 1).unwrap();
        assert_eq!(Value::Date(date).to_string(), "07/01/18");
        let dt = date.and_hms_opt(13, 5, 9).unwrap();
        assert_eq!(Value::DateTime(dt).to_string(), "07/01/18 13:05:09");
        assert_eq!(Value::from(None::<&str>), Value::Null);
    }

    #[test]
    fn test_as_number() {
        assert_eq!(Value::Null.as_number(), Some(0.0));
        assert_eq!(Value::from(" 12.5 ").as_number(), Some(12.5));
        assert_eq!(Value::from("abc").as_number(), None);
        assert_eq!(Value::Rows(Vec::new()).as_number(), None);
    }
}
