use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// An indexable value stored in catalog records.
///
/// The ordering is total so values can key the per-index B-trees backing
/// range queries: `Null` sorts first, then booleans, numbers (integers and
/// floats compare numerically), text, timestamps and keyword sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Keywords(Vec<String>),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Build a keyword set: sorted, deduplicated, empties dropped.
    pub fn keywords<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut terms: Vec<String> = terms
            .into_iter()
            .map(Into::into)
            .filter(|t| !t.is_empty())
            .collect();
        terms.sort();
        terms.dedup();
        Self::Keywords(terms)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Integer(_) => "INTEGER",
            Self::Float(_) => "FLOAT",
            Self::Text(_) => "TEXT",
            Self::Boolean(_) => "BOOLEAN",
            Self::Timestamp(_) => "TIMESTAMP",
            Self::Keywords(_) => "KEYWORDS",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_keywords(&self) -> Option<&[String]> {
        match self {
            Self::Keywords(terms) => Some(terms),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Boolean(_) => 1,
            Self::Integer(_) | Self::Float(_) => 2,
            Self::Text(_) => 3,
            Self::Timestamp(_) => 4,
            Self::Keywords(_) => 5,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            // Integer and Float conflate numerically so an index keyed by
            // 2 answers queries for 2.0 and vice versa.
            (Self::Integer(a), Self::Float(b)) => (*a as f64).total_cmp(b),
            (Self::Float(a), Self::Integer(b)) => a.total_cmp(&(*b as f64)),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Timestamp(a), Self::Timestamp(b)) => a.cmp(b),
            (Self::Keywords(a), Self::Keywords(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(s) => write!(f, "{}", s),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Self::Keywords(terms) => write!(f, "{}", terms.join(" ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_values_conflate_across_repr() {
        assert_eq!(Value::Integer(2), Value::Float(2.0));
        assert!(Value::Integer(2) < Value::Float(2.5));
        assert!(Value::Float(2.5) < Value::Integer(3));
    }

    #[test]
    fn null_sorts_first() {
        let mut values = vec![Value::text("a"), Value::Integer(1), Value::Null];
        values.sort();
        assert!(values[0].is_null());
    }

    #[test]
    fn keywords_sorted_and_deduped() {
        let value = Value::keywords(["beta", "alpha", "beta", ""]);
        assert_eq!(value.as_keywords().unwrap(), &["alpha", "beta"]);
    }

    #[test]
    fn cross_type_order_is_stable() {
        let mut values = vec![
            Value::keywords(["x"]),
            Value::Boolean(true),
            Value::Integer(7),
            Value::text("m"),
        ];
        values.sort();
        assert_eq!(values[0], Value::Boolean(true));
        assert_eq!(values[3], Value::keywords(["x"]));
    }
}
