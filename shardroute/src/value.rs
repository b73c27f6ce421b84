//! Scalar values flowing through routing and rewriting.

use std::cmp::Ordering;
use std::fmt::Display;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use shardroute_config::FlexibleType;
use uuid::Uuid;

/// Literal or parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Scalar {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    Text(String),
    Uuid(Uuid),
}

impl Scalar {
    /// Integer value, if this value is (or parses as) one.
    pub fn integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Decimal(value) if value.fract().is_zero() => value.to_i64(),
            Self::Text(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text value.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Uuid value, if this value is (or parses as) one.
    pub fn uuid(&self) -> Option<Uuid> {
        match self {
            Self::Uuid(value) => Some(*value),
            Self::Text(value) => value.parse().ok(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Bytes hashed by hash-based sharding.
    pub fn hash_bytes(&self) -> Vec<u8> {
        match self {
            Self::Text(value) => value.as_bytes().to_vec(),
            Self::Uuid(value) => value.as_bytes().to_vec(),
            other => other.to_string().into_bytes(),
        }
    }

    /// Compare two values of compatible types.
    ///
    /// Integers and decimals compare numerically. Values of unrelated
    /// types aren't comparable.
    pub fn compare(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Integer(a), Self::Decimal(b)) => Some(Decimal::from(*a).cmp(b)),
            (Self::Decimal(a), Self::Integer(b)) => Some(a.cmp(&Decimal::from(*b))),
            (Self::Decimal(a), Self::Decimal(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Uuid(a), Self::Uuid(b)) => Some(a.cmp(b)),
            (Self::Boolean(a), Self::Boolean(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Render as an SQL literal.
    pub fn to_sql(&self) -> String {
        match self {
            Self::Null => "NULL".into(),
            Self::Boolean(true) => "TRUE".into(),
            Self::Boolean(false) => "FALSE".into(),
            Self::Integer(value) => value.to_string(),
            Self::Decimal(value) => value.to_string(),
            Self::Text(value) => format!("'{}'", value.replace('\'', "''")),
            Self::Uuid(value) => format!("'{}'", value),
        }
    }

    /// Matches a value from the sharding configuration.
    pub(crate) fn matches(&self, value: &FlexibleType) -> bool {
        match value {
            FlexibleType::Integer(expected) => self.integer() == Some(*expected),
            FlexibleType::Uuid(expected) => self.uuid() == Some(*expected),
            FlexibleType::String(expected) => match self {
                Self::Text(text) => text == expected,
                other => other.to_string() == *expected,
            },
        }
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(value) => write!(f, "{}", value),
            Self::Integer(value) => write!(f, "{}", value),
            Self::Decimal(value) => write!(f, "{}", value),
            Self::Text(value) => write!(f, "{}", value),
            Self::Uuid(value) => write!(f, "{}", value),
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Decimal> for Scalar {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<Uuid> for Scalar {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}
