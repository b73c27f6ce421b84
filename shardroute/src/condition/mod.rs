//! Sharding conditions.
//!
//! Values of sharding columns extracted from `WHERE` predicates or
//! `INSERT` rows, consumed by the routing strategies.

pub mod extract;

use std::cmp::Ordering;
use std::fmt::Display;
use std::ops::Bound;

use crate::value::Scalar;

pub use extract::extract;

/// Inclusive/exclusive range of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRange {
    pub lower: Bound<Scalar>,
    pub upper: Bound<Scalar>,
}

impl RouteRange {
    pub fn new(lower: Bound<Scalar>, upper: Bound<Scalar>) -> Self {
        Self { lower, upper }
    }

    /// Value falls inside the range.
    ///
    /// Values that can't be compared with the bounds are kept.
    pub fn contains(&self, value: &Scalar) -> bool {
        let lower = match &self.lower {
            Bound::Unbounded => true,
            Bound::Included(bound) => value.compare(bound).is_none_or(|o| o != Ordering::Less),
            Bound::Excluded(bound) => value
                .compare(bound)
                .is_none_or(|o| o == Ordering::Greater),
        };
        let upper = match &self.upper {
            Bound::Unbounded => true,
            Bound::Included(bound) => value
                .compare(bound)
                .is_none_or(|o| o != Ordering::Greater),
            Bound::Excluded(bound) => value.compare(bound).is_none_or(|o| o == Ordering::Less),
        };
        lower && upper
    }

    /// Narrowest range covered by both ranges, if any.
    pub fn intersect(&self, other: &RouteRange) -> Option<RouteRange> {
        let lower = tighter(&self.lower, &other.lower, Ordering::Greater);
        let upper = tighter(&self.upper, &other.upper, Ordering::Less);
        let range = RouteRange::new(lower, upper);

        if range.is_empty() {
            None
        } else {
            Some(range)
        }
    }

    fn is_empty(&self) -> bool {
        let (lower, lower_inclusive) = match &self.lower {
            Bound::Unbounded => return false,
            Bound::Included(value) => (value, true),
            Bound::Excluded(value) => (value, false),
        };
        let (upper, upper_inclusive) = match &self.upper {
            Bound::Unbounded => return false,
            Bound::Included(value) => (value, true),
            Bound::Excluded(value) => (value, false),
        };

        match lower.compare(upper) {
            Some(Ordering::Greater) => true,
            Some(Ordering::Equal) => !(lower_inclusive && upper_inclusive),
            _ => false,
        }
    }
}

// Pick the bound that narrows the range. `prefer` is the ordering
// a stricter bound has relative to the other one.
fn tighter(a: &Bound<Scalar>, b: &Bound<Scalar>, prefer: Ordering) -> Bound<Scalar> {
    match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => other.clone(),
        (Bound::Included(x) | Bound::Excluded(x), Bound::Included(y) | Bound::Excluded(y)) => {
            match x.compare(y) {
                Some(ordering) if ordering == prefer => a.clone(),
                Some(Ordering::Equal) => {
                    if matches!(a, Bound::Excluded(_)) {
                        a.clone()
                    } else {
                        b.clone()
                    }
                }
                Some(_) => b.clone(),
                None => a.clone(),
            }
        }
    }
}

/// Values a sharding column is restricted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteValues {
    List(Vec<Scalar>),
    Range(RouteRange),
}

impl RouteValues {
    /// Values satisfying both restrictions. `None` if no value can.
    pub fn intersect(&self, other: &RouteValues) -> Option<RouteValues> {
        let result = match (self, other) {
            (Self::List(a), Self::List(b)) => Self::List(
                a.iter()
                    .filter(|value| b.contains(value))
                    .cloned()
                    .collect(),
            ),
            (Self::Range(a), Self::Range(b)) => return a.intersect(b).map(Self::Range),
            (Self::List(list), Self::Range(range)) | (Self::Range(range), Self::List(list)) => {
                Self::List(
                    list.iter()
                        .filter(|value| range.contains(value))
                        .cloned()
                        .collect(),
                )
            }
        };

        match &result {
            Self::List(list) if list.is_empty() => None,
            _ => Some(result),
        }
    }
}

/// Restriction on one sharding column of one logical table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteValue {
    pub table: String,
    pub column: String,
    pub values: RouteValues,
}

impl RouteValue {
    pub fn list(table: impl ToString, column: impl ToString, values: Vec<Scalar>) -> Self {
        let mut distinct: Vec<Scalar> = Vec::with_capacity(values.len());
        for value in values {
            if !distinct.contains(&value) {
                distinct.push(value);
            }
        }

        Self {
            table: table.to_string(),
            column: column.to_string(),
            values: RouteValues::List(distinct),
        }
    }

    pub fn range(table: impl ToString, column: impl ToString, range: RouteRange) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            values: RouteValues::Range(range),
        }
    }

    pub fn is_column(&self, table: &str, column: &str) -> bool {
        self.table.eq_ignore_ascii_case(table) && self.column.eq_ignore_ascii_case(column)
    }
}

impl Display for RouteValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.values {
            RouteValues::List(values) => write!(
                f,
                "{}.{} in ({})",
                self.table,
                self.column,
                values
                    .iter()
                    .map(|value| value.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            RouteValues::Range(range) => {
                let lower = match &range.lower {
                    Bound::Unbounded => "(-inf".to_string(),
                    Bound::Included(value) => format!("[{}", value),
                    Bound::Excluded(value) => format!("({}", value),
                };
                let upper = match &range.upper {
                    Bound::Unbounded => "+inf)".to_string(),
                    Bound::Included(value) => format!("{}]", value),
                    Bound::Excluded(value) => format!("{})", value),
                };
                write!(f, "{}.{} in {}..{}", self.table, self.column, lower, upper)
            }
        }
    }
}

/// Route values of one `INSERT` row or one `AND` group.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShardingCondition {
    pub values: Vec<RouteValue>,
}

impl ShardingCondition {
    pub fn new(values: Vec<RouteValue>) -> Self {
        Self { values }
    }

    /// Route values belonging to any of the given tables.
    pub fn values_for<'a>(&'a self, tables: &[&str]) -> Vec<&'a RouteValue> {
        self.values
            .iter()
            .filter(|value| {
                tables
                    .iter()
                    .any(|table| table.eq_ignore_ascii_case(&value.table))
            })
            .collect()
    }
}

/// Conditions of a statement.
///
/// Empty conditions route to every data node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShardingConditions {
    pub conditions: Vec<ShardingCondition>,
    /// Predicates can't be satisfied by any row.
    pub always_false: bool,
}

impl ShardingConditions {
    pub fn new(conditions: Vec<ShardingCondition>) -> Self {
        Self {
            conditions,
            always_false: false,
        }
    }

    pub fn always_false() -> Self {
        Self {
            conditions: vec![],
            always_false: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Route values of a table (or its binding group), for diagnostics.
    pub fn describe(&self, tables: &[&str]) -> Vec<String> {
        self.conditions
            .iter()
            .flat_map(|condition| condition.values_for(tables))
            .map(|value| value.to_string())
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn range(lower: Bound<i64>, upper: Bound<i64>) -> RouteRange {
        RouteRange::new(lower.map(Scalar::from), upper.map(Scalar::from))
    }

    #[test]
    fn test_range_contains() {
        let r = range(Bound::Included(1), Bound::Excluded(5));
        assert!(r.contains(&Scalar::from(1)));
        assert!(r.contains(&Scalar::from(4)));
        assert!(!r.contains(&Scalar::from(5)));
        assert!(!r.contains(&Scalar::from(0)));
        // Not comparable, kept.
        assert!(r.contains(&Scalar::from("a")));
    }

    #[test]
    fn test_range_intersect() {
        let a = range(Bound::Included(1), Bound::Included(10));
        let b = range(Bound::Excluded(5), Bound::Unbounded);
        assert_eq!(
            a.intersect(&b),
            Some(range(Bound::Excluded(5), Bound::Included(10)))
        );

        let c = range(Bound::Unbounded, Bound::Excluded(1));
        assert_eq!(a.intersect(&c), None);

        let d = range(Bound::Included(10), Bound::Unbounded);
        assert_eq!(
            a.intersect(&d),
            Some(range(Bound::Included(10), Bound::Included(10)))
        );
    }

    #[test]
    fn test_values_intersect() {
        let list = RouteValues::List(vec![1.into(), 2.into(), 3.into()]);
        let other = RouteValues::List(vec![3.into(), 4.into()]);
        assert_eq!(
            list.intersect(&other),
            Some(RouteValues::List(vec![3.into()]))
        );

        let r = RouteValues::Range(range(Bound::Included(2), Bound::Unbounded));
        assert_eq!(
            list.intersect(&r),
            Some(RouteValues::List(vec![2.into(), 3.into()]))
        );

        let none = RouteValues::List(vec![7.into()]);
        assert_eq!(list.intersect(&none), None);
    }

    #[test]
    fn test_display() {
        let value = RouteValue::list("t_order", "order_id", vec![1.into(), 1.into(), 2.into()]);
        assert_eq!(value.to_string(), "t_order.order_id in (1, 2)");

        let value = RouteValue::range(
            "t_order",
            "order_id",
            range(Bound::Included(1), Bound::Unbounded),
        );
        assert_eq!(value.to_string(), "t_order.order_id in [1..+inf)");
    }
}
