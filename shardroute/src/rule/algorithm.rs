//! Sharding algorithms and strategy evaluation.

use std::ops::Bound;

use shardroute_config::{FlexibleType, RangeShard, ShardingAlgorithm, ShardingStrategy};
use tracing::trace;

use crate::condition::{RouteRange, RouteValue, RouteValues};
use crate::value::Scalar;
use crate::Error;

/// Shard index(es) a value maps to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Shard {
    /// Direct-to-shard number.
    Direct(usize),
    /// Multiple shards, enumerated.
    Multi(Vec<usize>),
    /// All shards.
    #[default]
    All,
}

impl Shard {
    fn indexes(self) -> Option<Vec<usize>> {
        match self {
            Self::Direct(shard) => Some(vec![shard]),
            Self::Multi(shards) => Some(shards),
            Self::All => None,
        }
    }
}

/// Apply an algorithm to a set of route values.
pub fn shard(algorithm: &ShardingAlgorithm, values: &RouteValues) -> Result<Shard, Error> {
    match values {
        RouteValues::List(list) => {
            let mut shards = vec![];
            for value in list {
                match shard_value(algorithm, value)?.indexes() {
                    Some(indexes) => shards.extend(indexes),
                    None => return Ok(Shard::All),
                }
            }
            shards.sort_unstable();
            shards.dedup();

            if shards.len() == 1 {
                Ok(Shard::Direct(shards[0]))
            } else {
                Ok(Shard::Multi(shards))
            }
        }

        RouteValues::Range(range) => shard_range(algorithm, range),
    }
}

/// Apply an algorithm to a single value.
pub fn shard_value(algorithm: &ShardingAlgorithm, value: &Scalar) -> Result<Shard, Error> {
    match algorithm {
        ShardingAlgorithm::Mod { sharding_count } => {
            trace!("sharding using mod");
            let integer = value.integer().ok_or_else(|| invalid(algorithm, value))?;
            Ok(Shard::Direct(
                integer.rem_euclid(*sharding_count as i64) as usize,
            ))
        }

        ShardingAlgorithm::HashMod { sharding_count } => {
            trace!("sharding using hash");
            if value.is_null() {
                return Err(invalid(algorithm, value));
            }
            let hash = crc32c::crc32c(&value.hash_bytes());
            Ok(Shard::Direct(hash as usize % sharding_count))
        }

        ShardingAlgorithm::Range { ranges } => {
            trace!("sharding using range");
            Ok(ranges
                .iter()
                .find(|range| range_contains(range, value))
                .map(|range| Shard::Direct(range.shard))
                .unwrap_or(Shard::All))
        }

        ShardingAlgorithm::List { lists } => {
            trace!("sharding using lists");
            Ok(lists
                .iter()
                .find(|list| list.values.iter().any(|v| value.matches(v)))
                .map(|list| Shard::Direct(list.shard))
                .unwrap_or(Shard::All))
        }
    }
}

fn shard_range(algorithm: &ShardingAlgorithm, range: &RouteRange) -> Result<Shard, Error> {
    let (lower, upper) = integer_bounds(range);

    match algorithm {
        ShardingAlgorithm::Mod { sharding_count } => {
            let (Some(lower), Some(upper)) = (lower, upper) else {
                return Ok(Shard::All);
            };
            if upper < lower {
                return Ok(Shard::Multi(vec![]));
            }
            if upper.abs_diff(lower) as u128 + 1 >= *sharding_count as u128 {
                return Ok(Shard::All);
            }
            let mut shards = (lower..=upper)
                .map(|value| value.rem_euclid(*sharding_count as i64) as usize)
                .collect::<Vec<_>>();
            shards.sort_unstable();
            shards.dedup();
            Ok(Shard::Multi(shards))
        }

        ShardingAlgorithm::Range { ranges } => {
            let integer = |value: &Option<FlexibleType>| match value {
                Some(FlexibleType::Integer(value)) => Ok(Some(*value)),
                None => Ok(None),
                Some(_) => Err(()),
            };

            let mut shards = vec![];
            for shard_range in ranges {
                let (Ok(start), Ok(end)) =
                    (integer(&shard_range.start), integer(&shard_range.end))
                else {
                    return Ok(Shard::All);
                };
                // [start, end) overlaps [lower, upper]
                let below_end = match (lower, end) {
                    (Some(lower), Some(end)) => lower < end,
                    _ => true,
                };
                let above_start = match (upper, start) {
                    (Some(upper), Some(start)) => upper >= start,
                    _ => true,
                };
                if below_end && above_start {
                    shards.push(shard_range.shard);
                }
            }
            shards.sort_unstable();
            shards.dedup();
            Ok(Shard::Multi(shards))
        }

        ShardingAlgorithm::HashMod { .. } | ShardingAlgorithm::List { .. } => Ok(Shard::All),
    }
}

// Inclusive integer bounds of a range. `None` is unbounded or not an integer.
fn integer_bounds(range: &RouteRange) -> (Option<i64>, Option<i64>) {
    let lower = match &range.lower {
        Bound::Included(value) => value.integer(),
        Bound::Excluded(value) => value.integer().and_then(|v| v.checked_add(1)),
        Bound::Unbounded => None,
    };
    let upper = match &range.upper {
        Bound::Included(value) => value.integer(),
        Bound::Excluded(value) => value.integer().and_then(|v| v.checked_sub(1)),
        Bound::Unbounded => None,
    };
    (lower, upper)
}

fn range_contains(range: &RangeShard, value: &Scalar) -> bool {
    if let Some(integer) = value.integer() {
        let start = match &range.start {
            Some(FlexibleType::Integer(start)) => integer >= *start,
            None => true,
            Some(_) => return false,
        };
        let end = match &range.end {
            Some(FlexibleType::Integer(end)) => integer < *end,
            None => true,
            Some(_) => return false,
        };
        return start && end && (range.start.is_some() || range.end.is_some());
    }

    if let Some(text) = value.text() {
        let start = match &range.start {
            Some(FlexibleType::String(start)) => text >= start.as_str(),
            None => true,
            Some(_) => return false,
        };
        let end = match &range.end {
            Some(FlexibleType::String(end)) => text < end.as_str(),
            None => true,
            Some(_) => return false,
        };
        return start && end && (range.start.is_some() || range.end.is_some());
    }

    false
}

fn invalid(algorithm: &ShardingAlgorithm, value: &Scalar) -> Error {
    Error::InvalidShardingValue {
        value: value.to_string(),
        algorithm: algorithm.to_string(),
    }
}

/// Trailing decimal suffix of a name, e.g. `3` in `t_order_3`.
pub(crate) fn suffix(name: &str) -> Option<usize> {
    let digits = name
        .bytes()
        .rev()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }
    name[name.len() - digits..].parse().ok()
}

/// Resolve a shard index to a target name.
///
/// Targets are matched by their numeric suffix. If no target has a
/// numeric suffix, the index is positional. If no target matches, the
/// name is synthesized from the stem of the first suffixed target, so a
/// misconfigured shard count surfaces as a missing data node instead of
/// a silently wrong one.
pub(crate) fn resolve(available: &[String], index: usize) -> String {
    if let Some(target) = available.iter().find(|name| suffix(name) == Some(index)) {
        return target.clone();
    }

    match available.iter().find(|name| suffix(name).is_some()) {
        Some(template) => {
            let digits = template
                .bytes()
                .rev()
                .take_while(|b| b.is_ascii_digit())
                .count();
            format!("{}{}", &template[..template.len() - digits], index)
        }
        None => available
            .get(index)
            .cloned()
            .unwrap_or_else(|| index.to_string()),
    }
}

fn targets(shard: Shard, available: &[String]) -> Vec<String> {
    match shard.indexes() {
        None => available.to_vec(),
        Some(indexes) => {
            let mut result: Vec<String> = vec![];
            for index in indexes {
                let target = resolve(available, index);
                if !result.contains(&target) {
                    result.push(target);
                }
            }
            result
        }
    }
}

/// Evaluate a strategy along one axis (data sources or tables).
///
/// `values` are the route values of the table (or its binding group)
/// in one sharding condition. A column without a value, or a hint
/// strategy without hint values, selects every available target.
pub fn route(
    strategy: &ShardingStrategy,
    available: &[String],
    values: &[&RouteValue],
    hint: Option<&[Scalar]>,
) -> Result<Vec<String>, Error> {
    let lookup = |column: &str| {
        values
            .iter()
            .find(|value| value.column.eq_ignore_ascii_case(column))
    };

    match strategy {
        ShardingStrategy::None => Ok(available.to_vec()),

        ShardingStrategy::Standard { column, algorithm } => {
            trace!("routing using standard strategy on \"{}\"", column);
            match lookup(column) {
                Some(value) => Ok(targets(shard(algorithm, &value.values)?, available)),
                None => Ok(available.to_vec()),
            }
        }

        ShardingStrategy::Complex { columns, algorithm } => {
            trace!("routing using complex strategy on {:?}", columns);
            let mut result: Option<Vec<String>> = None;
            for column in columns {
                let Some(value) = lookup(column) else {
                    continue;
                };
                let selected = targets(shard(algorithm, &value.values)?, available);
                result = Some(match result {
                    None => selected,
                    Some(previous) => previous
                        .into_iter()
                        .filter(|target| selected.contains(target))
                        .collect(),
                });
            }
            Ok(result.unwrap_or_else(|| available.to_vec()))
        }

        ShardingStrategy::Hint { algorithm } => {
            trace!("routing using hint strategy");
            match hint {
                Some(hint) if !hint.is_empty() => Ok(targets(
                    shard(algorithm, &RouteValues::List(hint.to_vec()))?,
                    available,
                )),
                _ => Ok(available.to_vec()),
            }
        }
    }
}
