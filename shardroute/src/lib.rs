//! Routing and rewrite core for sharded SQL.
//!
//! Takes a statement already bound by a parser and produces, for every
//! data source it must run on, the SQL text and parameters to send.

pub mod condition;
pub mod engine;
pub mod error;
pub mod key;
pub mod rewrite;
pub mod route;
pub mod rule;
pub mod statement;
pub mod value;

#[cfg(test)]
pub mod test;

pub use engine::{ExecutionPlan, ExecutionUnit, ShardingEngine};
pub use error::{AbsentDataNodes, AbsentTable, Error};
pub use key::GeneratedKey;
pub use route::{Hints, LiveMetadata, RoutingResult, RoutingUnit, TableUnit};
pub use rule::{replace_rules, rules, EncryptAlgorithm, EncryptorRegistry, RuleSet, RuleStore};
pub use statement::{BoundStatement, StatementKind};
pub use value::Scalar;

pub use shardroute_config as config;
