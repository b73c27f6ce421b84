//! Token generators.
//!
//! Each generator runs once per statement and claims the spans it
//! rewrites. Generators run in family order: base, sharding, encrypt.

pub mod base;
pub mod encrypt;
pub mod sharding;

use super::insert::InsertArena;
use super::parameters::FlatParameters;
use super::token::{self, SqlToken};
use crate::route::RoutingResult;
use crate::rule::RuleSet;
use crate::statement::BoundStatement;
use crate::Error;

pub use base::BaseGenerator;
pub use encrypt::EncryptGenerator;
pub use sharding::ShardingGenerator;

/// State shared by generators for one statement.
pub struct RewriteContext<'a> {
    pub rules: &'a RuleSet,
    pub statement: &'a BoundStatement,
    pub result: &'a RoutingResult,
    /// Parameters with in-place edits.
    pub parameters: FlatParameters,
    /// Restructured `INSERT` rows, when the statement's rows are rewritten.
    pub insert: Option<InsertArena>,
}

pub trait TokenGenerator {
    fn generate(&self, context: &mut RewriteContext<'_>) -> Result<Vec<SqlToken>, Error>;
}

/// Run every generator and order their tokens.
pub fn generate(context: &mut RewriteContext<'_>) -> Result<Vec<SqlToken>, Error> {
    let generators: [&dyn TokenGenerator; 3] =
        [&BaseGenerator, &ShardingGenerator, &EncryptGenerator];

    let mut tokens = vec![];
    for generator in generators {
        tokens.extend(generator.generate(context)?);
    }

    token::order(tokens)
}
