//! Statement routing.
//!
//! Decides which data sources and actual tables a bound statement
//! executes on, and checks that they exist.

pub mod broadcast;
pub mod complex;
pub mod engine;
pub mod hint;
pub mod metadata;
pub mod result;
pub mod standard;
pub mod unicast;
pub mod validator;

pub use engine::route;
pub use hint::Hints;
pub use metadata::LiveMetadata;
pub use result::{RoutingResult, RoutingUnit, TableUnit};
pub use validator::check;
