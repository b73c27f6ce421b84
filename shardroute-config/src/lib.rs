// Submodules
pub mod core;
pub mod data_source;
pub mod encrypt;
pub mod error;
pub mod general;
pub mod inline;
pub mod key_generator;
pub mod sharding;

pub use core::Config;
pub use data_source::DataSource;
pub use encrypt::{EncryptColumn, EncryptTable};
pub use error::Error;
pub use general::General;
pub use key_generator::{KeyGeneratorConfig, KeyGeneratorKind};
pub use sharding::*;
