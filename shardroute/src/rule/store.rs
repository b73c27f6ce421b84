//! Published rule snapshots.

use std::sync::Arc;

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use shardroute_config::Config;
use tracing::info;

use super::{EncryptorRegistry, RuleSet};
use crate::Error;

static RULES: Lazy<RuleStore> = Lazy::new(RuleStore::default);

/// Get the process-wide rule set.
pub fn rules() -> Arc<RuleSet> {
    RULES.load()
}

/// Replace the process-wide rule set.
pub fn replace_rules(config: &Config, encryptors: &EncryptorRegistry) -> Result<Arc<RuleSet>, Error> {
    RULES.replace(config, encryptors)
}

/// Holder of the current rule set.
///
/// Readers get the snapshot that was current when they loaded it;
/// replacing builds a new snapshot and swaps it in atomically.
#[derive(Debug, Default)]
pub struct RuleStore {
    current: ArcSwap<RuleSet>,
    lock: Mutex<()>,
}

impl RuleStore {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            current: ArcSwap::from_pointee(rules),
            lock: Mutex::new(()),
        }
    }

    pub fn load(&self) -> Arc<RuleSet> {
        self.current.load().clone()
    }

    /// Build a new snapshot from configuration and publish it.
    pub fn replace(
        &self,
        config: &Config,
        encryptors: &EncryptorRegistry,
    ) -> Result<Arc<RuleSet>, Error> {
        // Serialize writers so key generators carry over between snapshots.
        let _lock = self.lock.lock();

        let previous = self.load();
        let rules = Arc::new(RuleSet::with_previous(
            config,
            encryptors,
            Some(&previous),
        )?);
        self.current.store(rules.clone());

        info!(
            "loaded {} sharded tables across {} data sources",
            config.sharded_tables.len(),
            config.data_sources.len()
        );

        Ok(rules)
    }
}
