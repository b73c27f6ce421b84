//! Column encryption.
//!
//! The algorithms are opaque to the router; it only needs to know
//! which physical columns hold cipher text and assisted query digests.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use shardroute_config::EncryptTable;

use crate::value::Scalar;
use crate::Error;

/// Encryption algorithm.
pub trait EncryptAlgorithm: Send + Sync + Debug {
    /// Name referenced by `encryptor` in the configuration.
    fn name(&self) -> &str;

    fn encrypt(&self, value: &Scalar) -> Result<Scalar, String>;

    fn decrypt(&self, value: &Scalar) -> Result<Scalar, String>;

    /// The algorithm can produce deterministic digests for equality lookups.
    fn supports_assisted_query(&self) -> bool {
        false
    }

    fn assisted_encrypt(&self, _value: &Scalar) -> Result<Scalar, String> {
        Err(format!("{} doesn't support assisted queries", self.name()))
    }
}

/// MD5 digest. Irreversible, so decryption returns the digest.
#[derive(Debug, Default)]
pub struct Md5;

impl EncryptAlgorithm for Md5 {
    fn name(&self) -> &str {
        "md5"
    }

    fn encrypt(&self, value: &Scalar) -> Result<Scalar, String> {
        Ok(Scalar::Text(format!(
            "{:x}",
            md5::compute(value.to_string().as_bytes())
        )))
    }

    fn decrypt(&self, value: &Scalar) -> Result<Scalar, String> {
        Ok(value.clone())
    }
}

/// Encryption algorithms available to the rule set, by name.
#[derive(Debug, Clone)]
pub struct EncryptorRegistry {
    algorithms: HashMap<String, Arc<dyn EncryptAlgorithm>>,
}

impl Default for EncryptorRegistry {
    fn default() -> Self {
        let mut registry = Self {
            algorithms: HashMap::new(),
        };
        registry.register(Arc::new(Md5));
        registry
    }
}

impl EncryptorRegistry {
    /// Registry with built-in algorithms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an algorithm.
    pub fn register(&mut self, algorithm: Arc<dyn EncryptAlgorithm>) {
        self.algorithms
            .insert(algorithm.name().to_lowercase(), algorithm);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn EncryptAlgorithm>> {
        self.algorithms.get(&name.to_lowercase()).cloned()
    }
}

/// Encrypted column.
#[derive(Debug, Clone)]
pub struct EncryptColumnRule {
    pub table: String,
    pub name: String,
    pub cipher_column: String,
    pub assisted_query_column: Option<String>,
    pub algorithm: Arc<dyn EncryptAlgorithm>,
}

impl EncryptColumnRule {
    /// Column used in predicates.
    pub fn query_column(&self) -> &str {
        self.assisted_query_column
            .as_deref()
            .unwrap_or(&self.cipher_column)
    }

    pub fn encrypt(&self, value: &Scalar) -> Result<Scalar, Error> {
        if value.is_null() {
            return Ok(Scalar::Null);
        }
        self.algorithm.encrypt(value).map_err(|reason| self.error(reason))
    }

    pub fn assisted(&self, value: &Scalar) -> Result<Scalar, Error> {
        if value.is_null() {
            return Ok(Scalar::Null);
        }
        self.algorithm
            .assisted_encrypt(value)
            .map_err(|reason| self.error(reason))
    }

    /// Value compared against [`Self::query_column`].
    pub fn query_value(&self, value: &Scalar) -> Result<Scalar, Error> {
        if self.assisted_query_column.is_some() {
            self.assisted(value)
        } else {
            self.encrypt(value)
        }
    }

    fn error(&self, reason: String) -> Error {
        Error::Encrypt {
            table: self.table.clone(),
            column: self.name.clone(),
            reason,
        }
    }
}

/// Encrypted columns of one table, by lowercase column name.
#[derive(Debug, Clone, Default)]
pub struct EncryptTableRule {
    pub columns: HashMap<String, EncryptColumnRule>,
}

impl EncryptTableRule {
    pub(crate) fn new(table: &EncryptTable, registry: &EncryptorRegistry) -> Result<Self, Error> {
        let mut columns = HashMap::new();

        for column in &table.columns {
            let algorithm = registry
                .get(&column.encryptor)
                .ok_or_else(|| Error::UnknownEncryptor(column.encryptor.clone()))?;

            if column.assisted_query_column.is_some() && !algorithm.supports_assisted_query() {
                return Err(Error::MissingEncryptConfiguration {
                    table: table.name.clone(),
                    column: column.name.clone(),
                });
            }

            columns.insert(
                column.name.to_lowercase(),
                EncryptColumnRule {
                    table: table.name.clone(),
                    name: column.name.clone(),
                    cipher_column: column.cipher_column.clone(),
                    assisted_query_column: column.assisted_query_column.clone(),
                    algorithm,
                },
            );
        }

        Ok(Self { columns })
    }

    pub fn column(&self, name: &str) -> Option<&EncryptColumnRule> {
        self.columns.get(&name.to_lowercase())
    }
}

#[cfg(test)]
mod test {
    use shardroute_config::EncryptColumn;

    use super::*;

    #[test]
    fn test_md5() {
        let md5 = Md5;
        assert_eq!(
            md5.encrypt(&Scalar::from("abc")).unwrap(),
            Scalar::from("900150983cd24fb0d6963f7d28e17f72")
        );
        assert!(!md5.supports_assisted_query());
    }

    #[test]
    fn test_assisted_column_needs_support() {
        let table = EncryptTable {
            name: "t_user".into(),
            columns: vec![EncryptColumn {
                name: "pwd".into(),
                cipher_column: "pwd_cipher".into(),
                assisted_query_column: Some("pwd_assisted".into()),
                encryptor: "md5".into(),
            }],
        };

        assert!(matches!(
            EncryptTableRule::new(&table, &EncryptorRegistry::new()),
            Err(Error::MissingEncryptConfiguration { .. })
        ));
    }

    #[test]
    fn test_unknown_encryptor() {
        let table = EncryptTable {
            name: "t_user".into(),
            columns: vec![EncryptColumn {
                name: "pwd".into(),
                cipher_column: "pwd_cipher".into(),
                assisted_query_column: None,
                encryptor: "rot13".into(),
            }],
        };

        assert!(matches!(
            EncryptTableRule::new(&table, &EncryptorRegistry::new()),
            Err(Error::UnknownEncryptor(_))
        ));
    }

    #[test]
    fn test_null_passes_through() {
        let table = EncryptTable {
            name: "t_user".into(),
            columns: vec![EncryptColumn {
                name: "pwd".into(),
                cipher_column: "pwd_cipher".into(),
                assisted_query_column: None,
                encryptor: "MD5".into(),
            }],
        };
        let rule = EncryptTableRule::new(&table, &EncryptorRegistry::new()).unwrap();
        let column = rule.column("PWD").unwrap();
        assert_eq!(column.encrypt(&Scalar::Null).unwrap(), Scalar::Null);
        assert_eq!(column.query_column(), "pwd_cipher");
    }
}
