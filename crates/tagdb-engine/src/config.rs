use std::path::Path;

use serde::{Deserialize, Serialize};
use tagdb_codec::ByteOrder;
use tagdb_store::StoreConfig;

use crate::error::{EngineError, EngineResult};

/// Engine settings, loadable from TOML.
///
/// ```toml
/// max_hops = 64
/// byte_order = "little"
///
/// [store]
/// initial_words = 1024
/// grow_words = 1024
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub store: StoreConfig,
    /// Most replications one write may trigger.
    pub max_hops: u32,
    /// Byte order of multi-byte values in the store.
    pub byte_order: ByteOrder,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            max_hops: 64,
            byte_order: ByteOrder::Little,
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check store sizing and the hop limit.
    pub fn validate(&self) -> EngineResult<()> {
        self.store.validate()?;
        if self.max_hops == 0 {
            return Err(EngineError::Config("max_hops must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_config() {
        let c = EngineConfig::default();
        assert_eq!(c.max_hops, 64);
        assert_eq!(c.byte_order, ByteOrder::Little);
        assert_eq!(c.store.initial_words, 1024);
        assert_eq!(c.store.grow_words, 1024);
        assert!(c.store.max_words.is_none());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let toml = "byte_order = \"big\"\n[store]\ngrow_words = 16\n";
        let c = EngineConfig::from_toml_str(toml).unwrap();
        assert_eq!(c.byte_order, ByteOrder::Big);
        assert_eq!(c.store.grow_words, 16);
        assert_eq!(c.store.initial_words, 1024);
        assert_eq!(c.max_hops, 64);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            EngineConfig::from_toml_str("max_hops = 0"),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("byte_order = \"middle\""),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("[store]\ninitial_words = 0"),
            Err(EngineError::Store(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_hops = 8\n[store]\ninitial_words = 32\nmax_words = 64").unwrap();
        let c = EngineConfig::load(file.path()).unwrap();
        assert_eq!(c.max_hops, 8);
        assert_eq!(c.store.initial_words, 32);
        assert_eq!(c.store.max_words, Some(64));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            EngineConfig::load(dir.path().join("absent.toml")),
            Err(EngineError::Io(_))
        ));
    }
}
