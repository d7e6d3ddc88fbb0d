use serde::{Deserialize, Serialize};

use crate::bitstore::MAX_WORDS;
use crate::error::{StoreError, StoreResult};

/// Sizing of the backing store, in 32-bit words.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Words allocated when the store is created.
    pub initial_words: u32,
    /// Words added by each growth step.
    pub grow_words: u32,
    /// Hard ceiling on the store size. Unset means the addressable limit.
    pub max_words: Option<u32>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            initial_words: 1024,
            grow_words: 1024,
            max_words: None,
        }
    }
}

impl StoreConfig {
    /// Effective ceiling on the store size.
    pub fn limit(&self) -> u32 {
        self.max_words.unwrap_or(MAX_WORDS).min(MAX_WORDS)
    }

    /// Reject zero sizes and an initial size above the ceiling.
    pub fn validate(&self) -> StoreResult<()> {
        if self.initial_words == 0 {
            return Err(StoreError::InvalidConfig("initial_words must be positive".into()));
        }
        if self.grow_words == 0 {
            return Err(StoreError::InvalidConfig("grow_words must be positive".into()));
        }
        if self.initial_words > self.limit() {
            return Err(StoreError::InvalidConfig(format!(
                "initial_words {} exceeds limit {}",
                self.initial_words,
                self.limit()
            )));
        }
        Ok(())
    }
}
