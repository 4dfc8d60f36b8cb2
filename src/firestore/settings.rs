//! Tuning knobs for the local cache layer.

use serde::{Deserialize, Serialize};

use crate::firestore::core::ListenOptions;
use crate::firestore::error::{invalid_argument, FirestoreResult};

/// Default number of re-reads when a mutation queue changes mid-fold.
pub const DEFAULT_STALE_BASE_RETRIES: u32 = 1;

/// Upper bound on re-reads; beyond this a writer is starving the reader.
pub const MAX_STALE_BASE_RETRIES: u32 = 16;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocalCacheSettings {
    pub stale_base_retries: u32,
    /// Options used by listeners registered without explicit options.
    pub default_listen_options: ListenOptions,
}

impl LocalCacheSettings {
    pub fn from_json_str(raw: &str) -> FirestoreResult<Self> {
        let settings: Self = serde_json::from_str(raw)
            .map_err(|err| invalid_argument(format!("Invalid local cache settings: {err}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> FirestoreResult<()> {
        if self.stale_base_retries > MAX_STALE_BASE_RETRIES {
            return Err(invalid_argument(format!(
                "stale_base_retries must be at most {MAX_STALE_BASE_RETRIES}, got {}",
                self.stale_base_retries
            )));
        }
        Ok(())
    }
}

impl Default for LocalCacheSettings {
    fn default() -> Self {
        Self {
            stale_base_retries: DEFAULT_STALE_BASE_RETRIES,
            default_listen_options: ListenOptions::default(),
        }
    }
}
