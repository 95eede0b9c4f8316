//! Engine settings.
//!
//! Plain serde types passed to [`Registry::with_settings`](crate::Registry::with_settings).
//! The core reads no files or environment variables; hosts load the JSON
//! however they like and hand it over.
//!
//! All field names are camelCase and every field has a default, so partial
//! JSON is accepted:
//!
//! ```json
//! { "pool": { "maxIdle": 128 } }
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::SettingsError;

/// Root settings type.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// Context pool settings.
    pub pool: PoolSettings,
}

impl EngineSettings {
    /// Parse settings from JSON and validate them.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject out-of-range values.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.pool.enabled && self.pool.max_idle == 0 {
            return Err(SettingsError::InvalidValue(
                "pool.maxIdle must be at least 1 when pooling is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// Context pool settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PoolSettings {
    /// Reuse contexts across calls.
    pub enabled: bool,
    /// Maximum idle contexts kept.
    pub max_idle: usize,
    /// Result storage with more capacity than this is reallocated on release.
    pub max_result_capacity: usize,
    /// Metadata stores with more entries than this are reallocated on release.
    pub max_metadata_entries: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_idle: 64,
            max_result_capacity: 16,
            max_metadata_entries: 32,
        }
    }
}
