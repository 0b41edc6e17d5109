//! Versioned override table for known-bad cross-reference mappings.
//!
//! ```yaml
//! version: 1
//! entries:
//!   "2143": "5804091048247"
//! ```
//!
//! Keys are raw Source cross-reference values, values are the Target order ids
//! to use instead. A missing file is an empty table.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{ensure_root_at, home, pickup_root, write_atomic};
use crate::error::{io_err, ConfigError};

pub const OVERRIDES_VERSION: u32 = 1;
pub const OVERRIDES_FILE: &str = "overrides.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideTable {
    pub version: u32,
    #[serde(default)]
    pub entries: BTreeMap<String, String>,
}

impl Default for OverrideTable {
    fn default() -> Self {
        Self {
            version: OVERRIDES_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

impl OverrideTable {
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            version: OVERRIDES_VERSION,
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, cross_reference: &str) -> Option<&str> {
        self.entries.get(cross_reference).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `<home>/.pickup/overrides.yaml`: pure, no I/O.
pub fn overrides_path_at(home: &Path) -> PathBuf {
    pickup_root(home).join(OVERRIDES_FILE)
}

/// Load the override table; a missing file yields an empty table.
pub fn load_at(home: &Path) -> Result<OverrideTable, ConfigError> {
    let path = overrides_path_at(home);
    if !path.exists() {
        return Ok(OverrideTable::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let table: OverrideTable = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.clone(),
        source: e,
    })?;
    if table.version != OVERRIDES_VERSION {
        return Err(ConfigError::Invalid {
            path,
            reason: format!(
                "unsupported override table version {} (expected {OVERRIDES_VERSION})",
                table.version
            ),
        });
    }
    if let Some((key, _)) = table
        .entries
        .iter()
        .find(|(k, v)| k.trim().is_empty() || v.trim().is_empty())
    {
        return Err(ConfigError::Invalid {
            path,
            reason: format!("override entry '{key}' has an empty key or value"),
        });
    }
    Ok(table)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<OverrideTable, ConfigError> {
    load_at(&home()?)
}

/// Atomically save the override table.
pub fn save_at(home: &Path, table: &OverrideTable) -> Result<(), ConfigError> {
    ensure_root_at(home)?;
    let yaml = serde_yaml::to_string(table)?;
    write_atomic(&overrides_path_at(home), &yaml)
}
