// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for the settings file that Maestro uses to simplify
//! the process of serialization and deserialization. File I/O is left to the
//! caller to figure out.
//!
//! Settings are an explicit value handed to [`Inventory`] on construction.
//! Nothing here is process-wide, so independent inventories with different
//! settings can coexist in the same process.
//!
//! [`Inventory`]: crate::inventory::Inventory

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

/// Settings file layout.
///
/// # General Layout
///
/// Settings are split into four sections: where the inventory lives and
/// how it is laid out, how parameters are merged, how whole-inventory
/// resolution is scheduled, and how resolved data is exported to Ansible.
/// Every section and every field is optional, missing fields fall back to
/// their defaults.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Inventory location and layout.
    pub inventory: InventorySettings,

    /// Parameter merge behaviour.
    pub merge: MergeSettings,

    /// Whole-inventory resolution scheduling.
    pub resolve: ResolveSettings,

    /// Ansible export behaviour.
    pub ansible: AnsibleSettings,
}

impl Settings {
    /// Construct settings pointing at target inventory root.
    pub fn with_inventory(path: impl Into<PathBuf>) -> Self {
        let mut settings = Self::default();
        settings.inventory.path = path.into();
        settings
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on inventory path field.
        settings.inventory.path = PathBuf::from(
            shellexpand::full(settings.inventory.path.to_string_lossy().as_ref())
                .map_err(ConfigError::ShellExpansion)?
                .into_owned(),
        );

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Inventory location and layout.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InventorySettings {
    /// Root directory of the inventory.
    pub path: PathBuf,

    /// Directory under root holding node definitions.
    pub nodes_dir: String,

    /// Directory under root holding class definitions.
    pub classes_dir: String,

    /// File extensions recognized as definition files.
    pub extensions: Vec<String>,
}

impl InventorySettings {
    pub fn nodes_path(&self) -> PathBuf {
        self.path.join(&self.nodes_dir)
    }

    pub fn classes_path(&self) -> PathBuf {
        self.path.join(&self.classes_dir)
    }

    /// Check if file at path should be parsed as a definition.
    pub fn is_definition(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy())
            .is_some_and(|ext| self.extensions.iter().any(|known| *known == ext))
    }
}

impl Default for InventorySettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("inventory"),
            nodes_dir: "nodes".into(),
            classes_dir: "classes".into(),
            extensions: vec!["yml".into(), "yaml".into()],
        }
    }
}

/// Parameter merge behaviour.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MergeSettings {
    /// Prefix marking a sequence item for appending instead of replacing.
    pub append_marker: String,

    /// Treat merge warnings as failures when linting.
    pub strict: bool,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            append_marker: "+".into(),
            strict: false,
        }
    }
}

/// Whole-inventory resolution scheduling.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolveSettings {
    /// Upper bound of nodes resolved at the same time.
    pub jobs: usize,

    /// Stop submitting new nodes after this many milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ResolveSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl Default for ResolveSettings {
    fn default() -> Self {
        Self {
            jobs: 8,
            timeout_ms: None,
        }
    }
}

/// Ansible export behaviour.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnsibleSettings {
    /// Prefix prepended to every class-derived group name.
    pub group_prefix: String,
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Failed to read settings file.
    #[error("failed to read settings file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}
