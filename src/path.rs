// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine default locations of files Maestro reads when the caller does
//! not name them explicitly.

use std::path::PathBuf;

/// Determine default absolute path to settings file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/maestro/config.toml` as the
/// default. Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if configuration directory cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_settings_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("maestro").join("config.toml"))
        .ok_or(NoWayHome)
}

/// Determine default absolute path to inventory directory.
///
/// Uses `$XDG_DATA_HOME/maestro/inventory`. Does not check if the path
/// returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if data directory cannot be determined.
pub fn default_inventory_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|path| path.join("maestro").join("inventory"))
        .ok_or(NoWayHome)
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("XDG_CONFIG_HOME", "/tmp/xdg/config"), ("XDG_DATA_HOME", "/tmp/xdg/data")])]
    fn follow_xdg_directories() -> anyhow::Result<()> {
        assert_eq!(
            default_settings_path()?,
            PathBuf::from("/tmp/xdg/config/maestro/config.toml")
        );
        assert_eq!(
            default_inventory_dir()?,
            PathBuf::from("/tmp/xdg/data/maestro/inventory")
        );

        Ok(())
    }
}
