//! Centralized application directory paths for the Automator engine.
//!
//! Provides a single source of truth for all filesystem paths used by the
//! host. Uses the [`dirs`] crate for platform-appropriate directory
//! resolution.
//!
//! # Directory Layout
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | App data | `~/Library/Application Support/automator/` | `~/.local/share/automator/` |
//! | Config | `~/Library/Application Support/automator/` | `~/.config/automator/` |
//!
//! # Environment Overrides
//!
//! All paths can be overridden for testing or custom deployments:
//! - `AUTOMATOR_DATA_DIR` — overrides [`data_dir`]
//! - `AUTOMATOR_CONFIG_DIR` — overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Used for persistent user data: the storage document holding tasks,
/// notes, snippets, formatters and chat threads, plus log files.
///
/// Resolves to `dirs::data_dir()/automator/` by default. Override with
/// the `AUTOMATOR_DATA_DIR` environment variable.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("AUTOMATOR_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("automator"))
        .unwrap_or_else(|| PathBuf::from("/tmp/automator-data"))
}

/// Application config directory.
///
/// Used for `config.toml`.
///
/// Resolves to `dirs::config_dir()/automator/` by default. Override with
/// the `AUTOMATOR_CONFIG_DIR` environment variable.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("AUTOMATOR_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("automator"))
        .unwrap_or_else(|| PathBuf::from("/tmp/automator-config"))
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Storage document path (`data_dir()/storage.json`).
///
/// All persisted collections live inside this single JSON document,
/// keyed by collection name.
#[must_use]
pub fn storage_file() -> PathBuf {
    data_dir().join("storage.json")
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}
