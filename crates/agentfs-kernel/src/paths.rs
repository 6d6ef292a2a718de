//! XDG Base Directory paths for agentfs.
//!
//! | Purpose | XDG Variable | Default | agentfs Path |
//! |---------|--------------|---------|--------------|
//! | Tenant storage | `$XDG_DATA_HOME` | `~/.local/share` | `$XDG_DATA_HOME/agentfs/tenants/` |
//! | Config | `$XDG_CONFIG_HOME` | `~/.config` | `$XDG_CONFIG_HOME/agentfs/config.toml` |

use std::path::PathBuf;

use directories::BaseDirs;

/// Get the data directory for persistent state.
///
/// Uses `$XDG_DATA_HOME/agentfs` or falls back to `~/.local/share/agentfs`.
pub fn data_dir() -> PathBuf {
    BaseDirs::new()
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| dirs_fallback().join(".local").join("share"))
        .join("agentfs")
}

/// Get the config directory.
///
/// Uses `$XDG_CONFIG_HOME/agentfs` or falls back to `~/.config/agentfs`.
pub fn config_dir() -> PathBuf {
    BaseDirs::new()
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| dirs_fallback().join(".config"))
        .join("agentfs")
}

/// Default root for on-disk tenant directories.
pub fn tenants_dir() -> PathBuf {
    data_dir().join("tenants")
}

/// Fallback home directory when BaseDirs fails.
fn dirs_fallback() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir())
}
