//! Environment-driven configuration.

use std::path::PathBuf;
use std::time::Duration;

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|raw| parse_bool(&raw))
        .unwrap_or(default)
}

/// Where learning state lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMode {
    /// Local file only, no remote calls at all.
    #[default]
    Local,
    /// Remote is authoritative; local is a write-through cache.
    Remote,
    /// Remote reads on bootstrap; writes stay local unless opted in.
    Hybrid,
}

impl StorageMode {
    fn from_env_value(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "remote" => Self::Remote,
            "hybrid" => Self::Hybrid,
            "local" => Self::Local,
            other => {
                tracing::warn!(
                    "Unknown STUDYHALL_STORAGE_MODE '{}', falling back to local",
                    other
                );
                Self::Local
            }
        }
    }
}

/// Sync coordinator configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub mode: StorageMode,
    /// Master switch; off means no remote traffic regardless of mode.
    pub remote_enabled: bool,
    /// Hybrid mode pushes local changes only when this is set.
    pub hybrid_writes: bool,
    /// Remote calls allowed per coordinator lifetime; `None` is unlimited.
    pub max_calls: Option<u32>,
    pub base_url: String,
    pub debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mode: StorageMode::Local,
            remote_enabled: false,
            hybrid_writes: false,
            max_calls: None,
            base_url: "http://localhost:3001".to_string(),
            debounce: Duration::from_millis(800),
        }
    }
}

impl SyncConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let mode = std::env::var("STUDYHALL_STORAGE_MODE")
            .map(|raw| StorageMode::from_env_value(&raw))
            .unwrap_or(defaults.mode);
        let remote_enabled = env_bool("STUDYHALL_REMOTE_SYNC", defaults.remote_enabled);
        let hybrid_writes = env_bool("STUDYHALL_SYNC_WRITES", defaults.hybrid_writes);

        let max_calls = std::env::var("STUDYHALL_MAX_SYNC_CALLS")
            .ok()
            .and_then(|raw| match raw.trim().parse::<u32>() {
                Ok(n) => Some(n),
                Err(_) => {
                    tracing::warn!("Invalid STUDYHALL_MAX_SYNC_CALLS '{}', ignoring", raw);
                    None
                }
            });

        let base_url =
            std::env::var("STUDYHALL_API_BASE_URL").unwrap_or(defaults.base_url);

        let debounce = std::env::var("STUDYHALL_SYNC_DEBOUNCE_MS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.debounce);

        Self {
            mode,
            remote_enabled,
            hybrid_writes,
            max_calls,
            base_url,
            debounce,
        }
    }

    /// Whether bootstrap may fetch the remote copy.
    pub fn remote_reads_enabled(&self) -> bool {
        self.remote_enabled && self.mode != StorageMode::Local
    }

    /// Whether local changes get pushed back out.
    pub fn remote_writes_enabled(&self) -> bool {
        self.remote_enabled
            && match self.mode {
                StorageMode::Local => false,
                StorageMode::Remote => true,
                StorageMode::Hybrid => self.hybrid_writes,
            }
    }
}

/// Content fetcher configuration.
#[derive(Debug, Clone)]
pub struct ContentConfig {
    pub base_url: String,
    pub areas_file: String,
    pub cache_dir: Option<PathBuf>,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            areas_file: "areas.json".to_string(),
            cache_dir: None,
        }
    }
}

impl ContentConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("STUDYHALL_DATA_BASE_URL").unwrap_or(defaults.base_url),
            areas_file: std::env::var("STUDYHALL_AREAS_FILE").unwrap_or(defaults.areas_file),
            cache_dir: std::env::var("STUDYHALL_CONTENT_CACHE_DIR")
                .ok()
                .map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for name in [
            "STUDYHALL_STORAGE_MODE",
            "STUDYHALL_REMOTE_SYNC",
            "STUDYHALL_SYNC_WRITES",
            "STUDYHALL_MAX_SYNC_CALLS",
            "STUDYHALL_API_BASE_URL",
            "STUDYHALL_SYNC_DEBOUNCE_MS",
        ] {
            std::env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_are_local_only() {
        clear_env();
        let config = SyncConfig::from_env();
        assert_eq!(config.mode, StorageMode::Local);
        assert!(!config.remote_reads_enabled());
        assert!(!config.remote_writes_enabled());
        assert_eq!(config.debounce, Duration::from_millis(800));
    }

    #[test]
    #[serial]
    fn test_remote_mode_enables_reads_and_writes() {
        clear_env();
        std::env::set_var("STUDYHALL_STORAGE_MODE", "remote");
        std::env::set_var("STUDYHALL_REMOTE_SYNC", "yes");
        let config = SyncConfig::from_env();
        assert!(config.remote_reads_enabled());
        assert!(config.remote_writes_enabled());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_hybrid_writes_need_opt_in() {
        clear_env();
        std::env::set_var("STUDYHALL_STORAGE_MODE", "hybrid");
        std::env::set_var("STUDYHALL_REMOTE_SYNC", "1");
        let config = SyncConfig::from_env();
        assert!(config.remote_reads_enabled());
        assert!(!config.remote_writes_enabled());

        std::env::set_var("STUDYHALL_SYNC_WRITES", "on");
        let config = SyncConfig::from_env();
        assert!(config.remote_writes_enabled());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_master_switch_gates_everything() {
        clear_env();
        std::env::set_var("STUDYHALL_STORAGE_MODE", "remote");
        let config = SyncConfig::from_env();
        assert!(!config.remote_reads_enabled());
        assert!(!config.remote_writes_enabled());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_values_fall_back() {
        clear_env();
        std::env::set_var("STUDYHALL_STORAGE_MODE", "dynamo");
        std::env::set_var("STUDYHALL_MAX_SYNC_CALLS", "lots");
        let config = SyncConfig::from_env();
        assert_eq!(config.mode, StorageMode::Local);
        assert_eq!(config.max_calls, None);
        clear_env();
    }

    #[test]
    fn test_bool_parsing_is_lenient() {
        for raw in ["1", "true", "TRUE", "yes", " on "] {
            assert!(parse_bool(raw), "{:?} should parse true", raw);
        }
        for raw in ["0", "false", "off", "", "nope"] {
            assert!(!parse_bool(raw), "{:?} should parse false", raw);
        }
    }
}
