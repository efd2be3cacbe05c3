use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::admin_panel::ToolEntry;
use crate::retry::RetryPolicy;

pub(crate) const ADMIN_CONFIG_FILE: &str = "config.json";

/// Get the config directory using platform-appropriate location.
///
/// - macOS: `~/Library/Application Support/sidekick-admin/`
/// - Linux: `~/.config/sidekick-admin/` (or `$XDG_CONFIG_HOME`)
/// - Windows: `%APPDATA%/sidekick-admin/`
///
/// Falls back to `~/.sidekick-admin/` if platform dir is unavailable.
pub(crate) fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("sidekick-admin"))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".sidekick-admin")
        })
}

/// Load a JSON config file, returning Default if missing or corrupt.
/// Logs when the file exists but cannot be read or parsed, so corrupt files
/// are visible instead of silently resetting state.
pub(crate) fn load_json_config<T: DeserializeOwned + Default>(path: &Path) -> T {
    if !path.exists() {
        return T::default();
    }
    let content = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(path = %path.display(), "could not read config: {e}");
            return T::default();
        }
    };
    match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(path = %path.display(), "corrupt config, using defaults: {e}");
            T::default()
        }
    }
}

/// Write `config` as pretty JSON to `path`, replacing any previous file in
/// one rename. The file may hold an auth token, so on Unix it is created
/// owner-only before any bytes land in it.
pub(crate) fn save_json_config<T: Serialize>(path: &Path, config: &T) -> Result<(), String> {
    let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
        return Err(format!("Not a config file path: {}", path.display()));
    };
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("Failed to create config directory: {e}"))?;
    let bytes = serde_json::to_vec_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {e}"))?;

    let staging = dir.join(format!(".{}.partial", name.to_string_lossy()));
    let committed = write_private(&staging, &bytes)
        .and_then(|()| std::fs::rename(&staging, path));
    if let Err(e) = committed {
        let _ = std::fs::remove_file(&staging);
        return Err(format!("Failed to save config to {}: {e}", path.display()));
    }
    Ok(())
}

/// Create `path` afresh (mode 0600 on Unix), write `bytes` and flush to disk.
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    // A leftover from an interrupted save may carry looser permissions
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

// ---------------------------------------------------------------------------
// AdminConfig
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Base URL of the admin API
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Sent as `x-auth-token`; the CLI equivalent of a logged-in browser session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Delay between job status checks
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Per-request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// How long a tool waits for the sidekick to publish its status
    #[serde(default = "default_sidekick_wait_ms")]
    pub sidekick_wait_ms: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Tools listed in the admin panel navigation
    #[serde(default = "default_tools")]
    pub tools: Vec<ToolEntry>,
}

fn default_api_base() -> String {
    "https://admin.hlx.page".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_sidekick_wait_ms() -> u64 {
    5000
}

fn default_tools() -> Vec<ToolEntry> {
    vec![
        ToolEntry::new("Bulk Status", crate::bulk_status::MODULE),
        ToolEntry::new("Log Viewer", crate::log_viewer::MODULE),
    ]
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            auth_token: None,
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            sidekick_wait_ms: default_sidekick_wait_ms(),
            retry: RetryPolicy::default(),
            tools: default_tools(),
        }
    }
}

impl AdminConfig {
    /// Base URL without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.api_base.trim_end_matches('/')
    }
}

pub(crate) fn admin_config_path() -> PathBuf {
    config_dir().join(ADMIN_CONFIG_FILE)
}

pub fn load_admin_config() -> AdminConfig {
    load_json_config(&admin_config_path())
}

pub fn save_admin_config(config: &AdminConfig) -> Result<(), String> {
    save_json_config(&admin_config_path(), config)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
