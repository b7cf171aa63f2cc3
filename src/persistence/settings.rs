use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    // If None, use the OS default slot directory
    pub slot_override: Option<PathBuf>,
    // Operation-log capacity before eviction kicks in
    #[serde(default = "EngineSettings::default_max_history")]
    pub max_history: usize,
    // Minimum interval between undo/redo triggers
    #[serde(default = "EngineSettings::default_undo_throttle_ms")]
    pub undo_throttle_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            slot_override: None,
            max_history: Self::default_max_history(),
            undo_throttle_ms: Self::default_undo_throttle_ms(),
        }
    }
}

impl EngineSettings {
    fn config_dir() -> PathBuf {
        // Cross-platform user config dir
        #[cfg(target_os = "macos")]
        {
            // ~/Library/Application Support/Pathflow
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join("Library").join("Application Support").join("Pathflow");
        }
        #[cfg(target_os = "windows")]
        {
            // %APPDATA%\Pathflow
            if let Ok(appdata) = std::env::var("APPDATA") {
                return PathBuf::from(appdata).join("Pathflow");
            }
            return PathBuf::from("Pathflow");
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            // $XDG_CONFIG_HOME/Pathflow or ~/.config/Pathflow
            if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
                return PathBuf::from(xdg).join("Pathflow");
            }
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("~"));
            return home.join(".config").join("Pathflow");
        }
    }

    fn slot_default_dir() -> PathBuf {
        // Cross-platform user-writable dir for flow slots
        #[cfg(target_os = "macos")]
        {
            let tmp = std::env::var_os("TMPDIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/tmp"));
            return tmp.join("Pathflow");
        }
        #[cfg(target_os = "windows")]
        {
            // %LOCALAPPDATA%\Pathflow\Slots else TEMP
            if let Ok(local) = std::env::var("LOCALAPPDATA") {
                return PathBuf::from(local).join("Pathflow").join("Slots");
            }
            if let Ok(temp) = std::env::var("TEMP") {
                return PathBuf::from(temp).join("Pathflow");
            }
            return PathBuf::from("Pathflow");
        }
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            // $XDG_STATE_HOME/pathflow or ~/.local/state/pathflow, else /tmp/Pathflow
            if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
                return PathBuf::from(xdg).join("pathflow");
            }
            if let Ok(home) = std::env::var("HOME") {
                return PathBuf::from(home).join(".local").join("state").join("pathflow");
            }
            return PathBuf::from("/tmp").join("Pathflow");
        }
    }

    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_dir().join("settings.json");
        if path.exists() {
            let mut f = std::fs::File::open(path)?;
            let mut s = String::new();
            f.read_to_string(&mut s)?;
            let v: Self = serde_json::from_str(&s)?;
            return Ok(v);
        }
        Ok(Self::default())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let dir = Self::config_dir();
        fs::create_dir_all(&dir)?;
        let path = dir.join("settings.json");
        let s = serde_json::to_string_pretty(self)?;
        let mut f = std::fs::File::create(path)?;
        f.write_all(s.as_bytes())?;
        Ok(())
    }

    // Effective slot directory honoring user override
    pub fn slot_dir(&self) -> PathBuf {
        if let Some(p) = &self.slot_override { return p.clone(); }
        Self::slot_default_dir()
    }

    /// Return the directory where the settings file (settings.json) is stored.
    /// This is OS-specific and resolves to a per-user configuration directory.
    pub fn settings_dir() -> PathBuf {
        Self::config_dir()
    }

    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.undo_throttle_ms)
    }

    pub(crate) fn default_max_history() -> usize {
        crate::history::session::DEFAULT_MAX_HISTORY
    }

    pub(crate) fn default_undo_throttle_ms() -> u64 {
        crate::history::throttle::TriggerThrottle::DEFAULT_INTERVAL.as_millis() as u64
    }
}
