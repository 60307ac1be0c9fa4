use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vslot_common::vslot_config_dir;

use crate::host::{DisplayState, HostDisplayInfo};
use crate::table::TableOptions;
use crate::transform::ScaleLimits;

fn default_min_scale() -> f32 {
    0.1
}
fn default_max_scale() -> f32 {
    1.0
}
fn default_initial_scale() -> f32 {
    1.0
}
fn default_secure() -> bool {
    false
}
fn default_gesture_mode() -> bool {
    false
}

fn default_host_width() -> i32 {
    1080
}
fn default_host_height() -> i32 {
    2340
}
fn default_density_dpi() -> i32 {
    420
}
fn default_refresh_rate() -> f32 {
    60.0
}
fn default_presentation_deadline_nanos() -> i64 {
    0
}

fn default_surface_timeout_ms() -> u64 {
    5000
}

fn default_poll_interval_ms() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub host: HostConfig,
    pub watchdog: WatchdogConfig,
    pub ipc: IpcConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WindowConfig {
    #[serde(default = "default_min_scale")]
    pub min_scale: f32,

    #[serde(default = "default_max_scale")]
    pub max_scale: f32,

    #[serde(default = "default_initial_scale")]
    pub initial_scale: f32,

    #[serde(default = "default_secure")]
    pub secure: bool,

    #[serde(default = "default_gesture_mode")]
    pub gesture_mode: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            min_scale: default_min_scale(),
            max_scale: default_max_scale(),
            initial_scale: default_initial_scale(),
            secure: default_secure(),
            gesture_mode: default_gesture_mode(),
        }
    }
}

/// The display the headless backend pretends to be.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HostConfig {
    #[serde(default = "default_host_width")]
    pub width: i32,

    #[serde(default = "default_host_height")]
    pub height: i32,

    #[serde(default = "default_density_dpi")]
    pub density_dpi: i32,

    #[serde(default = "default_refresh_rate")]
    pub refresh_rate: f32,

    #[serde(default = "default_presentation_deadline_nanos")]
    pub presentation_deadline_nanos: i64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            width: default_host_width(),
            height: default_host_height(),
            density_dpi: default_density_dpi(),
            refresh_rate: default_refresh_rate(),
            presentation_deadline_nanos: default_presentation_deadline_nanos(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WatchdogConfig {
    /// 0 disables the check.
    #[serde(default = "default_surface_timeout_ms")]
    pub surface_timeout_ms: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            surface_timeout_ms: default_surface_timeout_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IpcConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let user_config = vslot_config_dir().join("config.toml");
        let system_config = PathBuf::from("/etc/vslot/config.toml");

        for path in [&user_config, &system_config] {
            if !path.exists() {
                continue;
            }
            match Self::load_from_path(path) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    return config;
                }
                Err(e) => {
                    log::warn!("Failed to load {}: {}", path.display(), e);
                }
            }
        }

        log::info!("Using default configuration");
        Self::default()
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("Failed to read file: {}", e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    pub fn scale_limits(&self) -> ScaleLimits {
        ScaleLimits::new(self.window.min_scale, self.window.max_scale)
    }

    pub fn table_options(&self) -> TableOptions {
        TableOptions {
            limits: self.scale_limits(),
            initial_scale: self.window.initial_scale,
            secure: self.window.secure,
            gesture_mode: self.window.gesture_mode,
        }
    }

    pub fn host_display_info(&self) -> HostDisplayInfo {
        HostDisplayInfo {
            id: 0,
            logical_width: self.host.width,
            logical_height: self.host.height,
            density_dpi: self.host.density_dpi,
            refresh_rate: self.host.refresh_rate,
            presentation_deadline_nanos: self.host.presentation_deadline_nanos,
            state: DisplayState::On,
        }
    }

    pub fn surface_timeout(&self) -> Option<Duration> {
        match self.watchdog.surface_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.ipc.poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.scale_limits(), ScaleLimits::new(0.1, 1.0));
        assert_eq!(config.host.width, 1080);
        assert_eq!(config.surface_timeout(), Some(Duration::from_millis(5000)));
        assert!(!config.window.gesture_mode);
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::parse(
            r#"
            [window]
            max_scale = 2.0
            gesture_mode = true

            [watchdog]
            surface_timeout_ms = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.window.min_scale, 0.1);
        assert_eq!(config.window.max_scale, 2.0);
        assert!(config.table_options().gesture_mode);
        assert_eq!(config.surface_timeout(), None);
        assert_eq!(config.ipc.poll_interval_ms, 10);
    }

    #[test]
    fn test_bad_scale_range_falls_back() {
        let config = Config::parse("[window]\nmin_scale = 3.0\nmax_scale = 1.0\n").unwrap();
        assert_eq!(config.scale_limits(), ScaleLimits::default());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::parse("[window\nmin_scale = ").is_err());
    }

    #[test]
    fn test_host_display_info() {
        let config = Config::parse("[host]\nwidth = 720\nheight = 1600\n").unwrap();
        let info = config.host_display_info();
        assert_eq!(info.logical_size(), (720, 1600));
        assert_eq!(info.state, DisplayState::On);
    }
}
