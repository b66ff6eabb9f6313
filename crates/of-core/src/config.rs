//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized (from TOML by the binary)
//! and carries all sub-configs. Every section defaults sensibly so a
//! completely empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::media::{OverlaySpeed, DEFAULT_FPS, FALLBACK_DIMENSION_PX};

/// 15 MiB.
pub const DEFAULT_SIZE_CAP_BYTES: u64 = 15 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub overlay: OverlayConfig,
    pub policy: PolicyConfig,
    pub tools: ToolsConfig,
    pub fetch: FetchConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !self.overlay.path.exists() {
            warnings.push(format!(
                "overlay.path {} does not exist; every job will fail to transcode",
                self.overlay.path.display()
            ));
        }

        if self.policy.min_fps > self.policy.fps_cap {
            warnings.push(format!(
                "policy.min_fps ({}) is above policy.fps_cap ({}); output will use the cap",
                self.policy.min_fps, self.policy.fps_cap
            ));
        }

        if self.policy.size_cap_bytes < 1024 * 1024 {
            warnings.push(format!(
                "policy.size_cap_bytes is only {} bytes; most jobs will exceed it",
                self.policy.size_cap_bytes
            ));
        }

        if self.tools.transcode_timeout_secs < 10 {
            warnings.push(
                "tools.transcode_timeout_secs is under 10s; longer inputs will time out".into(),
            );
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// The secondary animation composited onto every input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub path: PathBuf,
    pub default_speed: OverlaySpeed,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("overlay.gif"),
            default_speed: OverlaySpeed::default(),
        }
    }
}

/// Composition policy constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Output length when the input has no usable duration.
    pub default_loop_secs: f64,
    /// Upper bound on the output frame rate.
    pub fps_cap: u32,
    /// Frame rate floor, also used when the input reports none.
    pub min_fps: u32,
    /// Hard ceiling on the produced artifact.
    pub size_cap_bytes: u64,
    /// Dimensions assumed for inputs without a visual stream.
    pub fallback_dimension_px: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            default_loop_secs: 10.0,
            fps_cap: 60,
            min_fps: DEFAULT_FPS as u32,
            size_cap_bytes: DEFAULT_SIZE_CAP_BYTES,
            fallback_dimension_px: FALLBACK_DIMENSION_PX,
        }
    }
}

/// Paths and budgets for external CLI tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub probe_timeout_secs: u64,
    pub transcode_timeout_secs: u64,
}

impl ToolsConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn transcode_timeout(&self) -> Duration {
        Duration::from_secs(self.transcode_timeout_secs)
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            probe_timeout_secs: 30,
            transcode_timeout_secs: 300,
        }
    }
}

/// Source retrieval limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_download_bytes: u64,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            max_download_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Where the command-line gateway writes finished artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_reference_behaviour() {
        let policy = PolicyConfig::default();
        assert_eq!(policy.default_loop_secs, 10.0);
        assert_eq!(policy.fps_cap, 60);
        assert_eq!(policy.min_fps, 30);
        assert_eq!(policy.size_cap_bytes, 15 * 1024 * 1024);
        assert_eq!(policy.fallback_dimension_px, 500);
    }

    #[test]
    fn default_tool_budgets() {
        let tools = ToolsConfig::default();
        assert_eq!(tools.probe_timeout(), Duration::from_secs(30));
        assert_eq!(tools.transcode_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn parse_json_config() {
        let json = r#"{"policy": {"fps_cap": 30}, "overlay": {"default_speed": 1.5}}"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.policy.fps_cap, 30);
        assert_eq!(cfg.policy.size_cap_bytes, DEFAULT_SIZE_CAP_BYTES);
        assert_eq!(cfg.overlay.default_speed.get(), 1.5);
    }

    #[test]
    fn out_of_range_speed_is_rejected() {
        let json = r#"{"overlay": {"default_speed": 10.0}}"#;
        assert!(serde_json::from_str::<Config>(json).is_err());
    }

    #[test]
    fn missing_overlay_warns() {
        let mut cfg = Config::default();
        cfg.overlay.path = PathBuf::from("/nonexistent/overlay.gif");
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("overlay.path")));
    }

    #[test]
    fn inverted_fps_bounds_warn() {
        let mut cfg = Config::default();
        cfg.overlay.path = std::env::temp_dir();
        cfg.policy.min_fps = 90;
        let warnings = cfg.validate();
        assert!(warnings.iter().any(|w| w.contains("min_fps")));
    }
}
