//! Configuration loading.
//!
//! Types live in [`of_core::config`]; this module reads them from TOML and
//! rejects values the pipeline cannot run with.

pub use of_core::config::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./overlayforge.toml",
        "~/.config/overlayforge/config.toml",
        "/etc/overlayforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Hard validation; soft issues are only logged.
fn validate_config(config: &Config) -> Result<()> {
    let policy = &config.policy;

    if policy.fps_cap == 0 {
        anyhow::bail!("policy.fps_cap cannot be 0");
    }
    if policy.size_cap_bytes == 0 {
        anyhow::bail!("policy.size_cap_bytes cannot be 0");
    }
    if policy.fallback_dimension_px == 0 {
        anyhow::bail!("policy.fallback_dimension_px cannot be 0");
    }
    if !(policy.default_loop_secs.is_finite() && policy.default_loop_secs > 0.0) {
        anyhow::bail!(
            "policy.default_loop_secs must be a positive number of seconds, got {}",
            policy.default_loop_secs
        );
    }
    if config.tools.probe_timeout_secs == 0 || config.tools.transcode_timeout_secs == 0 {
        anyhow::bail!("tool timeouts cannot be 0");
    }
    if config.fetch.max_download_bytes == 0 {
        anyhow::bail!("fetch.max_download_bytes cannot be 0");
    }

    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    Ok(())
}
