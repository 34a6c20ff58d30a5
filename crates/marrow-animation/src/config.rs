//! TOML-based runtime configuration loading

use crate::blend::BlendConfig;
use crate::mixer::MixerConfig;
use marrow_core::{MarrowError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for blending and mixing. Every field has a default, so an empty
/// document is a valid configuration.
///
/// ```toml
/// [blend]
/// weight_epsilon = 0.0001
/// zero_weight_fallback = "BindPose"
///
/// [mixer]
/// speed = 1.0
/// default_fade_out = 0.25
///
/// [mixer.default_control]
/// type = "Repeat"
/// [mixer.default_control.inner]
/// type = "Linear"
/// slope = 1.0
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub blend: BlendConfig,
    pub mixer: MixerConfig,
}

impl AnimationConfig {
    pub fn validate(&self) -> Result<()> {
        let eps = self.blend.weight_epsilon;
        if !eps.is_finite() || eps < 0.0 {
            return Err(MarrowError::ConfigError(format!(
                "blend.weight_epsilon must be a non-negative number, got {}",
                eps
            )));
        }
        if !self.mixer.speed.is_finite() {
            return Err(MarrowError::ConfigError(format!(
                "mixer.speed must be finite, got {}",
                self.mixer.speed
            )));
        }
        let fade = self.mixer.default_fade_out;
        if !fade.is_finite() || fade < 0.0 {
            return Err(MarrowError::ConfigError(format!(
                "mixer.default_fade_out must be a non-negative number of seconds, got {}",
                fade
            )));
        }
        Ok(())
    }
}

/// Load and validate a configuration from a `.toml` file.
pub fn load_config_from_file(path: impl AsRef<Path>) -> Result<AnimationConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let config = load_config_from_str(&content).map_err(|e| match e {
        MarrowError::TomlParseError(msg) => {
            MarrowError::TomlParseError(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })?;
    log::debug!("Loaded animation config from {}", path.display());
    Ok(config)
}

/// Parse and validate a configuration from TOML text.
pub fn load_config_from_str(content: &str) -> Result<AnimationConfig> {
    let config: AnimationConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}
