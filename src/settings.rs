use serde::Deserialize;

use crate::error::AssetError;

fn default_max_upload_passes() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

/// Knobs for [`crate::AssetsManager::preload`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreloadSettings {
    /// Passes run before giving up with [`AssetError::RecursionLimit`].
    pub max_upload_passes: u32,
    /// Whether tile maps queue their external tilesets and images.
    pub resolve_map_dependencies: bool,
}

impl Default for PreloadSettings {
    fn default() -> Self {
        Self {
            max_upload_passes: default_max_upload_passes(),
            resolve_map_dependencies: default_true(),
        }
    }
}

impl PreloadSettings {
    /// Reads settings from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, AssetError> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| AssetError::InvalidInput(format!("preload settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Rejects a zero pass budget.
    pub fn validate(&self) -> Result<(), AssetError> {
        if self.max_upload_passes == 0 {
            return Err(AssetError::InvalidInput(
                "max_upload_passes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
