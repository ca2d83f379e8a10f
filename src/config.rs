//! Viewer configuration: an optional JSON file next to the executable.
//! Missing file means defaults; a malformed file is logged and ignored.

use crate::render::RenderParameters;
use std::path::Path;

pub const CONFIG_FILE: &str = "glbview.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub asset_path: String,
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub highlight_duration_ms: u64,
    pub highlight_color: [f32; 3],
    pub params: RenderParameters,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            asset_path: "scene.glb".to_string(),
            window_title: "glbview".to_string(),
            window_width: 1280,
            window_height: 720,
            highlight_duration_ms: 1000,
            // 0xff6b6b
            highlight_color: [1.0, 107.0 / 255.0, 107.0 / 255.0],
            params: RenderParameters::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<ViewerConfig, ConfigError> {
    let json = std::fs::read_to_string(path)?;
    let config: ViewerConfig = serde_json::from_str(&json)?;
    Ok(config)
}

/// Defaults when the file is absent; logged defaults when it is malformed.
pub fn load_config_or_default(path: &Path) -> ViewerConfig {
    match load_config(path) {
        Ok(config) => config,
        Err(ConfigError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            ViewerConfig::default()
        }
        Err(err) => {
            log::warn!("Ignoring config {}: {err}", path.display());
            ViewerConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ToneMapping;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("glbview_{}_{}_{}", name, std::process::id(), nonce))
    }

    #[test]
    fn roundtrip_via_file() {
        let mut config = ViewerConfig::default();
        config.asset_path = "models/helmet.glb".to_string();
        config.params.tone_mapping = ToneMapping::FilmicAces;
        config.params.exposure = 1.8;

        let path = temp_path("roundtrip.json");
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
        let loaded = load_config(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_config_or_default(Path::new("/nonexistent/glbview.json"));
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let path = temp_path("malformed.json");
        std::fs::write(&path, "{ not json").unwrap();
        let config = load_config_or_default(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let path = temp_path("partial.json");
        std::fs::write(&path, r#"{ "asset_path": "duck.glb" }"#).unwrap();
        let config = load_config(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(config.asset_path, "duck.glb");
        assert_eq!(config.window_width, 1280);
        assert_eq!(config.params, RenderParameters::default());
    }
}
