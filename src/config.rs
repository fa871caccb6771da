use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    pub model: String,
    /// JPEG compression quality (1–100).
    pub jpeg_quality: u8,
    /// Captured frames wider than this are downscaled before encoding.
    pub max_frame_width: u32,
    /// Bounded wait before capture so a fresh stream can paint a frame.
    pub warmup_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com".into(),
            api_key: String::new(),
            model: "gemini-2.0-flash".into(),
            jpeg_quality: 75,
            max_frame_width: 1024,
            warmup_ms: 100,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
        toml::from_str(&content).map_err(|e| e.to_string())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), String> {
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(path.as_ref(), content).map_err(|e| e.to_string())?;
        log::info!("Settings saved to {}", path.as_ref().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let s = Settings::default();
        assert_eq!(s.model, "gemini-2.0-flash");
        assert_eq!(s.jpeg_quality, 75);
        assert_eq!(s.max_frame_width, 1024);
        assert_eq!(s.warmup_ms, 100);
        assert!(s.api_key.is_empty());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let s = Settings::load("/nonexistent/posture-vision-settings.toml").unwrap();
        assert_eq!(s.model, Settings::default().model);
    }

    #[test]
    fn toml_round_trip() {
        let mut s = Settings::default();
        s.api_key = "k".into();
        s.warmup_ms = 250;
        let text = toml::to_string_pretty(&s).unwrap();
        let back: Settings = toml::from_str(&text).unwrap();
        assert_eq!(back.warmup_ms, 250);
        assert_eq!(back.api_key, "k");
    }

    #[test]
    fn api_key_defaults_when_absent() {
        let text = r#"
            endpoint = "https://example.test"
            model = "gemini-2.0-flash"
            jpegQuality = 80
            maxFrameWidth = 800
            warmupMs = 50
        "#;
        let s: Settings = toml::from_str(text).unwrap();
        assert!(s.api_key.is_empty());
        assert_eq!(s.jpeg_quality, 80);
    }
}
