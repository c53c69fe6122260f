use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

use crate::chart::Palette;

pub const ENV_BACKEND_URL: &str = "TRUST_MONITOR_BACKEND_URL";
pub const ENV_TIMEOUT_SECS: &str = "TRUST_MONITOR_TIMEOUT_SECS";
pub const ENV_DEBUG: &str = "TRUST_MONITOR_DEBUG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub backend_url: String,
    pub request_timeout_secs: u64,
    pub palette: Palette,
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8000".into(),
            request_timeout_secs: 10,
            palette: Palette::default(),
            debug: false,
        }
    }
}

fn flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

impl Settings {
    /// Defaults, then the optional JSON file, then environment overrides.
    /// A missing file is fine; an unreadable or malformed one is not.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let settings = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => Self::default(),
        };
        settings.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        settings.validated()
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BACKEND_URL) {
            self.backend_url = url;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            self.request_timeout_secs = raw
                .trim()
                .parse()
                .with_context(|| format!("{ENV_TIMEOUT_SECS} must be a whole number, got '{raw}'"))?;
        }
        if let Some(raw) = lookup(ENV_DEBUG) {
            self.debug = flag(&raw);
        }
        self.validated()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn validated(self) -> Result<Self> {
        if self.backend_url.trim().is_empty() {
            bail!("backend_url must not be empty");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn missing_file_is_only_an_error_when_read_directly() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::from_file(&dir.path().join("absent.json"));
        assert!(settings.is_err());

        let settings = Settings::default().with_overrides(env(&[])).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn partial_file_keeps_defaults_for_other_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "backend_url": "http://trust.local:9000", "palette": ["red"] }"#)
            .unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.backend_url, "http://trust.local:9000");
        assert_eq!(settings.request_timeout_secs, 10);
        assert_eq!(settings.palette.color_at(3), "red");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(Settings::from_file(&path).is_err());

        fs::write(&path, r#"{ "palette": [] }"#).unwrap();
        assert!(Settings::from_file(&path).is_err());
    }

    #[test]
    fn environment_overrides_win() {
        let settings = Settings::default()
            .with_overrides(env(&[
                (ENV_BACKEND_URL, "http://10.0.0.5:8000"),
                (ENV_TIMEOUT_SECS, " 3 "),
                (ENV_DEBUG, "TRUE"),
            ]))
            .unwrap();

        assert_eq!(settings.backend_url, "http://10.0.0.5:8000");
        assert_eq!(settings.request_timeout(), Duration::from_secs(3));
        assert!(settings.debug);
    }

    #[test]
    fn invalid_overrides_are_rejected() {
        assert!(Settings::default()
            .with_overrides(env(&[(ENV_TIMEOUT_SECS, "soon")]))
            .is_err());
        assert!(Settings::default()
            .with_overrides(env(&[(ENV_TIMEOUT_SECS, "0")]))
            .is_err());
        assert!(Settings::default()
            .with_overrides(env(&[(ENV_BACKEND_URL, "  ")]))
            .is_err());
    }
}
