use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

pub const HOSTED_API_URL: &str = "https://vibe-todo-backend-msy-a2473d9a7497.herokuapp.com/todos";
pub const FALLBACK_LOCAL_URL: &str = "http://localhost:5003/api/todos";

/// Environment override for the API URL, read by the CLI.
pub const API_URL_ENV: &str = "VIBETODO_API_URL";

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("vibetodo")
        .join("config.json")
}

fn default_realtime_store_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("vibetodo")
        .join("realtime.json")
}

fn default_ports() -> Vec<u16> {
    vec![5003, 5001, 5000, 3000, 3001, 8000]
}

fn default_paths() -> Vec<String> {
    vec!["/api/todos".into(), "/todos".into()]
}

/// Which backend strategy to talk to.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The hosted REST API.
    #[default]
    Hosted,
    /// A REST API at a saved local URL.
    Local,
    /// A local REST API found by probing candidate ports and paths.
    Auto,
    /// A keyed collection with live snapshots, kept in a local file.
    Realtime,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hosted => "hosted",
            Self::Local => "local",
            Self::Auto => "auto",
            Self::Realtime => "realtime",
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct ProbeSettings {
    pub host: String,
    /// Tried in order; the first acceptable one wins.
    pub ports: Vec<u16>,
    pub paths: Vec<String>,
    pub timeout_ms: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            ports: default_ports(),
            paths: default_paths(),
            timeout_ms: 2000,
        }
    }
}

impl ProbeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct TodoConfig {
    pub backend: BackendKind,
    /// Saved URL for [`BackendKind::Local`].
    pub api_url: Option<String>,
    pub debug_logging: bool,
    pub probe: ProbeSettings,
}

impl TodoConfig {
    pub fn path() -> PathBuf {
        default_config_path()
    }

    /// Where the realtime collection keeps its entries between runs.
    pub fn realtime_store_path() -> PathBuf {
        default_realtime_store_path()
    }

    /// Read the saved preferences. A missing or unreadable file yields defaults.
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!("Ignoring unreadable config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// A local preference without a URL is not usable; fall back to hosted.
    /// Returns true when the preference was rewritten and should be saved.
    pub fn normalize(&mut self) -> bool {
        let usable_local = self
            .api_url
            .as_deref()
            .is_some_and(|u| !u.trim().is_empty());
        if self.backend == BackendKind::Local && !usable_local {
            log::info!("No saved local URL, using the hosted backend");
            self.backend = BackendKind::Hosted;
            self.api_url = None;
            return true;
        }
        false
    }

    /// Persist a backend choice. `local` without a URL uses [`FALLBACK_LOCAL_URL`].
    pub fn set_backend(&mut self, backend: BackendKind, url: Option<String>) {
        self.backend = backend;
        self.api_url = match backend {
            BackendKind::Local => Some(
                url.map(|u| u.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| FALLBACK_LOCAL_URL.to_string()),
            ),
            _ => None,
        };
    }

    /// The REST URL for the static strategies. An external override wins,
    /// then a saved local URL, then the hosted endpoint.
    pub fn rest_url(&self, override_url: Option<&str>) -> String {
        if let Some(url) = override_url.map(str::trim).filter(|u| !u.is_empty()) {
            return url.trim_end_matches('/').to_string();
        }
        match (self.backend, self.api_url.as_deref()) {
            (BackendKind::Local, Some(url)) if !url.trim().is_empty() => {
                url.trim_end_matches('/').to_string()
            }
            _ => HOSTED_API_URL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_hosted() {
        let config = TodoConfig::default();
        assert_eq!(config.backend, BackendKind::Hosted);
        assert_eq!(config.rest_url(None), HOSTED_API_URL);
    }

    #[test]
    fn override_wins_over_saved_local() {
        let mut config = TodoConfig::default();
        config.set_backend(BackendKind::Local, Some("http://localhost:3000/api/todos/".into()));
        assert_eq!(config.rest_url(None), "http://localhost:3000/api/todos");
        assert_eq!(
            config.rest_url(Some("http://127.0.0.1:9999/todos")),
            "http://127.0.0.1:9999/todos"
        );
        assert_eq!(config.rest_url(Some("  ")), "http://localhost:3000/api/todos");
    }

    #[test]
    fn local_without_url_falls_back_to_hosted() {
        let mut config = TodoConfig {
            backend: BackendKind::Local,
            api_url: None,
            ..Default::default()
        };
        assert!(config.normalize());
        assert_eq!(config.backend, BackendKind::Hosted);
        assert!(!config.normalize());
    }

    #[test]
    fn use_local_defaults_to_fallback_url() {
        let mut config = TodoConfig::default();
        config.set_backend(BackendKind::Local, None);
        assert_eq!(config.api_url.as_deref(), Some(FALLBACK_LOCAL_URL));
        config.set_backend(BackendKind::Hosted, None);
        assert_eq!(config.api_url, None);
    }

    #[test]
    fn round_trips_through_disk_and_tolerates_garbage() {
        let dir = std::env::temp_dir().join(format!("vibetodo-config-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.json");

        let mut config = TodoConfig::default();
        config.set_backend(BackendKind::Auto, None);
        config.probe.ports = vec![4000];
        config.save_to(&path).unwrap();
        assert_eq!(TodoConfig::load_from(&path), config);

        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(TodoConfig::load_from(&path), TodoConfig::default());

        let partial = r#"{ "backend": "realtime" }"#;
        std::fs::write(&path, partial).unwrap();
        let loaded = TodoConfig::load_from(&path);
        assert_eq!(loaded.backend, BackendKind::Realtime);
        assert_eq!(loaded.probe, ProbeSettings::default());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
