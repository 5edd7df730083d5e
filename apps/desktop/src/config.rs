use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use tracing::warn;
use url::Url;

pub const CONFIG_FILE: &str = "mapper.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub debounce_ms: u64,
    pub top_k: u32,
    pub request_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".into(),
            debounce_ms: 250,
            top_k: 5,
            request_timeout_secs: None,
        }
    }
}

impl Settings {
    pub fn base_url(&self) -> anyhow::Result<Url> {
        Url::parse(self.server_url.trim())
            .with_context(|| format!("invalid server url '{}'", self.server_url))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    server_url: Option<String>,
    debounce_ms: Option<u64>,
    top_k: Option<u32>,
    request_timeout_secs: Option<u64>,
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(CONFIG_FILE), |key| std::env::var(key).ok())
}

fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => apply_file(&mut settings, file_cfg),
            Err(err) => warn!(path = %path.display(), error = %err, "config: ignoring unreadable file"),
        }
    }

    if let Some(v) = env("MAPPER_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = env("APP__DEBOUNCE_MS") {
        match v.parse() {
            Ok(parsed) => settings.debounce_ms = parsed,
            Err(_) => warn!(value = %v, "config: APP__DEBOUNCE_MS is not a number"),
        }
    }
    if let Some(v) = env("APP__TOP_K") {
        match v.parse() {
            Ok(parsed) => settings.top_k = parsed,
            Err(_) => warn!(value = %v, "config: APP__TOP_K is not a number"),
        }
    }
    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        match v.parse() {
            Ok(parsed) => settings.request_timeout_secs = Some(parsed),
            Err(_) => warn!(value = %v, "config: APP__REQUEST_TIMEOUT_SECS is not a number"),
        }
    }

    settings
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file_cfg.debounce_ms {
        settings.debounce_ms = v;
    }
    if let Some(v) = file_cfg.top_k {
        settings.top_k = v;
    }
    if file_cfg.request_timeout_secs.is_some() {
        settings.request_timeout_secs = file_cfg.request_timeout_secs;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    fn scratch_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("mapper-{}-{name}", std::process::id()));
        fs::write(&path, contents).expect("write config");
        path
    }

    #[test]
    fn defaults_apply_without_file_or_env() {
        let settings = load_settings_from(Path::new("/nonexistent/mapper.toml"), env_from(&[]));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.debounce(), Duration::from_millis(250));
        assert_eq!(settings.request_timeout(), None);
        assert_eq!(
            settings.base_url().expect("url").as_str(),
            "http://127.0.0.1:8000/"
        );
    }

    #[test]
    fn file_values_are_overridden_by_env() {
        let path = scratch_file(
            "override.toml",
            "server_url = \"http://mapper.internal:9000\"\ndebounce_ms = 400\ntop_k = 8\n",
        );
        let settings = load_settings_from(
            &path,
            env_from(&[("APP__SERVER_URL", "http://10.0.0.5:8000"), ("APP__TOP_K", "3")]),
        );
        let _ = fs::remove_file(&path);

        assert_eq!(settings.server_url, "http://10.0.0.5:8000");
        assert_eq!(settings.debounce_ms, 400);
        assert_eq!(settings.top_k, 3);
    }

    #[test]
    fn app_prefixed_url_wins_over_plain_one() {
        let settings = load_settings_from(
            Path::new("/nonexistent/mapper.toml"),
            env_from(&[
                ("MAPPER_SERVER_URL", "http://a:1"),
                ("APP__SERVER_URL", "http://b:2"),
                ("APP__REQUEST_TIMEOUT_SECS", "30"),
            ]),
        );
        assert_eq!(settings.server_url, "http://b:2");
        assert_eq!(settings.request_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn malformed_inputs_keep_previous_values() {
        let path = scratch_file("broken.toml", "debounce_ms = \"soon\"\n");
        let settings = load_settings_from(&path, env_from(&[("APP__DEBOUNCE_MS", "fast")]));
        let _ = fs::remove_file(&path);

        assert_eq!(settings.debounce_ms, 250);
    }

    #[test]
    fn unparsable_url_is_an_error() {
        let settings = Settings {
            server_url: "not a url".into(),
            ..Settings::default()
        };
        assert!(settings.base_url().is_err());
    }
}
