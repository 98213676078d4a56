use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use serde::Deserialize;
use session_core::{ControllerSettings, EndpointPaths};
use url::Url;

pub const CONFIG_FILE_NAME: &str = "console.toml";
const CONFIG_DIR_NAME: &str = "workflowgen";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub upload_path: String,
    pub documents_path: String,
    pub ask_path: String,
    pub summarize_path: String,
    pub request_timeout_secs: u64,
    pub upload_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        let endpoints = EndpointPaths::default();
        Self {
            api_base_url: "http://127.0.0.1:8000/api".into(),
            upload_path: endpoints.upload,
            documents_path: endpoints.documents,
            ask_path: endpoints.ask,
            summarize_path: endpoints.summarize,
            request_timeout_secs: 120,
            upload_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    upload_path: Option<String>,
    documents_path: Option<String>,
    ask_path: Option<String>,
    summarize_path: Option<String>,
    request_timeout_secs: Option<u64>,
    upload_timeout_secs: Option<u64>,
}

impl Settings {
    pub fn endpoints(&self) -> EndpointPaths {
        EndpointPaths {
            upload: self.upload_path.clone(),
            documents: self.documents_path.clone(),
            ask: self.ask_path.clone(),
            summarize: self.summarize_path.clone(),
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            upload_timeout: Duration::from_secs(self.upload_timeout_secs),
        }
    }

    /// Checks the base url and timeouts, and makes every endpoint path absolute.
    pub fn validate(mut self) -> anyhow::Result<Self> {
        let parsed = Url::parse(self.api_base_url.trim())
            .with_context(|| format!("invalid api_base_url '{}'", self.api_base_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("api_base_url must start with http:// or https://");
        }
        self.api_base_url = self.api_base_url.trim().trim_end_matches('/').to_string();

        for path in [
            &mut self.upload_path,
            &mut self.documents_path,
            &mut self.ask_path,
            &mut self.summarize_path,
        ] {
            *path = normalize_endpoint_path(path)?;
        }

        if self.request_timeout_secs == 0 || self.upload_timeout_secs == 0 {
            bail!("timeouts must be at least one second");
        }
        Ok(self)
    }
}

fn normalize_endpoint_path(raw: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "/" {
        bail!("endpoint path must not be empty");
    }
    if trimmed.starts_with('/') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("/{trimmed}"))
    }
}

/// Layers defaults, the TOML file and environment variables, then validates.
pub fn load_settings(explicit_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if let Some(path) = resolve_config_path(explicit_path)? {
        apply_file_settings(&mut settings, &path)?;
    }
    apply_env_overrides(&mut settings, |name| std::env::var(name).ok());

    settings.validate()
}

fn resolve_config_path(explicit_path: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = explicit_path {
        if !path.exists() {
            bail!("config file '{}' does not exist", path.display());
        }
        return Ok(Some(path.to_path_buf()));
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Ok(Some(local));
    }

    Ok(dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
        .filter(|path| path.exists()))
}

pub(crate) fn apply_file_settings(settings: &mut Settings, path: &Path) -> anyhow::Result<()> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path.display()))?;
    let file_cfg: FileSettings = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config file '{}'", path.display()))?;

    if let Some(v) = file_cfg.api_base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = file_cfg.upload_path {
        settings.upload_path = v;
    }
    if let Some(v) = file_cfg.documents_path {
        settings.documents_path = v;
    }
    if let Some(v) = file_cfg.ask_path {
        settings.ask_path = v;
    }
    if let Some(v) = file_cfg.summarize_path {
        settings.summarize_path = v;
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file_cfg.upload_timeout_secs {
        settings.upload_timeout_secs = v;
    }
    Ok(())
}

pub(crate) fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("WORKFLOWGEN_API_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = lookup("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = lookup("APP__ASK_PATH") {
        settings.ask_path = v;
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }
    if let Some(v) = lookup("APP__UPLOAD_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.upload_timeout_secs = parsed;
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
