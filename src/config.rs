// Settings: defaults, then crm.toml, then CRM_* environment variables.
// CLI flags are applied last by the binaries.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::customer::DEFAULT_AVATAR_BASE_URL;
use crate::error::CrmError;

/// Settings file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "crm.toml";

/// Which view the terminal UI opens on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartPage {
    #[default]
    Funnel,
    Customers,
}

impl FromStr for StartPage {
    type Err = CrmError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "funnel" => Ok(StartPage::Funnel),
            "customers" | "table" => Ok(StartPage::Customers),
            other => Err(CrmError::Config(format!("unknown start page: {}", other))),
        }
    }
}

/// Where status changes go after the local mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Accept every change, persist nothing
    #[default]
    Local,
    /// Reject every save so each change surfaces a failure notification
    Offline,
}

impl FromStr for BackendKind {
    type Err = CrmError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "local" | "local-only" => Ok(BackendKind::Local),
            "offline" | "unavailable" => Ok(BackendKind::Offline),
            other => Err(CrmError::Config(format!("unknown backend: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub bind_addr: String,
    pub seed_file: Option<PathBuf>,
    pub avatar_base_url: String,
    pub log_filter: String,
    pub log_file: Option<PathBuf>,
    pub start_page: StartPage,
    pub backend: BackendKind,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".into(),
            seed_file: None,
            avatar_base_url: DEFAULT_AVATAR_BASE_URL.into(),
            log_filter: "info".into(),
            log_file: None,
            start_page: StartPage::Funnel,
            backend: BackendKind::Local,
        }
    }
}

impl Settings {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse settings")
    }

    /// Apply `CRM_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CRM_BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Some(v) = lookup("CRM_SEED_FILE") {
            self.seed_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("CRM_AVATAR_URL") {
            self.avatar_base_url = v;
        }
        if let Some(v) = lookup("CRM_LOG") {
            self.log_filter = v;
        }
        if let Some(v) = lookup("CRM_LOG_FILE") {
            self.log_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("CRM_START_PAGE") {
            self.start_page = v.parse()?;
        }
        if let Some(v) = lookup("CRM_BACKEND") {
            self.backend = v.parse()?;
        }
        Ok(())
    }
}

/// Load settings from `path` (must exist) or from `crm.toml` if present,
/// then apply environment overrides.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let mut settings = match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            Settings::from_toml(&raw).with_context(|| format!("Invalid config file: {:?}", path))?
        }
        None => match fs::read_to_string(DEFAULT_CONFIG_FILE) {
            Ok(raw) => Settings::from_toml(&raw)
                .with_context(|| format!("Invalid config file: {}", DEFAULT_CONFIG_FILE))?,
            Err(_) => Settings::default(),
        },
    };

    settings.apply_env(|key| std::env::var(key).ok())?;
    Ok(settings)
}
