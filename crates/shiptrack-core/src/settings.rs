//! Versioned user settings stored as YAML
//!
//! ```yaml
//! version: 1
//! source_repos:
//!   - repo: acme/app
//!     target_branch: main
//!     workflow_id: release.yml
//! deployment_repos:
//!   - repo: acme/mobile-deploy
//!     local_path: /home/me/src/mobile-deploy
//!     env_branch: staging
//! web_target:
//!   repo: acme/web-values
//!   base_branch: main
//! notifications:
//!   comments: false
//! refresh_interval_secs: 300
//! ```

use crate::coordination::driver::DriverConfig;
use crate::coordination::signals::NotificationPrefs;
use crate::error::{Error, Result};
use crate::types::{DeployTriggerConfig, DeploymentRepoConfig, RepoId, SourceRepoConfig, WebDeployTarget};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Current settings schema version
pub const SETTINGS_VERSION: u32 = 1;

/// Lower bound for the periodic refresh interval
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 30;

fn default_version() -> u32 {
    SETTINGS_VERSION
}

fn default_refresh_interval() -> u64 {
    300
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub source_repos: Vec<SourceRepoConfig>,
    #[serde(default)]
    pub deployment_repos: Vec<DeploymentRepoConfig>,
    #[serde(default)]
    pub web_target: Option<WebDeployTarget>,
    #[serde(default)]
    pub deploy_trigger: Option<DeployTriggerConfig>,
    #[serde(default)]
    pub notifications: NotificationPrefs,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            source_repos: Vec::new(),
            deployment_repos: Vec::new(),
            web_target: None,
            deploy_trigger: None,
            notifications: NotificationPrefs::default(),
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

/// Keep the last entry for each repo, in last-occurrence order
fn dedupe_last_wins<T, F>(entries: &mut Vec<T>, repo_of: F)
where
    F: Fn(&T) -> &RepoId,
{
    let mut kept: Vec<T> = Vec::with_capacity(entries.len());
    for entry in entries.drain(..).rev() {
        if !kept.iter().any(|k| repo_of(k) == repo_of(&entry)) {
            kept.push(entry);
        }
    }
    kept.reverse();
    *entries = kept;
}

fn upsert<T, F>(entries: &mut Vec<T>, entry: T, repo_of: F)
where
    F: Fn(&T) -> &RepoId,
{
    match entries.iter_mut().find(|e| repo_of(e) == repo_of(&entry)) {
        Some(slot) => *slot = entry,
        None => entries.push(entry),
    }
}

impl Settings {
    /// `{config_dir}/shiptrack/settings.yaml`
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| Error::Config("no per-user config directory".to_string()))?;
        Ok(base.join("shiptrack").join("settings.yaml"))
    }

    /// Parse settings text.
    ///
    /// A different schema version yields defaults; duplicated repos keep
    /// their last entry.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut settings: Settings = serde_yaml::from_str(yaml)?;
        if settings.version != SETTINGS_VERSION {
            warn!(
                found = settings.version,
                expected = SETTINGS_VERSION,
                "Ignoring settings with unknown schema version"
            );
            return Ok(Self::default());
        }
        dedupe_last_wins(&mut settings.source_repos, |c| &c.repo);
        dedupe_last_wins(&mut settings.deployment_repos, |c| &c.repo);
        Ok(settings)
    }

    /// Load from `path`; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => Ok(Self::default()),
            Ok(text) => Self::from_yaml(&text).map_err(|e| {
                Error::Config(format!("Failed to parse '{}': {}", path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    pub fn upsert_source_repo(&mut self, config: SourceRepoConfig) {
        upsert(&mut self.source_repos, config, |c| &c.repo);
    }

    pub fn upsert_deployment_repo(&mut self, config: DeploymentRepoConfig) {
        upsert(&mut self.deployment_repos, config, |c| &c.repo);
    }

    pub fn source_repo(&self, repo: &RepoId) -> Option<&SourceRepoConfig> {
        self.source_repos.iter().find(|c| &c.repo == repo)
    }

    pub fn deployment_repo(&self, repo: &RepoId) -> Option<&DeploymentRepoConfig> {
        self.deployment_repos.iter().find(|c| &c.repo == repo)
    }

    /// Periodic refresh interval, clamped to a sane minimum
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(MIN_REFRESH_INTERVAL_SECS))
    }

    /// Resolver inputs for the sync driver
    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            source_repos: self.source_repos.clone(),
            notifications: self.notifications,
        }
    }
}
