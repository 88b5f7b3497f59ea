use crate::debsnap::fetch::{Selector, decompressor_for};
use crate::debsnap::http::DEFAULT_ARCHIVE_URL;
use crate::debsnap::store::Identity;
use crate::debsnap::walker::WalkPlan;
use anyhow::{Result, anyhow};
use chrono::Duration;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const MAX_LOOKBACK_DAYS: u64 = 36_500;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveSection {
    pub base_url: String,
    pub distribution: String,
    pub component: String,
    pub architecture: String,
    pub compression: String,
    pub timeout_secs: u64,
}

impl Default for ArchiveSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ARCHIVE_URL.to_string(),
            distribution: "sid".to_string(),
            component: "main".to_string(),
            architecture: "amd64".to_string(),
            compression: "xz".to_string(),
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkSection {
    pub step_secs: u64,
    pub lookback_days: u64,
}

impl Default for WalkSection {
    fn default() -> Self {
        Self {
            step_secs: 21_600,
            lookback_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoSection {
    pub path: PathBuf,
    pub author_name: String,
    pub author_email: String,
}

impl Default for RepoSection {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            path: home.join("debsnap-archive"),
            author_name: "debsnap".to_string(),
            author_email: "debsnap@localhost".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DebsnapConfig {
    pub archive: ArchiveSection,
    pub walk: WalkSection,
    pub repo: RepoSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialDebsnapConfig {
    archive: Option<ArchiveSection>,
    walk: Option<WalkSection>,
    repo: Option<RepoSection>,
}

/// Values given on the command line; they win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub archive_url: Option<String>,
    pub distribution: Option<String>,
    pub component: Option<String>,
    pub architecture: Option<String>,
    pub repo_path: Option<PathBuf>,
    pub step_secs: Option<u64>,
    pub lookback_days: Option<u64>,
}

impl DebsnapConfig {
    pub fn selector(&self) -> Selector {
        Selector {
            distribution: self.archive.distribution.clone(),
            component: self.archive.component.clone(),
            architecture: self.archive.architecture.clone(),
        }
    }

    pub fn plan(&self) -> WalkPlan {
        WalkPlan {
            step: Duration::seconds(self.walk.step_secs as i64),
            lookback: Duration::days(self.walk.lookback_days as i64),
        }
    }

    pub fn author(&self) -> Identity {
        Identity {
            name: self.repo.author_name.clone(),
            email: self.repo.author_email.clone(),
        }
    }
}

/// Variables read outside the config layering.
pub const ENV_CONFIG_PATH: &str = "DEBSNAP_CONFIG_PATH";
pub const ENV_HOME: &str = "DEBSNAP_HOME";
pub const ENV_LOG: &str = "DEBSNAP_LOG";

type EnvSetter = fn(&mut DebsnapConfig, &str);

fn set_u64(slot: &mut u64, raw: &str) {
    if let Ok(value) = raw.parse() {
        *slot = value;
    }
}

/// Config fields settable from the environment. Values are trimmed and
/// blank ones ignored; numbers that do not parse keep the previous value.
const ENV_FIELDS: &[(&str, EnvSetter)] = &[
    ("DEBSNAP_ARCHIVE_URL", |cfg, v| cfg.archive.base_url = v.to_string()),
    ("DEBSNAP_DISTRIBUTION", |cfg, v| cfg.archive.distribution = v.to_string()),
    ("DEBSNAP_COMPONENT", |cfg, v| cfg.archive.component = v.to_string()),
    ("DEBSNAP_ARCHITECTURE", |cfg, v| cfg.archive.architecture = v.to_string()),
    ("DEBSNAP_COMPRESSION", |cfg, v| cfg.archive.compression = v.to_string()),
    ("DEBSNAP_TIMEOUT_SECS", |cfg, v| set_u64(&mut cfg.archive.timeout_secs, v)),
    ("DEBSNAP_STEP_SECS", |cfg, v| set_u64(&mut cfg.walk.step_secs, v)),
    ("DEBSNAP_LOOKBACK_DAYS", |cfg, v| set_u64(&mut cfg.walk.lookback_days, v)),
    ("DEBSNAP_REPO_PATH", |cfg, v| cfg.repo.path = PathBuf::from(v)),
    ("DEBSNAP_AUTHOR_NAME", |cfg, v| cfg.repo.author_name = v.to_string()),
    ("DEBSNAP_AUTHOR_EMAIL", |cfg, v| cfg.repo.author_email = v.to_string()),
];

pub fn is_known_env_key(key: &str) -> bool {
    [ENV_CONFIG_PATH, ENV_HOME, ENV_LOG].contains(&key)
        || ENV_FIELDS.iter().any(|(name, _)| *name == key)
}

fn validate_selector_part(label: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("invalid {label}: cannot be empty"));
    }
    if value.contains(['/', '\\']) || value == "." || value == ".." {
        return Err(anyhow!("invalid {label} {value:?}: must be a single path segment"));
    }
    Ok(())
}

fn validate(cfg: &DebsnapConfig) -> Result<()> {
    let url = Url::parse(&cfg.archive.base_url)
        .map_err(|err| anyhow!("invalid archive base url {:?}: {err}", cfg.archive.base_url))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(anyhow!("invalid archive base url: use http or https"));
    }
    validate_selector_part("distribution", &cfg.archive.distribution)?;
    validate_selector_part("component", &cfg.archive.component)?;
    validate_selector_part("architecture", &cfg.archive.architecture)?;
    if decompressor_for(&cfg.archive.compression).is_none() {
        return Err(anyhow!("invalid compression: use `xz` or `none`"));
    }
    if cfg.archive.timeout_secs == 0 {
        return Err(anyhow!("invalid http timeout: must be >= 1 second"));
    }
    if cfg.walk.step_secs == 0 || cfg.walk.step_secs > MAX_LOOKBACK_DAYS * 86_400 {
        return Err(anyhow!("invalid walk step: must be >= 1 second and at most the maximum lookback"));
    }
    if cfg.walk.lookback_days == 0 || cfg.walk.lookback_days > MAX_LOOKBACK_DAYS {
        return Err(anyhow!(
            "invalid lookback: require 1 <= lookback_days <= {MAX_LOOKBACK_DAYS}"
        ));
    }
    if cfg.repo.path.as_os_str().is_empty() {
        return Err(anyhow!("invalid repo path: cannot be empty"));
    }
    if cfg.repo.author_name.trim().is_empty() || cfg.repo.author_email.trim().is_empty() {
        return Err(anyhow!("invalid commit author: name and email are required"));
    }
    Ok(())
}

pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(custom) = env::var(ENV_CONFIG_PATH) {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }

    let base = dirs::config_dir()?;
    Some(base.join("debsnap").join("debsnap.toml"))
}

fn merge_file_config(base: &mut DebsnapConfig, path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)
        .map_err(|err| anyhow!("failed to read debsnap config {}: {err}", path.display()))?;
    let parsed: PartialDebsnapConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse debsnap config {}: {err}", path.display()))?;
    if let Some(archive) = parsed.archive {
        base.archive = archive;
    }
    if let Some(walk) = parsed.walk {
        base.walk = walk;
    }
    if let Some(repo) = parsed.repo {
        base.repo = repo;
    }
    Ok(())
}

fn apply_env<F>(cfg: &mut DebsnapConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    for (key, set) in ENV_FIELDS {
        if let Some(raw) = lookup(key) {
            let value = raw.trim();
            if !value.is_empty() {
                set(cfg, value);
            }
        }
    }
}

fn merge_env(cfg: &mut DebsnapConfig) {
    apply_env(cfg, |key| env::var(key).ok());
}

fn merge_overrides(cfg: &mut DebsnapConfig, overrides: &ConfigOverrides) {
    if let Some(url) = &overrides.archive_url {
        cfg.archive.base_url = url.clone();
    }
    if let Some(distribution) = &overrides.distribution {
        cfg.archive.distribution = distribution.clone();
    }
    if let Some(component) = &overrides.component {
        cfg.archive.component = component.clone();
    }
    if let Some(architecture) = &overrides.architecture {
        cfg.archive.architecture = architecture.clone();
    }
    if let Some(path) = &overrides.repo_path {
        cfg.repo.path = path.clone();
    }
    if let Some(step) = overrides.step_secs {
        cfg.walk.step_secs = step;
    }
    if let Some(days) = overrides.lookback_days {
        cfg.walk.lookback_days = days;
    }
}

/// Defaults, then the TOML file, then `DEBSNAP_*` variables, then flags.
pub fn load_config(overrides: &ConfigOverrides) -> Result<DebsnapConfig> {
    let mut cfg = DebsnapConfig::default();
    let path = resolve_config_path(overrides.config_path.as_deref());
    merge_file_config(&mut cfg, path.as_deref())?;
    merge_env(&mut cfg);
    merge_overrides(&mut cfg, overrides);

    validate(&cfg)?;
    Ok(cfg)
}
