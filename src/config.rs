//! Tolerance policy and the configuration store it is resolved from.
//!
//! A [`Policy`] is always the built-in template (or a store's current default)
//! with a [`PolicyOverrides`] layered on top, key by key. No range validation
//! happens here; out-of-range values surface in the diff engine.

use std::path::{Path, PathBuf};
use std::sync::{OnceLock, RwLock};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{PixelPerfectError, Result};

pub const DEFAULT_REPORT_DIR: &str = ".debug-output";
pub const DEFAULT_CACHE_DIR: &str = ".cache";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Fully resolved options for one assertion.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    /// Forwarded to the comparison as `include_aa`: when set, pixels the
    /// antialiasing heuristic flags are counted as changes instead of skipped.
    pub detect_antialiasing: bool,
    /// Per-pixel colour threshold on a 0..=1 scale.
    pub color_threshold: f64,
    /// Maximum tolerated fraction of changed pixels.
    pub pixel_threshold: f64,
    /// `None` disables artifact writing entirely.
    pub report_dir: Option<PathBuf>,
    pub always_report: bool,
    pub figma_token: Option<String>,
    pub xd_token: Option<String>,
    pub cache_dir: PathBuf,
    pub http_timeout: Duration,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            detect_antialiasing: false,
            color_threshold: 0.0,
            pixel_threshold: 0.0,
            report_dir: Some(PathBuf::from(DEFAULT_REPORT_DIR)),
            always_report: false,
            figma_token: None,
            xd_token: None,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl Policy {
    /// Returns a copy with every key present in `overrides` replaced.
    pub fn with_overrides(&self, overrides: &PolicyOverrides) -> Policy {
        Policy {
            detect_antialiasing: overrides
                .detect_antialiasing
                .unwrap_or(self.detect_antialiasing),
            color_threshold: overrides.color_threshold.unwrap_or(self.color_threshold),
            pixel_threshold: overrides.pixel_threshold.unwrap_or(self.pixel_threshold),
            report_dir: match &overrides.report_dir {
                Some(dir) => dir.clone(),
                None => self.report_dir.clone(),
            },
            always_report: overrides.always_report.unwrap_or(self.always_report),
            figma_token: overrides
                .figma_token
                .clone()
                .or_else(|| self.figma_token.clone()),
            xd_token: overrides.xd_token.clone().or_else(|| self.xd_token.clone()),
            cache_dir: overrides
                .cache_dir
                .clone()
                .unwrap_or_else(|| self.cache_dir.clone()),
            http_timeout: overrides.http_timeout.unwrap_or(self.http_timeout),
        }
    }
}

/// Partial policy. Every `None` keeps the underlying value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct PolicyOverrides {
    pub detect_antialiasing: Option<bool>,
    pub color_threshold: Option<f64>,
    pub pixel_threshold: Option<f64>,
    /// `Some(None)` explicitly disables reports.
    #[serde(deserialize_with = "deserialize_report_dir")]
    pub report_dir: Option<Option<PathBuf>>,
    pub always_report: Option<bool>,
    pub figma_token: Option<String>,
    pub xd_token: Option<String>,
    pub cache_dir: Option<PathBuf>,
    #[serde(with = "humantime_serde")]
    pub http_timeout: Option<Duration>,
}

// TOML has no null, so `reportDir = false` (or "") is the way to switch reports off.
fn deserialize_report_dir<'de, D>(deserializer: D) -> std::result::Result<Option<Option<PathBuf>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Flag(bool),
        Path(PathBuf),
    }

    Ok(Some(match Option::<Raw>::deserialize(deserializer)? {
        None | Some(Raw::Flag(false)) => None,
        Some(Raw::Flag(true)) => Some(PathBuf::from(DEFAULT_REPORT_DIR)),
        Some(Raw::Path(path)) if path.as_os_str().is_empty() => None,
        Some(Raw::Path(path)) => Some(path),
    }))
}

impl PolicyOverrides {
    pub fn without_report(mut self) -> Self {
        self.report_dir = Some(None);
        self
    }

    /// Tokens from `FIGMA_TOKEN` / `XD_TOKEN`, ignoring empty values.
    pub fn from_env() -> Self {
        let token = |name: &str| std::env::var(name).ok().filter(|t| !t.is_empty());
        Self {
            figma_token: token("FIGMA_TOKEN"),
            xd_token: token("XD_TOKEN"),
            ..Self::default()
        }
    }

    /// Load overrides from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PixelPerfectError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content).map_err(|e| {
            PixelPerfectError::Config(format!("Invalid config ({}): {}", path.display(), e))
        })
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Layers `self` over `base`; keys set in `self` win.
    pub fn merge_over(self, base: PolicyOverrides) -> PolicyOverrides {
        PolicyOverrides {
            detect_antialiasing: self.detect_antialiasing.or(base.detect_antialiasing),
            color_threshold: self.color_threshold.or(base.color_threshold),
            pixel_threshold: self.pixel_threshold.or(base.pixel_threshold),
            report_dir: self.report_dir.or(base.report_dir),
            always_report: self.always_report.or(base.always_report),
            figma_token: self.figma_token.or(base.figma_token),
            xd_token: self.xd_token.or(base.xd_token),
            cache_dir: self.cache_dir.or(base.cache_dir),
            http_timeout: self.http_timeout.or(base.http_timeout),
        }
    }
}

/// Holds the current default policy.
///
/// `set_defaults` always starts from the built-in template, so repeated calls
/// do not accumulate.
#[derive(Debug)]
pub struct ConfigStore {
    template: Policy,
    current: RwLock<Policy>,
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::with_template(Policy::default())
    }
}

impl ConfigStore {
    pub fn with_template(template: Policy) -> Self {
        Self {
            current: RwLock::new(template.clone()),
            template,
        }
    }

    pub fn set_defaults(&self, overrides: &PolicyOverrides) {
        let next = self.template.with_overrides(overrides);
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = next;
    }

    pub fn restore_defaults(&self) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = self.template.clone();
    }

    pub fn defaults(&self) -> Policy {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Current defaults with the call-site overrides on top.
    pub fn merge(&self, overrides: Option<&PolicyOverrides>) -> Policy {
        let defaults = self.defaults();
        match overrides {
            Some(overrides) => defaults.with_overrides(overrides),
            None => defaults,
        }
    }
}

/// Process-wide store backing the free functions below. Mutating it while
/// assertions are in flight is racy; callers own that ordering.
pub fn global_store() -> &'static ConfigStore {
    static STORE: OnceLock<ConfigStore> = OnceLock::new();
    STORE.get_or_init(ConfigStore::default)
}

pub fn set_default_configuration(overrides: &PolicyOverrides) {
    global_store().set_defaults(overrides);
}

pub fn restore_default_configuration() {
    global_store().restore_defaults();
}

pub fn merged_configuration(overrides: Option<&PolicyOverrides>) -> Policy {
    global_store().merge(overrides)
}
