//! Run configuration: defaults, an optional JSON file, then caller overrides.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::ConfigError;
use crate::helpers::week::{OffsetBounds, year_in_range};
use crate::page::chromium::BrowserOptions;
use crate::page::{Locator, selectors};
use crate::service::FailureStrategy;

pub const DEFAULT_TMS_URL: &str = "https://tms.md-man.biz/home";

/// Bounded waits, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub page_load_ms: u64,
    pub element_ms: u64,
    pub navigation_ms: u64,
    /// Pause after each arrow click before the table is checked again.
    pub navigation_settle_ms: u64,
    pub commit_ms: u64,
    pub post_commit_settle_ms: u64,
    /// Fallback sleep when no transition is observed after a commit.
    pub post_commit_delay_ms: u64,
    pub login_poll_ms: u64,
    pub login_ceiling_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            page_load_ms: 30_000,
            element_ms: 10_000,
            navigation_ms: 30_000,
            navigation_settle_ms: 1_000,
            commit_ms: 10_000,
            post_commit_settle_ms: 15_000,
            post_commit_delay_ms: 2_000,
            login_poll_ms: 2_000,
            login_ceiling_ms: 300_000,
        }
    }
}

impl Timeouts {
    pub fn page_load(&self) -> Duration {
        Duration::from_millis(self.page_load_ms)
    }

    pub fn element(&self) -> Duration {
        Duration::from_millis(self.element_ms)
    }

    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn navigation_settle(&self) -> Duration {
        Duration::from_millis(self.navigation_settle_ms)
    }

    pub fn commit(&self) -> Duration {
        Duration::from_millis(self.commit_ms)
    }

    pub fn post_commit_settle(&self) -> Duration {
        Duration::from_millis(self.post_commit_settle_ms)
    }

    pub fn post_commit_delay(&self) -> Duration {
        Duration::from_millis(self.post_commit_delay_ms)
    }

    pub fn login_poll(&self) -> Duration {
        Duration::from_millis(self.login_poll_ms)
    }

    pub fn login_ceiling(&self) -> Duration {
        Duration::from_millis(self.login_ceiling_ms)
    }

    /// No waiting at all. Meant for the in-memory page.
    pub fn instant() -> Self {
        Self {
            navigation_settle_ms: 0,
            post_commit_delay_ms: 0,
            login_poll_ms: 1,
            ..Self::default()
        }
    }
}

/// Locators for the page controls the orchestrator clicks or waits on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Controls {
    pub table: Locator,
    pub previous_week: Locator,
    pub next_week: Locator,
    /// Primary Save locator first, then fallbacks.
    pub commit: Vec<Locator>,
    /// Promark locators, tried the same way after a save.
    pub submit: Vec<Locator>,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            table: selectors::table(),
            previous_week: selectors::previous_week(),
            next_week: selectors::next_week(),
            commit: selectors::commit(),
            submit: selectors::submit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tms_url: String,
    pub timeouts: Timeouts,
    pub browser: BrowserOptions,
    pub auto_submit: bool,
    /// Click Promark after each save. Needs `auto_submit`.
    pub submit_after_save: bool,
    pub no_overwrite: bool,
    pub dry_run: bool,
    /// Target year; the displayed year when unset.
    pub year: Option<i32>,
    pub bounds: OffsetBounds,
    pub failure_strategy: FailureStrategy,
    pub controls: Controls,
    pub screenshot_on_error: Option<std::path::PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tms_url: DEFAULT_TMS_URL.to_string(),
            timeouts: Timeouts::default(),
            browser: BrowserOptions::default(),
            auto_submit: false,
            submit_after_save: false,
            no_overwrite: false,
            dry_run: false,
            year: None,
            bounds: OffsetBounds::default(),
            failure_strategy: FailureStrategy::default(),
            controls: Controls::default(),
            screenshot_on_error: None,
        }
    }
}

impl Config {
    /// Defaults, overlaid with the JSON file at `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        info!("Loading configuration from {}", path.display());
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dry_run && self.auto_submit {
            return Err(ConfigError::DryRunWithAutoSubmit);
        }
        if let Some(year) = self.year {
            if !year_in_range(year) {
                return Err(ConfigError::YearOutOfRange(year));
            }
        }

        let positive = [
            ("page load", self.timeouts.page_load_ms),
            ("element", self.timeouts.element_ms),
            ("navigation", self.timeouts.navigation_ms),
            ("commit", self.timeouts.commit_ms),
        ];
        if let Some((name, _)) = positive.into_iter().find(|(_, ms)| *ms == 0) {
            return Err(ConfigError::ZeroTimeout { name });
        }

        if self.controls.commit.is_empty() {
            return Err(ConfigError::NoCommitLocators);
        }
        if self.submit_after_save {
            if !self.auto_submit {
                return Err(ConfigError::SubmitWithoutSave);
            }
            if self.controls.submit.is_empty() {
                return Err(ConfigError::NoSubmitLocators);
            }
        }
        Ok(())
    }
}
