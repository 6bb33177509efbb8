use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use validator::Validate;

use crate::error::{LinkError, Result};
use crate::formats::parse_day;
use crate::models::{IdSource, LinkThresholds, SpatiotemporalBox, TimeWindow};
use crate::core::padded_box;

/// Profile used by `select-dt` when none is named
pub const DEFAULT_PROFILE: &str = "select";

/// Application configuration
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub paths: PathSettings,
    /// Named threshold bundles, e.g. `initial` and `select`
    pub linkage: BTreeMap<String, LinkThresholds>,
    #[validate(nested)]
    pub relocation: RelocationSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PathSettings {
    pub hypo_root: PathBuf,
    #[validate(length(min = 1))]
    pub ctlg_code: String,
    pub station_file: PathBuf,
    pub catalog_file: PathBuf,
    #[serde(default = "default_catalog_ids")]
    pub catalog_ids: IdSource,
    pub working_catalog: PathBuf,
    pub dt_input: PathBuf,
    pub dt_output: PathBuf,
    pub hypodd_template: PathBuf,
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_catalog_ids() -> IdSource {
    IdSource::Explicit
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("input")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RelocationSettings {
    /// `YYYYMMDD-YYYYMMDD`, both ends inclusive
    pub time_window: String,
    pub lat_range: [f64; 2],
    pub lon_range: [f64; 2],
    /// Partition columns (lon) and rows (lat)
    pub num_grids: [usize; 2],
    /// Padding in degrees, `[lon, lat]`
    pub xy_pad: [f64; 2],
    /// Subtracted from solver depths on output
    pub dep_corr: f64,
    #[validate(range(min = 1))]
    pub num_workers: usize,
    #[serde(default)]
    pub keep_grids: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Configuration file (config/default.toml)
    /// 2. Local overrides (config/local.toml)
    /// 3. Environment variables (prefixed with HYPOLINK)
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., HYPOLINK__RELOCATION__NUM_WORKERS -> relocation.num_workers
            .add_source(environment())
            .build()?;

        Self::finish(settings.try_deserialize()?)
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        Self::finish(settings.try_deserialize()?)
    }

    /// Parse settings from TOML text, without environment overrides
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Settings =
            toml::from_str(text).map_err(|e| LinkError::Configuration(e.to_string()))?;
        Self::finish(settings)
    }

    fn finish(settings: Settings) -> Result<Self> {
        settings.validate()?;
        settings.check()?;
        Ok(settings)
    }

    /// Cross-field checks the derive rules cannot express
    fn check(&self) -> Result<()> {
        if self.linkage.is_empty() {
            return Err(LinkError::Configuration("no [linkage.<profile>] threshold bundle".into()));
        }
        for (name, thresholds) in &self.linkage {
            thresholds
                .validate()
                .map_err(|e| LinkError::Configuration(format!("linkage.{}: {}", name, e)))?;
        }

        let r = &self.relocation;
        if !(r.lat_range[0] < r.lat_range[1]) || !(r.lon_range[0] < r.lon_range[1]) {
            return Err(LinkError::Configuration(
                "lat_range and lon_range must be ascending".into(),
            ));
        }
        if r.xy_pad.iter().any(|p| !(*p >= 0.0)) {
            return Err(LinkError::Configuration("xy_pad must be non-negative".into()));
        }
        if r.num_grids.contains(&0) {
            return Err(LinkError::Configuration("num_grids entries must be at least 1".into()));
        }
        r.window()?;
        Ok(())
    }

    /// Threshold bundle by name
    pub fn thresholds(&self, profile: &str) -> Result<&LinkThresholds> {
        self.linkage.get(profile).ok_or_else(|| {
            LinkError::Configuration(format!(
                "unknown linkage profile '{}' (have: {})",
                profile,
                self.linkage.keys().cloned().collect::<Vec<_>>().join(", ")
            ))
        })
    }
}

impl RelocationSettings {
    pub fn window(&self) -> Result<TimeWindow> {
        let bad = || LinkError::Configuration(format!("bad time_window '{}'", self.time_window));
        let (start, end) = self.time_window.split_once('-').ok_or_else(bad)?;
        let window = TimeWindow {
            start: parse_day(start).ok_or_else(bad)?,
            end: parse_day(end).ok_or_else(bad)?,
        };
        if window.start > window.end {
            return Err(bad());
        }
        Ok(window)
    }

    /// Time window plus the study region padded by `xy_pad`
    pub fn bounds(&self) -> Result<SpatiotemporalBox> {
        Ok(SpatiotemporalBox {
            window: self.window()?,
            region: padded_box(self.lat_range, self.lon_range, self.xy_pad),
        })
    }
}

fn environment() -> Environment {
    Environment::with_prefix("HYPOLINK")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}
