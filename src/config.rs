//! Batch configuration.
//!
//! Every run is driven by a [`ReportConfig`] handed to the orchestrator. The
//! defaults reproduce the fixed borough layout the reports were first built
//! for; a JSON file can override any subset of fields:
//!
//! ```json
//! {
//!   "regions": ["Bronx", "Queens"],
//!   "base_path": "data/boroughs",
//!   "sampling": { "seed": 7 }
//! }
//! ```

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ReportError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub regions: Vec<String>,
    /// Directory holding one sub-directory of feed files per region.
    pub base_path: PathBuf,
    /// Charts and CSV reports; the cross-region comparison lands at its root.
    pub result_path: PathBuf,
    /// Interactive map artifacts.
    pub viz_path: PathBuf,
    pub sampling: SamplingConfig,
    /// How many entries of the route-length ranking are charted.
    pub top_route_lengths: usize,
    pub map: MapConfig,
    /// Date the time-of-day values are placed on when deriving a weekday.
    pub weekday_anchor: NaiveDate,
    /// Regions processed at once.
    pub concurrency: usize,
    /// Extra attempts for a failed output write.
    pub write_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub shape_fraction: f64,
    pub stop_event_fraction: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// `[lat, lon]`
    pub center: [f64; 2],
    pub zoom: u8,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            regions: ["Bronx", "Brooklyn", "Manhattan", "Queens", "Staten-Island"]
                .iter()
                .map(|r| r.to_string())
                .collect(),
            base_path: PathBuf::from("../boroughs/"),
            result_path: PathBuf::from("../resultats/"),
            viz_path: PathBuf::from("../visualisation/"),
            sampling: SamplingConfig::default(),
            top_route_lengths: 10,
            map: MapConfig::default(),
            weekday_anchor: NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or_default(),
            concurrency: 1,
            write_retries: 3,
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            shape_fraction: 0.1,
            stop_event_fraction: 0.2,
            seed: 42,
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center: [40.7128, -74.0060],
            zoom: 12,
        }
    }
}

impl ReportConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: ReportConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        if self.regions.is_empty() {
            return Err(ReportError::InvalidConfig("no regions configured".into()));
        }
        if self.concurrency == 0 {
            return Err(ReportError::InvalidConfig("concurrency must be at least 1".into()));
        }
        for (name, fraction) in [
            ("shape_fraction", self.sampling.shape_fraction),
            ("stop_event_fraction", self.sampling.stop_event_fraction),
        ] {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(ReportError::InvalidConfig(format!(
                    "{name} must be in (0, 1], got {fraction}"
                )));
            }
        }
        Ok(())
    }

    pub fn region_input_dir(&self, region: &str) -> PathBuf {
        self.base_path.join(region)
    }

    pub fn region_result_dir(&self, region: &str) -> PathBuf {
        self.result_path.join(region)
    }

    pub fn region_viz_dir(&self, region: &str) -> PathBuf {
        self.viz_path.join(region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_defaults_match_borough_layout() {
        let config = ReportConfig::default();
        assert_eq!(config.regions.len(), 5);
        assert_eq!(config.sampling.seed, 42);
        assert_eq!(config.weekday_anchor.weekday(), chrono::Weekday::Mon);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: ReportConfig =
            serde_json::from_str(r#"{"regions": ["A"], "sampling": {"seed": 7}}"#).unwrap();
        assert_eq!(config.regions, vec!["A".to_string()]);
        assert_eq!(config.sampling.seed, 7);
        assert_eq!(config.sampling.shape_fraction, 0.1);
        assert_eq!(config.top_route_lengths, 10);
    }

    #[test]
    fn test_validate_rejects_bad_fraction() {
        let mut config = ReportConfig::default();
        config.sampling.stop_event_fraction = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ReportError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = ReportConfig::default();
        config.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_region_dirs() {
        let mut config = ReportConfig::default();
        config.base_path = PathBuf::from("in");
        config.result_path = PathBuf::from("out");
        assert_eq!(config.region_input_dir("Bronx"), PathBuf::from("in/Bronx"));
        assert_eq!(config.region_result_dir("Bronx"), PathBuf::from("out/Bronx"));
    }
}
