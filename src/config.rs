use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::error::Result;
use crate::model::DEFAULT_SWIMLANE_LENGTH;

/// How the blob tool turns a gesture into an outline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobShape {
    /// The outline follows the pointer.
    #[default]
    Freehand,
    /// Press on one swimlane, release on another; the outline is the pie
    /// segment between them.
    Sector,
}

/// Editor tuning. Every key is optional in the TOML source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 180 means an outcome always snaps to the nearest swimlane.
    pub snap_tolerance_degrees: f64,
    pub hit_tolerance: f64,
    pub outcome_radius: f64,
    /// Grabbing a swimlane this close to its tip resizes instead of rotating.
    pub handle_radius: f64,
    pub min_point_spacing: f64,
    pub history_limit: usize,
    pub default_swimlane_length: f64,
    pub blob_shape: BlobShape,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snap_tolerance_degrees: 180.0,
            hit_tolerance: 6.0,
            outcome_radius: 10.0,
            handle_radius: 10.0,
            min_point_spacing: 4.0,
            history_limit: 200,
            default_swimlane_length: DEFAULT_SWIMLANE_LENGTH,
            blob_shape: BlobShape::Freehand,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let cfg = Config::from_toml_str(
            r#"
            snap_tolerance_degrees = 15.0
            blob_shape = "sector"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.snap_tolerance_degrees, 15.0);
        assert_eq!(cfg.blob_shape, BlobShape::Sector);
        assert_eq!(cfg.history_limit, 200);
        assert_eq!(cfg.min_point_spacing, 4.0);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = Config::from_toml_str("blob_shape = \"triangle\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
