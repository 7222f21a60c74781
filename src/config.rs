//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::model::EARTH_RADIUS_KM;
use crate::{Error, Result};

/// How an edge's `max_depth` bounds propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthMode {
    /// `max_depth` counts hops from the originally changed entity. A path
    /// keeps the tightest limit it has crossed.
    #[default]
    HopsFromOrigin,
    /// `max_depth` is a budget that starts at the edge that declares it and
    /// is decremented on every further hop.
    RemainingBudget,
}

/// Configuration shared by the synchronization engine and spatial search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub depth_mode: DepthMode,
    /// Sphere radius used for every distance computation.
    pub earth_radius_km: f64,
    /// Skip UPDATE events whose changed fields cannot affect any index document.
    pub skip_unaffected_updates: bool,
    /// Slack added to a query radius, so a radius of 0 still matches the center.
    pub distance_tolerance_km: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            depth_mode: DepthMode::default(),
            earth_radius_km: EARTH_RADIUS_KM,
            skip_unaffected_updates: true,
            distance_tolerance_km: 1e-6,
        }
    }
}

impl SyncConfig {
    /// Parse and validate a JSON configuration. Missing keys take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SyncConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_depth_mode(mut self, mode: DepthMode) -> Self {
        self.depth_mode = mode;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.earth_radius_km.is_finite() || self.earth_radius_km <= 0.0 {
            return Err(Error::Config(format!(
                "earth_radius_km must be positive, got {}",
                self.earth_radius_km
            )));
        }
        if !self.distance_tolerance_km.is_finite() || self.distance_tolerance_km < 0.0 {
            return Err(Error::Config(format!(
                "distance_tolerance_km must be non-negative, got {}",
                self.distance_tolerance_km
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.depth_mode, DepthMode::HopsFromOrigin);
        assert_eq!(config.earth_radius_km, 6371.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = SyncConfig::from_json(r#"{"depth_mode": "remaining_budget"}"#).unwrap();
        assert_eq!(config.depth_mode, DepthMode::RemainingBudget);
        assert!(config.skip_unaffected_updates);
    }

    #[test]
    fn test_from_json_rejects_bad_radius() {
        assert!(matches!(
            SyncConfig::from_json(r#"{"earth_radius_km": 0.0}"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(SyncConfig::from_json("{"), Err(Error::Json(_))));
    }
}
