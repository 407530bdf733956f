use serde::{Deserialize, Serialize};

/// How newly received snapshots affect entities that are already streamed in,
/// both on a full-set rebuild and on an explicit add.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildPolicy {
    /// Stream out tracked entities missing from a rebuilt set and refresh the
    /// tracked snapshots of the ones still present. An explicit add of a
    /// tracked id also refreshes its tracked snapshot.
    #[default]
    Reconcile,
    /// Leave the tracker untouched on rebuild and add; stale entries linger
    /// until a sweep-out against their old data removes them.
    Retain,
}

/// Streaming configuration: grid geometry plus rebuild behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Side length of one square cell.
    pub area_size: f32,
    /// Side length of the indexed domain, measured after the offset is applied.
    pub max_coordinate: f32,
    /// Added to raw x and y so the domain starts at zero.
    pub coordinate_offset: f32,
    /// Applies to full-set rebuilds and to explicit adds of tracked ids.
    pub rebuild_policy: RebuildPolicy,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            area_size: 100.0,
            max_coordinate: 50_000.0,
            coordinate_offset: 10_000.0,
            rebuild_policy: RebuildPolicy::Reconcile,
        }
    }
}

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("area_size must be finite and positive, got {0}")]
    AreaSize(f32),
    #[error("max_coordinate must be finite and positive, got {0}")]
    MaxCoordinate(f32),
    #[error("coordinate_offset must be finite, got {0}")]
    Offset(f32),
    #[error("area_size {area_size} exceeds max_coordinate {max_coordinate}")]
    AreaLargerThanDomain { area_size: f32, max_coordinate: f32 },
}

impl StreamConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.area_size.is_finite() && self.area_size > 0.0) {
            return Err(ConfigError::AreaSize(self.area_size));
        }
        if !(self.max_coordinate.is_finite() && self.max_coordinate > 0.0) {
            return Err(ConfigError::MaxCoordinate(self.max_coordinate));
        }
        if !self.coordinate_offset.is_finite() {
            return Err(ConfigError::Offset(self.coordinate_offset));
        }
        if self.area_size > self.max_coordinate {
            return Err(ConfigError::AreaLargerThanDomain {
                area_size: self.area_size,
                max_coordinate: self.max_coordinate,
            });
        }
        Ok(())
    }

    /// Number of cells along each axis of the square grid.
    pub fn cells_per_axis(&self) -> usize {
        ((self.max_coordinate / self.area_size).floor() as usize).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_world_domain() {
        let config = StreamConfig::default();
        assert_eq!(config.area_size, 100.0);
        assert_eq!(config.max_coordinate, 50_000.0);
        assert_eq!(config.coordinate_offset, 10_000.0);
        assert_eq!(config.rebuild_policy, RebuildPolicy::Reconcile);
        assert_eq!(config.cells_per_axis(), 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_geometry() {
        let zero_area = StreamConfig {
            area_size: 0.0,
            ..StreamConfig::default()
        };
        assert_eq!(zero_area.validate(), Err(ConfigError::AreaSize(0.0)));

        let negative_domain = StreamConfig {
            max_coordinate: -1.0,
            ..StreamConfig::default()
        };
        assert_eq!(
            negative_domain.validate(),
            Err(ConfigError::MaxCoordinate(-1.0))
        );

        let huge_area = StreamConfig {
            area_size: 60_000.0,
            ..StreamConfig::default()
        };
        assert!(matches!(
            huge_area.validate(),
            Err(ConfigError::AreaLargerThanDomain { .. })
        ));

        let nan_offset = StreamConfig {
            coordinate_offset: f32::NAN,
            ..StreamConfig::default()
        };
        assert!(matches!(nan_offset.validate(), Err(ConfigError::Offset(_))));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: StreamConfig =
            serde_json::from_str(r#"{"area_size": 250, "rebuild_policy": "retain"}"#).unwrap();
        assert_eq!(config.area_size, 250.0);
        assert_eq!(config.max_coordinate, 50_000.0);
        assert_eq!(config.rebuild_policy, RebuildPolicy::Retain);
        assert_eq!(config.cells_per_axis(), 200);
    }
}
