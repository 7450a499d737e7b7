//! Icon tiers for the tray indicator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Degrees below the threshold at which the indicator turns to "approaching".
pub const APPROACH_MARGIN_C: f32 = 10.0;

/// Which of the three indicator glyphs to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IconTier {
    #[default]
    Normal,
    Approaching,
    OverThreshold,
}

impl IconTier {
    /// Classifies a temperature against the threshold.
    ///
    /// Missing data shows as `Normal`; the tooltip carries the "no data" hint.
    pub fn classify(temperature_c: Option<f32>, threshold_c: f32) -> Self {
        match temperature_c {
            Some(t) if t >= threshold_c => Self::OverThreshold,
            Some(t) if t > threshold_c - APPROACH_MARGIN_C => Self::Approaching,
            _ => Self::Normal,
        }
    }

    /// RGBA fill used by generated indicator glyphs.
    pub fn color(&self) -> [u8; 4] {
        match self {
            Self::Normal => [0, 200, 0, 255],
            Self::Approaching => [255, 165, 0, 255],
            Self::OverThreshold => [220, 0, 0, 255],
        }
    }
}

impl fmt::Display for IconTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Approaching => write!(f, "approaching"),
            Self::OverThreshold => write!(f, "over threshold"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(IconTier::classify(Some(45.0), 60.0), IconTier::Normal);
        assert_eq!(IconTier::classify(Some(50.0), 60.0), IconTier::Normal);
        assert_eq!(IconTier::classify(Some(50.5), 60.0), IconTier::Approaching);
        assert_eq!(IconTier::classify(Some(59.9), 60.0), IconTier::Approaching);
        assert_eq!(IconTier::classify(Some(60.0), 60.0), IconTier::OverThreshold);
        assert_eq!(IconTier::classify(Some(95.0), 60.0), IconTier::OverThreshold);
    }

    #[test]
    fn test_missing_data_is_normal() {
        assert_eq!(IconTier::classify(None, 60.0), IconTier::Normal);
    }

    #[test]
    fn test_serialized_names() {
        let json = serde_json::to_string(&IconTier::OverThreshold).unwrap();
        assert_eq!(json, "\"over_threshold\"");
    }
}
