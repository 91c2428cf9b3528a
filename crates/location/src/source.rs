//! Position sources polled by the tracker

use crate::geo::GeoPoint;
use crate::LocationError;
use std::collections::VecDeque;
use std::path::Path;
use tracing::info;

/// Something that can produce a single position fix on demand
///
/// Called from the tracker's background thread, so implementations may block
/// for up to roughly one sample period.
pub trait LocationSource {
    fn read_fix(&mut self) -> Result<GeoPoint, LocationError>;

    fn describe(&self) -> String {
        "location source".to_string()
    }
}

/// Replays recorded `lat,lon` fixes, one per sample
pub struct ReplaySource {
    fixes: VecDeque<GeoPoint>,
    label: String,
}

impl ReplaySource {
    pub fn from_points(points: impl IntoIterator<Item = GeoPoint>) -> Self {
        Self {
            fixes: points.into_iter().collect(),
            label: "replay".to_string(),
        }
    }

    /// Load a track file; blank lines and `#` comments are skipped
    pub fn from_path(path: &Path) -> Result<Self, LocationError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| LocationError::Unavailable(format!("{}: {}", path.display(), e)))?;
        let mut source = Self::parse(&text)?;
        source.label = format!("replay:{}", path.display());
        info!("Loaded {} recorded fixes from {}", source.remaining(), path.display());
        Ok(source)
    }

    pub fn parse(text: &str) -> Result<Self, LocationError> {
        let mut fixes = VecDeque::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (lat, lon) = line
                .split_once(',')
                .ok_or_else(|| {
                    LocationError::Parse(format!("line {}: expected 'lat,lon'", number + 1))
                })?;
            let latitude: f64 = lat
                .trim()
                .parse()
                .map_err(|_| LocationError::Parse(format!("line {}: bad latitude", number + 1)))?;
            let longitude: f64 = lon
                .trim()
                .parse()
                .map_err(|_| LocationError::Parse(format!("line {}: bad longitude", number + 1)))?;
            let fix = GeoPoint::new(latitude, longitude);
            if !fix.is_valid() {
                return Err(LocationError::Parse(format!(
                    "line {}: coordinate out of range",
                    number + 1
                )));
            }
            fixes.push_back(fix);
        }
        Ok(Self {
            fixes,
            label: "replay".to_string(),
        })
    }

    pub fn remaining(&self) -> usize {
        self.fixes.len()
    }
}

impl LocationSource for ReplaySource {
    fn read_fix(&mut self) -> Result<GeoPoint, LocationError> {
        self.fixes.pop_front().ok_or(LocationError::Exhausted)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_track() {
        let mut source = ReplaySource::parse("# trip\n-6.2, 106.8\n\n-6.21,106.81\n").unwrap();
        assert_eq!(source.remaining(), 2);
        assert_eq!(source.read_fix().unwrap(), GeoPoint::new(-6.2, 106.8));
        assert_eq!(source.read_fix().unwrap(), GeoPoint::new(-6.21, 106.81));
        assert!(matches!(source.read_fix(), Err(LocationError::Exhausted)));
    }

    #[test]
    fn test_parse_rejects_bad_lines() {
        assert!(matches!(ReplaySource::parse("1.0;2.0"), Err(LocationError::Parse(_))));
        assert!(matches!(ReplaySource::parse("north,2.0"), Err(LocationError::Parse(_))));
        assert!(matches!(ReplaySource::parse("NaN,2.0"), Err(LocationError::Parse(_))));
        assert!(matches!(ReplaySource::parse("1.0,inf"), Err(LocationError::Parse(_))));
        assert!(matches!(ReplaySource::parse("91.0,2.0"), Err(LocationError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = ReplaySource::from_path(Path::new("/nonexistent/track.csv"));
        assert!(matches!(result, Err(LocationError::Unavailable(_))));
    }
}
