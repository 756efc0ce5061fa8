use serde::{Deserialize, Serialize};

/// One IMU read: acceleration in m/s^2 and angular rate in deg/s.
///
/// Both vectors are `None` when the device is in its configuration mode and
/// produces no motion data. The driver derives both from a single mode check,
/// so a sample is never a partial mix of valid and null axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub accel: Option<[f64; 3]>,
    pub gyro: Option<[f64; 3]>,
}

impl MotionSample {
    pub fn new(accel: [f64; 3], gyro: [f64; 3]) -> Self {
        Self {
            accel: Some(accel),
            gyro: Some(gyro),
        }
    }

    /// Null-triplet pair emitted outside motion-capable modes.
    pub fn null() -> Self {
        Self {
            accel: None,
            gyro: None,
        }
    }
}

/// One GPS read. All four fields are decimal strings so record width stays
/// constant whether or not a fix is held: unfixed reads carry the literal
/// sentinel "0" in every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionReport {
    pub latitude: String,
    pub longitude: String,
    pub altitude: String,
    pub velocity: String,
}

impl PositionReport {
    pub fn new(latitude: f64, longitude: f64, altitude: f64, velocity_mps: f64) -> Self {
        Self {
            latitude: format!("{:.6}", latitude),
            longitude: format!("{:.6}", longitude),
            altitude: format!("{}", altitude),
            velocity: format!("{}", velocity_mps),
        }
    }

    /// The sentinel quadruple substituted when no satellite fix is available.
    pub fn sentinel() -> Self {
        Self {
            latitude: "0".to_string(),
            longitude: "0".to_string(),
            altitude: "0".to_string(),
            velocity: "0".to_string(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.latitude == "0" && self.longitude == "0" && self.altitude == "0" && self.velocity == "0"
    }
}

/// Buffered IMU record: wall-clock timestamp plus monotonic offset from
/// session start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImuRecord {
    pub timestamp: String,
    pub elapsed_ms: u64,
    pub sample: MotionSample,
}

/// Buffered GPS record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpsRecord {
    pub timestamp: String,
    pub elapsed_ms: u64,
    pub report: PositionReport,
}

pub fn wall_clock_now() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_quadruple() {
        let report = PositionReport::sentinel();
        assert_eq!(report.latitude, "0");
        assert_eq!(report.longitude, "0");
        assert_eq!(report.altitude, "0");
        assert_eq!(report.velocity, "0");
        assert!(report.is_sentinel());
    }

    #[test]
    fn test_fixed_report_formatting() {
        let report = PositionReport::new(43.261391, -79.919281, 98.0, 3.5);
        assert_eq!(report.latitude, "43.261391");
        assert_eq!(report.longitude, "-79.919281");
        assert_eq!(report.altitude, "98");
        assert!(!report.is_sentinel());
    }

    #[test]
    fn test_null_sample_has_no_partial_mix() {
        let sample = MotionSample::null();
        assert!(sample.accel.is_none());
        assert!(sample.gyro.is_none());

        let sample = MotionSample::new([0.1, 0.2, 9.8], [1.0, 2.0, 3.0]);
        assert!(sample.accel.is_some());
        assert!(sample.gyro.is_some());
    }
}
