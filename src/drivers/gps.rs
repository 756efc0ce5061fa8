//! GPS receiver driver: PMTK configuration plus an incremental NMEA parser
//! feeding the fix state behind [`PositionSource`].

use crate::error::Result;
use crate::hal::{PositionSource, SerialTransport};
use crate::samples::PositionReport;
use std::time::Duration;

pub const BAUD_RATE: u32 = 9600;
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

// Sentence subset: RMC + GGA only
const PMTK_SET_NMEA_OUTPUT: &str = "PMTK314,0,1,0,1,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0";
// 2Hz update rate
const PMTK_SET_UPDATE_500MS: &str = "PMTK220,500";

const KNOTS_TO_MPS: f64 = 0.5144444;

// Bounds one update() call when the receiver floods the line
const MAX_SENTENCES_PER_UPDATE: usize = 16;

fn nmea_checksum(body: &str) -> u8 {
    body.bytes().fold(0u8, |acc, b| acc ^ b)
}

/// `$body*hh` with a matching XOR checksum.
fn validate_sentence(sentence: &str) -> Option<&str> {
    let rest = sentence.strip_prefix('$')?;
    let (body, checksum) = rest.rsplit_once('*')?;
    let expected = u8::from_str_radix(checksum.trim_end(), 16).ok()?;
    if nmea_checksum(body) == expected {
        Some(body)
    } else {
        None
    }
}

/// ddmm.mmmm (or dddmm.mmmm) plus hemisphere into signed decimal degrees.
fn parse_coordinate(field: &str, hemisphere: &str) -> Option<f64> {
    let raw: f64 = field.parse().ok()?;
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    let mut decimal = degrees + minutes / 60.0;
    if hemisphere == "S" || hemisphere == "W" {
        decimal = -decimal;
    }
    Some(decimal)
}

#[derive(Debug, Default, Clone)]
struct FixState {
    has_fix: bool,
    latitude: f64,
    longitude: f64,
    altitude_m: f64,
    speed_knots: Option<f64>,
}

pub struct GpsReceiver {
    transport: Box<dyn SerialTransport>,
    state: FixState,
}

impl GpsReceiver {
    /// Configure the receiver for the RMC+GGA sentence subset at 2Hz.
    pub fn new(transport: Box<dyn SerialTransport>) -> Result<Self> {
        let mut gps = Self {
            transport,
            state: FixState::default(),
        };
        gps.send_command(PMTK_SET_NMEA_OUTPUT)?;
        gps.send_command(PMTK_SET_UPDATE_500MS)?;
        Ok(gps)
    }

    fn send_command(&mut self, body: &str) -> Result<()> {
        self.transport.send(frame_sentence(body).as_bytes())
    }

    /// Drain pending sentences into the fix state.
    pub fn update(&mut self) -> Result<()> {
        for _ in 0..MAX_SENTENCES_PER_UPDATE {
            let Some(line) = self.transport.read_line()? else {
                break;
            };
            let Some(body) = validate_sentence(&line) else {
                continue;
            };
            let fields: Vec<&str> = body.split(',').collect();
            if fields[0].len() < 5 {
                continue;
            }
            match &fields[0][2..5] {
                "RMC" => self.apply_rmc(&fields),
                "GGA" => self.apply_gga(&fields),
                _ => {}
            }
        }
        Ok(())
    }

    fn apply_rmc(&mut self, fields: &[&str]) {
        if fields.len() < 8 {
            return;
        }
        self.state.has_fix = fields[2] == "A";
        if !self.state.has_fix {
            return;
        }
        if let Some(lat) = parse_coordinate(fields[3], fields[4]) {
            self.state.latitude = lat;
        }
        if let Some(lon) = parse_coordinate(fields[5], fields[6]) {
            self.state.longitude = lon;
        }
        self.state.speed_knots = fields[7].parse().ok();
    }

    fn apply_gga(&mut self, fields: &[&str]) {
        if fields.len() < 10 {
            return;
        }
        let quality: u8 = fields[6].parse().unwrap_or(0);
        if quality == 0 {
            return;
        }
        self.state.has_fix = true;
        if let Some(lat) = parse_coordinate(fields[2], fields[3]) {
            self.state.latitude = lat;
        }
        if let Some(lon) = parse_coordinate(fields[4], fields[5]) {
            self.state.longitude = lon;
        }
        if let Ok(alt) = fields[9].parse::<f64>() {
            self.state.altitude_m = alt;
        }
    }
}

impl PositionSource for GpsReceiver {
    fn fix(&mut self) -> Result<bool> {
        self.update()?;
        Ok(self.state.has_fix)
    }

    /// Latitude, longitude, altitude, and velocity, or the sentinel quadruple
    /// when no fix is held.
    fn read_position(&mut self) -> Result<PositionReport> {
        self.update()?;
        if !self.state.has_fix {
            return Ok(PositionReport::sentinel());
        }

        let mut report = PositionReport::new(
            self.state.latitude,
            self.state.longitude,
            self.state.altitude_m,
            self.state.speed_knots.unwrap_or(0.0) * KNOTS_TO_MPS,
        );
        // Speed over ground can drop out of RMC while position holds
        if self.state.speed_knots.is_none() {
            report.velocity = "0".to_string();
        }
        Ok(report)
    }
}

/// Frame and checksum a PMTK/NMEA body for transmission.
pub fn frame_sentence(body: &str) -> String {
    format!("${}*{:02X}\r\n", body, nmea_checksum(body))
}

impl std::fmt::Debug for GpsReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpsReceiver")
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::VecDeque;

    struct LineFeed {
        lines: VecDeque<String>,
        sent: Vec<Vec<u8>>,
    }

    impl LineFeed {
        fn new(lines: &[&str]) -> Box<Self> {
            Box::new(Self {
                lines: lines.iter().map(|s| s.to_string()).collect(),
                sent: Vec::new(),
            })
        }
    }

    impl SerialTransport for LineFeed {
        fn send(&mut self, data: &[u8]) -> crate::error::Result<()> {
            self.sent.push(data.to_vec());
            Ok(())
        }

        fn read_line(&mut self) -> crate::error::Result<Option<String>> {
            Ok(self.lines.pop_front())
        }
    }

    fn sentence(body: &str) -> String {
        format!("${}*{:02X}", body, nmea_checksum(body))
    }

    #[test]
    fn test_checksum_framing() {
        // Reference value from the PMTK datasheet examples
        assert_eq!(
            frame_sentence("PMTK220,500"),
            "$PMTK220,500*2B\r\n".to_string()
        );
    }

    #[test]
    fn test_corrupt_sentence_ignored() {
        assert!(validate_sentence("$GPRMC,junk*FF").is_none());
        assert!(validate_sentence("no dollar").is_none());
        assert!(validate_sentence(&sentence("GPGGA,x,y")).is_some());
    }

    #[test]
    fn test_coordinate_conversion() {
        let lat = parse_coordinate("4807.038", "N").unwrap();
        assert_relative_eq!(lat, 48.1173, epsilon = 1e-4);
        let lon = parse_coordinate("01131.000", "W").unwrap();
        assert_relative_eq!(lon, -11.516666, epsilon = 1e-4);
    }

    #[test]
    fn test_sentinel_when_unfixed() {
        let mut gps = GpsReceiver::new(LineFeed::new(&[])).unwrap();
        assert!(!gps.fix().unwrap());
        let report = gps.read_position().unwrap();
        assert_eq!(report, PositionReport::sentinel());
    }

    #[test]
    fn test_rmc_fix_and_speed() {
        let rmc = sentence("GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W");
        let mut gps = GpsReceiver::new(LineFeed::new(&[&rmc])).unwrap();
        assert!(gps.fix().unwrap());

        let report = gps.read_position().unwrap();
        assert_eq!(report.latitude, "48.117300");
        let velocity: f64 = report.velocity.parse().unwrap();
        assert_relative_eq!(velocity, 22.4 * KNOTS_TO_MPS, epsilon = 1e-6);
    }

    #[test]
    fn test_gga_altitude() {
        let gga = sentence("GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,");
        let mut gps = GpsReceiver::new(LineFeed::new(&[&gga])).unwrap();
        let report = gps.read_position().unwrap();
        assert_eq!(report.altitude, "545.4");
    }

    #[test]
    fn test_void_status_clears_fix() {
        let fix = sentence("GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,,");
        let void = sentence("GPRMC,123520,V,,,,,,,230394,,");
        let mut gps = GpsReceiver::new(LineFeed::new(&[&fix])).unwrap();
        assert!(gps.fix().unwrap());

        gps.transport = LineFeed::new(&[&void]);
        assert!(!gps.fix().unwrap());
        assert!(gps.read_position().unwrap().is_sentinel());
    }
}
