//! NMEA 0183 position sentences from a serial GNSS receiver

use crate::geo::GeoPoint;
use crate::source::LocationSource;
use crate::LocationError;
use std::io::{BufRead, BufReader};
use std::time::Duration;
use tokio_serial::SerialPort;
use tracing::{debug, info};

/// Sentences read per sample before giving up on a fix
const MAX_LINES_PER_SAMPLE: usize = 32;

/// Parse one sentence; `Ok(None)` for valid sentences that carry no usable fix
pub fn parse_sentence(line: &str) -> Result<Option<GeoPoint>, LocationError> {
    let line = line.trim();
    if !line.is_ascii() {
        return Err(LocationError::Parse(format!("non-ASCII sentence: {:?}", line)));
    }
    let body = line
        .strip_prefix('$')
        .ok_or_else(|| LocationError::Parse(format!("missing '$': {}", line)))?;

    let (payload, checksum) = match body.split_once('*') {
        Some((payload, checksum)) => (payload, Some(checksum)),
        None => (body, None),
    };

    if let Some(expected) = checksum {
        let expected = u8::from_str_radix(expected.trim(), 16)
            .map_err(|_| LocationError::Parse(format!("bad checksum field: {}", line)))?;
        let actual = payload.bytes().fold(0u8, |acc, b| acc ^ b);
        if actual != expected {
            return Err(LocationError::Checksum { expected, actual });
        }
    }

    let fields: Vec<&str> = payload.split(',').collect();
    let kind = fields
        .first()
        .and_then(|f| if f.len() >= 5 { f.get(f.len() - 3..) } else { None });

    match kind {
        Some("RMC") => {
            // status A = valid, V = receiver warning
            if fields.get(2) != Some(&"A") {
                return Ok(None);
            }
            coordinates(&fields, 3)
        }
        Some("GGA") => {
            let quality: u8 = fields.get(6).and_then(|q| q.parse().ok()).unwrap_or(0);
            if quality == 0 {
                return Ok(None);
            }
            coordinates(&fields, 2)
        }
        _ => Ok(None),
    }
}

/// Read `lat, N/S, lon, E/W` starting at `start`
fn coordinates(fields: &[&str], start: usize) -> Result<Option<GeoPoint>, LocationError> {
    let get = |i: usize| fields.get(start + i).copied().unwrap_or("");
    if get(0).is_empty() || get(2).is_empty() {
        return Ok(None);
    }

    let latitude = degrees(get(0), 2)? * hemisphere(get(1), 'S')?;
    let longitude = degrees(get(2), 3)? * hemisphere(get(3), 'W')?;
    let fix = GeoPoint::new(latitude, longitude);
    if !fix.is_valid() {
        return Err(LocationError::Parse(format!(
            "coordinate out of range: {}, {}",
            latitude, longitude
        )));
    }
    Ok(Some(fix))
}

/// `ddmm.mmmm` / `dddmm.mmmm` to decimal degrees
fn degrees(field: &str, degree_digits: usize) -> Result<f64, LocationError> {
    if !field.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return Err(LocationError::Parse(format!("bad coordinate: {}", field)));
    }
    let (Some(deg), Some(min)) = (field.get(..degree_digits), field.get(degree_digits..)) else {
        return Err(LocationError::Parse(format!("coordinate too short: {}", field)));
    };
    if min.is_empty() {
        return Err(LocationError::Parse(format!("coordinate too short: {}", field)));
    }
    let deg: f64 = deg
        .parse()
        .map_err(|_| LocationError::Parse(format!("bad degrees: {}", field)))?;
    let min: f64 = min
        .parse()
        .map_err(|_| LocationError::Parse(format!("bad minutes: {}", field)))?;
    if min >= 60.0 {
        return Err(LocationError::Parse(format!("minutes out of range: {}", field)));
    }
    Ok(deg + min / 60.0)
}

fn hemisphere(field: &str, negative: char) -> Result<f64, LocationError> {
    match field.chars().next() {
        Some(c) if c == negative => Ok(-1.0),
        Some('N') | Some('S') | Some('E') | Some('W') => Ok(1.0),
        _ => Err(LocationError::Parse(format!("bad hemisphere: {}", field))),
    }
}

/// GNSS receiver on a serial port speaking NMEA 0183
pub struct NmeaSerialSource {
    device: String,
    baud_rate: u32,
    timeout: Duration,
    reader: Option<BufReader<Box<dyn SerialPort>>>,
}

impl NmeaSerialSource {
    pub fn new(device: &str, baud_rate: u32) -> Self {
        Self {
            device: device.to_string(),
            baud_rate,
            timeout: Duration::from_millis(1500),
            reader: None,
        }
    }

    fn reader(&mut self) -> Result<&mut BufReader<Box<dyn SerialPort>>, LocationError> {
        if self.reader.is_none() {
            let port = tokio_serial::new(self.device.as_str(), self.baud_rate)
                .timeout(self.timeout)
                .open()
                .map_err(|e| LocationError::Unavailable(format!("{}: {}", self.device, e)))?;
            info!("Opened GNSS receiver on {} @ {} baud", self.device, self.baud_rate);
            self.reader = Some(BufReader::new(port));
        }
        self.reader
            .as_mut()
            .ok_or_else(|| LocationError::Unavailable(self.device.clone()))
    }
}

impl LocationSource for NmeaSerialSource {
    fn read_fix(&mut self) -> Result<GeoPoint, LocationError> {
        let mut line = String::new();
        for _ in 0..MAX_LINES_PER_SAMPLE {
            line.clear();
            let read = match self.reader()?.read_line(&mut line) {
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    return Err(LocationError::NoFix)
                }
                Err(e) => {
                    // Drop the port so the next sample reopens it
                    self.reader = None;
                    return Err(LocationError::Io(e));
                }
            };
            if read == 0 {
                self.reader = None;
                return Err(LocationError::Unavailable(format!("{}: end of stream", self.device)));
            }

            match parse_sentence(&line) {
                Ok(Some(fix)) => return Ok(fix),
                Ok(None) => {}
                Err(e) => debug!("Skipping NMEA sentence: {}", e),
            }
        }
        Err(LocationError::NoFix)
    }

    fn describe(&self) -> String {
        format!("nmea:{}", self.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rmc() {
        let sentence = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A";
        let fix = parse_sentence(sentence).unwrap().unwrap();
        assert!((fix.latitude - 48.1173).abs() < 1e-4);
        assert!((fix.longitude - 11.516_666).abs() < 1e-4);
    }

    #[test]
    fn test_parse_gga() {
        let sentence = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
        let fix = parse_sentence(sentence).unwrap().unwrap();
        assert!((fix.latitude - 48.1173).abs() < 1e-4);
    }

    #[test]
    fn test_southern_western_hemispheres() {
        // checksum computed for this payload
        let payload = "GNRMC,000000,A,0612.000,S,10648.000,W,0.0,0.0,010124,,";
        let checksum = payload.bytes().fold(0u8, |acc, b| acc ^ b);
        let sentence = format!("${}*{:02X}", payload, checksum);

        let fix = parse_sentence(&sentence).unwrap().unwrap();
        assert!((fix.latitude + 6.2).abs() < 1e-9);
        assert!((fix.longitude + 106.8).abs() < 1e-9);
    }

    #[test]
    fn test_checksum_mismatch() {
        let sentence = "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*00";
        let result = parse_sentence(sentence);
        assert!(matches!(result, Err(LocationError::Checksum { expected: 0x00, actual: 0x6A })));
    }

    #[test]
    fn test_void_fix_is_ignored() {
        let payload = "GPRMC,123519,V,,,,,,,230394,,";
        let checksum = payload.bytes().fold(0u8, |acc, b| acc ^ b);
        let sentence = format!("${}*{:02X}", payload, checksum);
        assert_eq!(parse_sentence(&sentence).unwrap(), None);

        let payload = "GPGGA,123519,,,,,0,00,,,M,,M,,";
        let checksum = payload.bytes().fold(0u8, |acc, b| acc ^ b);
        let sentence = format!("${}*{:02X}", payload, checksum);
        assert_eq!(parse_sentence(&sentence).unwrap(), None);
    }

    #[test]
    fn test_other_sentences_are_ignored() {
        assert_eq!(parse_sentence("$GPGSV,1,1,00").unwrap(), None);
        assert!(parse_sentence("garbage").is_err());
    }

    fn with_checksum(payload: &str) -> String {
        let checksum = payload.bytes().fold(0u8, |acc, b| acc ^ b);
        format!("${}*{:02X}", payload, checksum)
    }

    #[test]
    fn test_non_ascii_is_a_parse_error() {
        assert!(matches!(parse_sentence("$GPéXX,1"), Err(LocationError::Parse(_))));

        let sentence =
            with_checksum("GPRMC,123519,A,4é07.038,N,01131.000,E,022.4,084.4,230394,003.1,W");
        assert!(matches!(parse_sentence(&sentence), Err(LocationError::Parse(_))));
    }

    #[test]
    fn test_non_numeric_coordinates_are_rejected() {
        for lat in ["48NaN", "48inf", "4807.0e1", "-4807.038"] {
            let sentence = with_checksum(&format!(
                "GPRMC,123519,A,{},N,01131.000,E,022.4,084.4,230394,003.1,W",
                lat
            ));
            assert!(
                matches!(parse_sentence(&sentence), Err(LocationError::Parse(_))),
                "accepted {}",
                lat
            );
        }
    }

    #[test]
    fn test_out_of_range_coordinates_are_rejected() {
        // 95 degrees latitude and 60+ minutes
        for lat in ["9500.000", "4861.000"] {
            let sentence = with_checksum(&format!(
                "GPGGA,123519,{},N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,",
                lat
            ));
            assert!(matches!(parse_sentence(&sentence), Err(LocationError::Parse(_))));
        }
    }
}
