//! Session output rendering: the two tabulated blocks written to the session
//! file, plus the JSON summary written beside it.

use crate::error::Result;
use crate::samples::{GpsRecord, ImuRecord};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const IMU_HEADERS: [&str; 4] = [
    "Timestamp",
    "Time (ms)",
    "Acceleration (m/s^2)",
    "Gyroscope (deg/sec)",
];

const GPS_HEADERS: [&str; 6] = [
    "Timestamp",
    "Time (ms)",
    "Latitude (deg)",
    "Longitude (deg)",
    "Altitude (m)",
    "Velocity (m/s)",
];

fn format_vector(vector: &Option<[f64; 3]>) -> String {
    match vector {
        Some([x, y, z]) => format!("({x:.2}, {y:.2}, {z:.2})"),
        None => "-".to_string(),
    }
}

fn pad(cell: &str, width: usize) -> String {
    format!(" {cell:<width$} ")
}

fn rule(widths: &[usize], left: char, line: char, mid: char, right: char) -> String {
    let mut out = String::new();
    out.push(left);
    for (i, width) in widths.iter().enumerate() {
        if i > 0 {
            out.push(mid);
        }
        for _ in 0..width + 2 {
            out.push(line);
        }
    }
    out.push(right);
    out.push('\n');
    out
}

/// Grid table with a boxed header row, one ruled line per data row.
fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut out = String::new();
    out.push_str(&rule(&widths, '╒', '═', '╤', '╕'));

    out.push('│');
    for (header, width) in headers.iter().zip(&widths) {
        out.push_str(&pad(header, *width));
        out.push('│');
    }
    out.push('\n');
    out.push_str(&rule(&widths, '╞', '═', '╪', '╡'));

    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            out.push_str(&rule(&widths, '├', '─', '┼', '┤'));
        }
        out.push('│');
        for (cell, width) in row.iter().zip(&widths) {
            out.push_str(&pad(cell, *width));
            out.push('│');
        }
        out.push('\n');
    }

    out.push_str(&rule(&widths, '╘', '═', '╧', '╛'));
    out
}

pub fn render_imu_block(records: &[ImuRecord]) -> String {
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| {
            vec![
                r.timestamp.clone(),
                r.elapsed_ms.to_string(),
                format_vector(&r.sample.accel),
                format_vector(&r.sample.gyro),
            ]
        })
        .collect();
    render_table(&IMU_HEADERS, &rows)
}

pub fn render_gps_block(records: &[GpsRecord]) -> String {
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| {
            vec![
                r.timestamp.clone(),
                r.elapsed_ms.to_string(),
                r.report.latitude.clone(),
                r.report.longitude.clone(),
                r.report.altitude.clone(),
                r.report.velocity.clone(),
            ]
        })
        .collect();
    render_table(&GPS_HEADERS, &rows)
}

/// Per-session metadata written next to the tabulated log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: String,
    pub duration_ms: u64,
    pub imu_records: usize,
    pub gps_records: usize,
    pub video_enabled: bool,
    pub video_frames: u64,
}

impl SessionSummary {
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)?;
        Ok(())
    }
}
