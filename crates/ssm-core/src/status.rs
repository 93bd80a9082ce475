//! Normalized mechanical status.
//!
//! [`translate`] is pure and total: every raw record maps to exactly one
//! normalized record, and the same input always gives the same output.

use serde::{Deserialize, Serialize};
use ssm_proto::RawMechStatus;

/// Battery curve, volts (descending) to percent.
const BATTERY_CURVE: [(f64, f64); 16] = [
    (5.85, 100.0),
    (5.82, 95.0),
    (5.79, 90.0),
    (5.76, 85.0),
    (5.73, 80.0),
    (5.70, 70.0),
    (5.65, 60.0),
    (5.60, 50.0),
    (5.55, 40.0),
    (5.50, 32.0),
    (5.40, 21.0),
    (5.20, 13.0),
    (5.10, 10.0),
    (5.00, 7.0),
    (4.80, 3.0),
    (4.60, 0.0),
];

/// Lock state derived from the status flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockStatus {
    /// Mechanism reports a critical condition
    Critical,
    /// Motor stopped
    Stopped,
    /// Inside the lock range
    Locked,
    /// Inside the unlock range
    Unlocked,
    /// No flag applies
    Unknown,
}

/// Status record handed to callers.
///
/// Serializes with the field names of the vendor web API.
///
/// `received_at` is the local wall-clock time at which the frame was decoded.
/// It is not the time the vendor app or cloud would log for the same event
/// and may diverge from vendor history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MechStatus {
    /// Estimated charge, 0 to 100
    #[serde(rename = "batteryPercentage")]
    pub battery_percentage: u8,
    /// Battery voltage in volts
    #[serde(rename = "batteryVoltage")]
    pub battery_voltage: f64,
    /// Thumb-turn position, as reported
    pub position: i16,
    /// Lock state
    #[serde(rename = "CHSesame2Status")]
    pub status: LockStatus,
    /// Unix seconds at which the frame was decoded
    #[serde(rename = "timestamp")]
    pub received_at: u64,
}

/// Normalize a raw record.
pub fn translate(raw: &RawMechStatus, received_at: u64) -> MechStatus {
    let voltage = battery_voltage(raw.battery);

    MechStatus {
        battery_percentage: battery_percentage(voltage),
        battery_voltage: voltage,
        position: raw.position,
        status: lock_status(raw),
        received_at,
    }
}

/// Convert a raw battery reading to volts (`raw × 2 / 1000`).
pub fn battery_voltage(raw: u16) -> f64 {
    f64::from(raw) * 2.0 / 1000.0
}

/// Estimate charge from voltage by linear interpolation over the curve.
///
/// At or above the top point is 100, at or below the bottom point is 0.
/// Results are truncated toward zero.
pub fn battery_percentage(voltage: f64) -> u8 {
    let (top_volts, top_percent) = BATTERY_CURVE[0];
    let (bottom_volts, bottom_percent) = BATTERY_CURVE[BATTERY_CURVE.len() - 1];

    if voltage.is_nan() || voltage <= bottom_volts {
        return bottom_percent as u8;
    }
    if voltage >= top_volts {
        return top_percent as u8;
    }

    for pair in BATTERY_CURVE.windows(2) {
        let [(upper_volts, upper_percent), (lower_volts, lower_percent)] = pair else {
            continue;
        };
        if *lower_volts < voltage && voltage <= *upper_volts {
            let ratio = (voltage - lower_volts) / (upper_volts - lower_volts);
            let percent = (upper_percent - lower_percent) * ratio + lower_percent;
            return percent.clamp(0.0, 100.0) as u8;
        }
    }

    bottom_percent as u8
}

fn lock_status(raw: &RawMechStatus) -> LockStatus {
    if raw.is_critical {
        LockStatus::Critical
    } else if raw.is_stop {
        LockStatus::Stopped
    } else if raw.is_lock_range {
        LockStatus::Locked
    } else if raw.is_unlock_range {
        LockStatus::Unlocked
    } else {
        LockStatus::Unknown
    }
}
