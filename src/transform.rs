//! Derivation of published electrical metrics from a raw Envoy sample
//!
//! The Envoy only reports total production power and lifetime energy. The
//! single-phase line values Venus OS expects are derived from those with a
//! fixed nominal grid voltage.

use crate::telemetry::TelemetrySample;

/// Nominal line voltage used for the L1 current estimate
pub const NOMINAL_LINE_VOLTAGE: f64 = 230.0;

/// Metrics published for one successful cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedMetrics {
    /// AC output power in watts, never negative
    pub ac_power_w: f64,
    /// Lifetime forward energy in kWh, 3 decimals
    pub ac_energy_forward_kwh: f64,
    /// Always [`NOMINAL_LINE_VOLTAGE`]; the Envoy does not report it
    pub line_voltage_v: f64,
    /// L1 current in amperes, 3 decimals
    pub line_current_a: f64,
}

impl DerivedMetrics {
    /// D-Bus path/value pairs for this cycle, in publish order
    pub fn to_path_updates(&self) -> Vec<(String, serde_json::Value)> {
        vec![
            (
                "/Ac/Energy/Forward".to_string(),
                serde_json::json!(self.ac_energy_forward_kwh),
            ),
            ("/Ac/Power".to_string(), whole_number(self.ac_power_w)),
            ("/Ac/L1/Power".to_string(), whole_number(self.ac_power_w)),
            (
                "/Ac/L1/Voltage".to_string(),
                whole_number(self.line_voltage_v),
            ),
            (
                "/Ac/L1/Current".to_string(),
                serde_json::json!(self.line_current_a),
            ),
        ]
    }
}

/// Integral values go out as integers so readers see `i`, not `d`
fn whole_number(value: f64) -> serde_json::Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        serde_json::json!(value as i64)
    } else {
        serde_json::json!(value)
    }
}

/// Round to `decimals` places using the exact binary value, so 1.0005
/// (stored as 1.000499...) rounds down. Exact ties go to even.
pub fn round_to(value: f64, decimals: usize) -> f64 {
    format!("{:.*}", decimals, value).parse().unwrap_or(value)
}

/// Compute the published metrics for one sample. Pure and deterministic.
pub fn transform(sample: &TelemetrySample) -> DerivedMetrics {
    // Night-time readings dip slightly below zero
    let ac_power_w = sample.instantaneous_power_w.max(0.0);
    let ac_energy_forward_kwh = round_to(sample.lifetime_energy_wh / 1000.0, 3);
    let line_current_a = round_to(ac_power_w / NOMINAL_LINE_VOLTAGE, 3);

    DerivedMetrics {
        ac_power_w,
        ac_energy_forward_kwh,
        line_voltage_v: NOMINAL_LINE_VOLTAGE,
        line_current_a,
    }
}
