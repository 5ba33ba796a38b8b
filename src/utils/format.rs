//! Display formatting for relay quantities.

/// Shown where a trip time does not exist.
pub const UNDEFINED_PLACEHOLDER: &str = "n/a";

/// Pickup current with two decimals, e.g. `1000.00 A`.
pub fn format_pickup(amps: f64) -> String {
    format!("{:.2} A", amps)
}

/// Time multiplier with three decimals, e.g. `0.058`.
pub fn format_tms(tms: f64) -> String {
    format!("{:.3}", tms)
}

/// Trip time with three decimals and unit, or the placeholder.
pub fn format_trip_time(seconds: Option<f64>) -> String {
    match seconds {
        Some(t) if t.is_finite() => format!("{:.3} s", t),
        _ => UNDEFINED_PLACEHOLDER.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_pickup() {
        assert_eq!(format_pickup(1000.0), "1000.00 A");
        assert_eq!(format_pickup(1040.004), "1040.00 A");
    }

    #[test]
    fn test_format_tms() {
        assert_eq!(format_tms(0.1), "0.100");
        assert_eq!(format_tms(0.058412), "0.058");
    }

    #[test]
    fn test_format_trip_time() {
        assert_eq!(format_trip_time(Some(0.25)), "0.250 s");
        assert_eq!(format_trip_time(None), "n/a");
        assert_eq!(format_trip_time(Some(f64::INFINITY)), "n/a");
    }
}
