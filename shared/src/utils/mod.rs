//! Utility functions and helpers

pub mod time;

use anyhow::{Context, Result};

/// Bytes per mebibyte
pub const MIB: u64 = 1 << 20;

/// Bytes per gibibyte
pub const GIB: u64 = 1 << 30;

/// Convert bytes to mebibytes
pub fn bytes_to_mib(bytes: u64) -> f64 {
    bytes as f64 / MIB as f64
}

/// Render a byte count as mebibytes with two fraction digits.
///
/// Every report format goes through this function so the numbers they show
/// are identical.
pub fn format_mib(bytes: u64) -> String {
    format!("{:.2}", bytes_to_mib(bytes))
}

/// Signed variant of [`format_mib`] for memory deltas
pub fn format_signed_mib(bytes: i64) -> String {
    format!("{:.2}", bytes as f64 / MIB as f64)
}

/// Fractional variant of [`format_mib`] for averages
pub fn format_mib_f64(bytes: f64) -> String {
    format!("{:.2}", bytes / MIB as f64)
}

/// Render a byte count as gibibytes with two fraction digits
pub fn format_gib(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / GIB as f64)
}

/// Render seconds with three fraction digits
pub fn format_seconds(seconds: f64) -> String {
    format!("{:.3}", seconds)
}

/// Parse a size string (e.g., "512", "300MB", "1.5GB") into bytes.
///
/// `KB`/`MB`/`GB` are binary multiples, as GPU memory counters are reported
/// in binary units. `KiB`/`MiB`/`GiB` are accepted as aliases.
pub fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim();
    let upper = s.to_uppercase();

    let (num_str, multiplier) = [
        ("GIB", GIB),
        ("MIB", MIB),
        ("KIB", 1 << 10),
        ("GB", GIB),
        ("MB", MIB),
        ("KB", 1 << 10),
        ("B", 1),
    ]
    .iter()
    .find_map(|(suffix, mult)| upper.strip_suffix(suffix).map(|n| (n, *mult)))
    .unwrap_or((upper.as_str(), 1));

    let value: f64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid size: {}", s))?;
    if !value.is_finite() || value < 0.0 {
        anyhow::bail!("Size must be a non-negative number: {}", s);
    }

    Ok((value * multiplier as f64).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mib() {
        assert_eq!(format_mib(150 * MIB), "150.00");
        assert_eq!(format_mib(MIB / 2), "0.50");
        assert_eq!(format_mib(0), "0.00");
    }

    #[test]
    fn test_format_signed_mib() {
        assert_eq!(format_signed_mib(-(20 * MIB as i64)), "-20.00");
        assert_eq!(format_signed_mib(1_750 * MIB as i64), "1750.00");
    }

    #[test]
    fn test_format_gib_and_seconds() {
        assert_eq!(format_gib(24 * GIB), "24.00");
        assert_eq!(format_seconds(1.2), "1.200");
        assert_eq!(format_seconds(0.0006), "0.001");
    }

    #[test]
    fn test_format_mib_f64() {
        assert_eq!(format_mib_f64(1075.0 * MIB as f64), "1075.00");
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size("300MB").unwrap(), 300 * MIB);
        assert_eq!(parse_size("2 GiB").unwrap(), 2 * GIB);
        assert_eq!(parse_size("1.5gb").unwrap(), GIB + GIB / 2);
        assert!(parse_size("lots").is_err());
        assert!(parse_size("-1MB").is_err());
    }
}
