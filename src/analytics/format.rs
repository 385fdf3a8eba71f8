//! Display helpers for KPI values

use super::summary::Change;

/// Compact enrollment count: `1.23M`, `4.5K`, `999`
pub fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Signed percentage with one decimal, or `N/A`
pub fn format_pct(change: Option<&Change>) -> String {
    match change {
        Some(c) => format!("{:+.1}%", c.pct),
        None => "N/A".to_string(),
    }
}

/// Signed absolute delta, or `N/A`
pub fn format_delta(change: Option<&Change>) -> String {
    match change {
        Some(c) if c.absolute >= 0 => format!("+{}", c.absolute),
        Some(c) => c.absolute.to_string(),
        None => "N/A".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(1_234_567), "1.23M");
        assert_eq!(format_count(4_500), "4.5K");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(0), "0");
    }

    #[test]
    fn test_format_change() {
        let up = Change::between(110, 100).unwrap();
        let down = Change::between(90, 100).unwrap();
        assert_eq!(format_pct(Some(&up)), "+10.0%");
        assert_eq!(format_pct(Some(&down)), "-10.0%");
        assert_eq!(format_delta(Some(&up)), "+10");
        assert_eq!(format_delta(Some(&down)), "-10");
        assert_eq!(format_pct(None), "N/A");
        assert_eq!(format_delta(None), "N/A");
    }
}
