//! Human-readable count formatting.

/// Format a count the way listing UIs display it: "512", "1.2k", "3.4m".
///
/// Deterministic and informational only; formatted values are never parsed
/// back.
#[must_use]
pub fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format_scaled(n, 1_000_000, 'm')
    } else if n >= 1_000 {
        format_scaled(n, 1_000, 'k')
    } else {
        n.to_string()
    }
}

/// One decimal place, truncated not rounded, with a trailing `.0` dropped.
fn format_scaled(n: u64, unit: u64, suffix: char) -> String {
    let whole = n / unit;
    let tenth = (n % unit) * 10 / unit;
    if tenth == 0 {
        format!("{whole}{suffix}")
    } else {
        format!("{whole}.{tenth}{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_counts_stay_plain() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(42), "42");
        assert_eq!(format_count(999), "999");
    }

    #[test]
    fn thousands_get_one_decimal() {
        assert_eq!(format_count(1_000), "1k");
        assert_eq!(format_count(1_234), "1.2k");
        assert_eq!(format_count(999_999), "999.9k");
    }

    #[test]
    fn millions_get_one_decimal() {
        assert_eq!(format_count(1_000_000), "1m");
        assert_eq!(format_count(3_400_000), "3.4m");
        assert_eq!(format_count(12_345_678), "12.3m");
    }

    #[test]
    fn truncates_rather_than_rounds() {
        // 1,999 is 1.999k; display truncates to 1.9k.
        assert_eq!(format_count(1_999), "1.9k");
    }
}
