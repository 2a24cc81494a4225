use crate::error::Error;

pub const KILOBYTE: u64 = 1024;
pub const MEGABYTE: u64 = 1024 * KILOBYTE;
pub const GIGABYTE: u64 = 1024 * MEGABYTE;
pub const TERABYTE: u64 = 1024 * GIGABYTE;

/// Parse a human size like `10G`, `1.5GB`, `500m` or `1024K` into bytes.
/// Units are case-insensitive; the value must be positive.
pub fn parse_size(input: &str) -> Result<u64, Error> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidSize("empty size string".to_string()));
    }

    let split_at = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .ok_or_else(|| invalid_format(trimmed))?;
    let (value_str, unit_str) = trimmed.split_at(split_at);

    let multiplier = match unit_str.trim().to_ascii_uppercase().as_str() {
        "K" | "KB" => KILOBYTE,
        "M" | "MB" => MEGABYTE,
        "G" | "GB" => GIGABYTE,
        "T" | "TB" => TERABYTE,
        _ => return Err(invalid_format(trimmed)),
    };

    if value_str.is_empty() || value_str.matches('.').count() > 1 {
        return Err(invalid_format(trimmed));
    }
    let value: f64 = value_str
        .parse()
        .map_err(|_| Error::InvalidSize(format!("invalid numeric value: {:?}", value_str)))?;
    if value <= 0.0 {
        return Err(Error::InvalidSize(format!("size must be positive: {}", value)));
    }

    let bytes = (value * multiplier as f64) as u64;
    if bytes == 0 {
        return Err(Error::InvalidSize("calculated size must be positive".to_string()));
    }
    Ok(bytes)
}

fn invalid_format(input: &str) -> Error {
    Error::InvalidSize(format!(
        "invalid size format: {:?} (expected format like 10G, 500M, 1.5GB)",
        input
    ))
}

/// `1536` -> `"1.5 KB"`.
pub fn format_size(bytes: u64) -> String {
    match bytes {
        b if b >= TERABYTE => format!("{:.1} TB", b as f64 / TERABYTE as f64),
        b if b >= GIGABYTE => format!("{:.1} GB", b as f64 / GIGABYTE as f64),
        b if b >= MEGABYTE => format!("{:.1} MB", b as f64 / MEGABYTE as f64),
        b if b >= KILOBYTE => format!("{:.1} KB", b as f64 / KILOBYTE as f64),
        b => format!("{} B", b),
    }
}

/// Short form: `1536` -> `"1.5K"`. Values of a kilobyte or more parse back
/// with [`parse_size`].
pub fn format_size_compact(bytes: u64) -> String {
    let (value, unit) = match bytes {
        0 => return "0B".to_string(),
        b if b >= TERABYTE => (b as f64 / TERABYTE as f64, "T"),
        b if b >= GIGABYTE => (b as f64 / GIGABYTE as f64, "G"),
        b if b >= MEGABYTE => (b as f64 / MEGABYTE as f64, "M"),
        b if b >= KILOBYTE => (b as f64 / KILOBYTE as f64, "K"),
        b => return format!("{}B", b),
    };

    if value.fract() == 0.0 {
        return format!("{}{}", value as u64, unit);
    }
    let formatted = format!("{:.2}", value);
    let formatted = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{}{}", formatted, unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("10G").unwrap(), 10 * GIGABYTE);
        assert_eq!(parse_size("500m").unwrap(), 500 * MEGABYTE);
        assert_eq!(parse_size("2TB").unwrap(), 2 * TERABYTE);
        assert_eq!(parse_size("1024K").unwrap(), MEGABYTE);
        assert_eq!(parse_size(" 1.5GB ").unwrap(), GIGABYTE + GIGABYTE / 2);
        assert_eq!(parse_size("10 G").unwrap(), 10 * GIGABYTE);
    }

    #[test]
    fn test_parse_size_rejects_bad_input() {
        for input in ["", "G", "10", "10X", "-5G", "0G", "1.2.3G", "abc"] {
            assert!(parse_size(input).is_err(), "{:?} should be rejected", input);
        }
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(3 * GIGABYTE), "3.0 GB");
    }

    #[test]
    fn test_format_size_compact() {
        assert_eq!(format_size_compact(0), "0B");
        assert_eq!(format_size_compact(100), "100B");
        assert_eq!(format_size_compact(10 * GIGABYTE), "10G");
        assert_eq!(format_size_compact(GIGABYTE + GIGABYTE / 2), "1.5G");
        assert_eq!(
            parse_size(&format_size_compact(MEGABYTE * 3 / 4)).unwrap(),
            MEGABYTE * 3 / 4
        );
    }
}
