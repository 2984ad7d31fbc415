//! Utility functions for the Stowkey CLI

use chrono::{DateTime, Utc};
use std::io::{self, Write};

/// Format a datetime for display
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Format size as human readable
pub fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Confirm an action with the user
pub fn confirm(message: &str) -> io::Result<bool> {
    print!("{} [y/N]: ", message);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Parse a `key=value` metadata argument
pub fn parse_metadata(arg: &str) -> Result<(String, String), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", arg))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("metadata key is empty in '{}'", arg));
    }
    Ok((key.to_lowercase(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_metadata() {
        assert_eq!(
            parse_metadata("Owner=42").unwrap(),
            ("owner".to_string(), "42".to_string())
        );
        assert_eq!(
            parse_metadata("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert_eq!(parse_metadata("empty=").unwrap().1, "");
        assert!(parse_metadata("novalue").is_err());
        assert!(parse_metadata("=value").is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(5 * 1024 * 1024), "5 MiB");
    }

    #[test]
    fn test_format_datetime() {
        let dt = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
        assert_eq!(format_datetime(&dt), "1970-01-01 00:00:00 UTC");
    }
}
