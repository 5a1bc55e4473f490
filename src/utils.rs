use std::str::FromStr;
use tokio::time::Duration;

/// Parses a duration string in the format "250ms", "30s", "10m", "5h", "3d".
///
/// Supported units:
/// - `ms` for milliseconds
/// - `s` for seconds
/// - `m` for minutes
/// - `h` for hours
/// - `d` for days
pub fn parse_duration_string(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration string cannot be empty".to_string());
    }

    let split_at = s
        .find(|c: char| !c.is_ascii_digit() && c != '-' && c != '.')
        .unwrap_or(s.len());
    let (value_str, unit) = s.split_at(split_at);

    let value = match u64::from_str(value_str) {
        Ok(v) => v,
        Err(_) => {
            return Err(format!(
                "Invalid numeric value in duration: '{}'",
                value_str
            ))
        }
    };

    let seconds_per_unit = match unit {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => {
            return Err(format!(
                "Unknown duration unit: '{}'. Use 'ms', 's', 'm', 'h', or 'd'.",
                unit
            ))
        }
    };

    value
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("Duration value too large: '{}'", s))
}

/// Parses a comma-separated header string with support for escaped commas.
///
/// Use `\,` to include a literal comma in a header value.
/// Example: "X-Env:staging,Accept:text/html\,application/json"
pub fn parse_headers_with_escapes(headers_str: &str) -> Vec<String> {
    let mut headers = Vec::new();
    let mut current = String::new();
    let mut chars = headers_str.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&',') => {
                current.push(',');
                chars.next();
            }
            ',' => {
                if !current.trim().is_empty() {
                    headers.push(std::mem::take(&mut current));
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if !current.trim().is_empty() {
        headers.push(current);
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    mod duration {
        use super::*;

        #[test]
        fn parse_milliseconds() {
            assert_eq!(
                parse_duration_string("250ms").unwrap(),
                Duration::from_millis(250)
            );
        }

        #[test]
        fn parse_seconds() {
            assert_eq!(parse_duration_string("5s").unwrap(), Duration::from_secs(5));
        }

        #[test]
        fn parse_minutes_and_hours() {
            assert_eq!(
                parse_duration_string("10m").unwrap(),
                Duration::from_secs(600)
            );
            assert_eq!(
                parse_duration_string("2h").unwrap(),
                Duration::from_secs(7200)
            );
        }

        #[test]
        fn parse_days() {
            assert_eq!(
                parse_duration_string("1d").unwrap(),
                Duration::from_secs(86400)
            );
        }

        #[test]
        fn parse_zero() {
            assert_eq!(parse_duration_string("0s").unwrap(), Duration::ZERO);
        }

        #[test]
        fn trims_whitespace() {
            assert_eq!(
                parse_duration_string("  10s  ").unwrap(),
                Duration::from_secs(10)
            );
        }

        #[test]
        fn empty_string_errors() {
            let err = parse_duration_string("   ").unwrap_err();
            assert!(err.contains("empty"), "error was: {}", err);
        }

        #[test]
        fn no_suffix_errors() {
            let err = parse_duration_string("10").unwrap_err();
            assert!(err.contains("Unknown duration unit"), "error was: {}", err);
        }

        #[test]
        fn unknown_suffix_errors() {
            let err = parse_duration_string("10x").unwrap_err();
            assert!(err.contains("Unknown duration unit"), "error was: {}", err);
        }

        #[test]
        fn no_number_errors() {
            let err = parse_duration_string("ms").unwrap_err();
            assert!(err.contains("Invalid numeric"), "error was: {}", err);
        }

        #[test]
        fn negative_and_fractional_error() {
            let err = parse_duration_string("-5s").unwrap_err();
            assert!(err.contains("Invalid numeric"), "error was: {}", err);
            let err = parse_duration_string("1.5s").unwrap_err();
            assert!(err.contains("Invalid numeric"), "error was: {}", err);
        }

        #[test]
        fn overflowing_value_errors() {
            let err = parse_duration_string("307445734561825861m").unwrap_err();
            assert!(err.contains("too large"), "error was: {}", err);
            let err = parse_duration_string("18446744073709551615d").unwrap_err();
            assert!(err.contains("too large"), "error was: {}", err);
        }

        #[test]
        fn largest_seconds_value_still_parses() {
            assert_eq!(
                parse_duration_string("18446744073709551615s").unwrap(),
                Duration::from_secs(u64::MAX)
            );
        }
    }

    #[test]
    fn test_parse_headers_simple() {
        let result = parse_headers_with_escapes("X-Env:staging,X-Team:observability");

        assert_eq!(result, vec!["X-Env:staging", "X-Team:observability"]);
    }

    #[test]
    fn test_parse_headers_with_escaped_comma() {
        let result = parse_headers_with_escapes("Accept:text/html\\,application/json,X-A:b");

        assert_eq!(result.len(), 2);
        assert_eq!(result[0], "Accept:text/html,application/json");
        assert_eq!(result[1], "X-A:b");
    }

    #[test]
    fn test_parse_headers_backslash_not_before_comma() {
        let result = parse_headers_with_escapes("Path:C:\\Users\\test,Host:example.com");

        assert_eq!(result[0], "Path:C:\\Users\\test");
        assert_eq!(result[1], "Host:example.com");
    }

    #[test]
    fn test_parse_headers_skips_empty_segments() {
        let result = parse_headers_with_escapes("A:1,  ,B:2,");

        assert_eq!(result, vec!["A:1", "B:2"]);
    }
}
