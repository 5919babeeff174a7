//! Duration tokens from the verbose timing lines.
//!
//! The CLI prints Go-style durations: `1m30.5s`, `812.4ms`, `250µs`, `2.5s`.
//! A token is a run of `<number><unit>` components whose values are summed;
//! a bare number right after minutes counts as seconds (`1m30`).
//! Units are matched longest-first so the `ms` suffix is never read as the
//! minute marker `m`.

/// Recognized units, longest first.
const UNITS: &[&str] = &["ms", "µs", "μs", "us", "ns", "h", "m", "s"];

/// Why a duration token could not be converted.
#[derive(Debug, Clone, PartialEq)]
pub enum DurationError {
    /// Token was empty after trimming.
    Empty,
    /// A number with no unit after it (e.g. `12`).
    MissingUnit { token: String },
    /// Text after a number that is not a known unit.
    UnknownUnit { token: String, unit: String },
    /// The numeric part of a component did not parse.
    InvalidNumber { token: String, number: String },
}

impl std::fmt::Display for DurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DurationError::Empty => write!(f, "empty duration"),
            DurationError::MissingUnit { token } => {
                write!(f, "duration {token:?} has no unit")
            }
            DurationError::UnknownUnit { token, unit } => {
                write!(f, "duration {token:?} has unknown unit {unit:?}")
            }
            DurationError::InvalidNumber { token, number } => {
                write!(f, "duration {token:?} has invalid number {number:?}")
            }
        }
    }
}

impl std::error::Error for DurationError {}

/// Parse a duration token into seconds.
pub fn parse_duration(token: &str) -> Result<f64, DurationError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(DurationError::Empty);
    }

    let mut rest = token;
    let mut total = 0.0;
    let mut previous: Option<&str> = None;
    while !rest.is_empty() {
        let split = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(split);
        if tail.is_empty() && previous == Some("m") {
            // `1m30` reads the trailing number as seconds
            let seconds: f64 = number.parse().map_err(|_| DurationError::InvalidNumber {
                token: token.to_string(),
                number: number.to_string(),
            })?;
            return Ok(total + seconds);
        }
        if tail.is_empty() {
            return Err(DurationError::MissingUnit {
                token: token.to_string(),
            });
        }

        let unit = UNITS
            .iter()
            .find(|u| tail.starts_with(**u))
            .ok_or_else(|| DurationError::UnknownUnit {
                token: token.to_string(),
                unit: tail.to_string(),
            })?;

        let value: f64 = number.parse().map_err(|_| DurationError::InvalidNumber {
            token: token.to_string(),
            number: number.to_string(),
        })?;

        total += to_seconds(value, unit);
        previous = Some(*unit);
        rest = &tail[unit.len()..];
    }

    Ok(total)
}

fn to_seconds(value: f64, unit: &str) -> f64 {
    match unit {
        "h" => value * 3600.0,
        "m" => value * 60.0,
        "ms" => value / 1_000.0,
        "µs" | "μs" | "us" => value / 1_000_000.0,
        "ns" => value / 1_000_000_000.0,
        _ => value,
    }
}

/// Lenient conversion used by the extractor.
///
/// Absent or blank tokens yield `None` silently. Anything else that fails to
/// parse yields `None` with a warning, so one bad field never costs the rest
/// of the record.
pub fn duration_to_seconds(token: Option<&str>) -> Option<f64> {
    let token = token?;
    match parse_duration(token) {
        Ok(secs) => Some(secs),
        Err(DurationError::Empty) => None,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable duration, leaving field empty");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minutes_and_seconds() {
        assert_eq!(parse_duration("1m30s"), Ok(90.0));
    }

    #[test]
    fn test_minutes_and_fractional_seconds() {
        assert_eq!(parse_duration("1m30.5s"), Ok(90.5));
    }

    #[test]
    fn test_minutes_only() {
        assert_eq!(parse_duration("2m"), Ok(120.0));
    }

    #[test]
    fn test_milliseconds() {
        assert_eq!(parse_duration("500ms"), Ok(0.5));
    }

    #[test]
    fn test_fractional_milliseconds() {
        let secs = parse_duration("812.4ms").unwrap();
        assert!((secs - 0.8124).abs() < 1e-12);
    }

    #[test]
    fn test_microseconds_micro_sign() {
        assert_eq!(parse_duration("250µs"), Ok(0.00025));
    }

    #[test]
    fn test_microseconds_greek_mu_and_ascii() {
        assert_eq!(parse_duration("250μs"), Ok(0.00025));
        assert_eq!(parse_duration("250us"), Ok(0.00025));
    }

    #[test]
    fn test_plain_seconds() {
        assert_eq!(parse_duration("2.5s"), Ok(2.5));
    }

    #[test]
    fn test_hours_minutes_seconds() {
        assert_eq!(parse_duration("1h2m3s"), Ok(3723.0));
    }

    #[test]
    fn test_nanoseconds() {
        let secs = parse_duration("750ns").unwrap();
        assert!((secs - 7.5e-7).abs() < 1e-18);
    }

    #[test]
    fn test_surrounding_whitespace_trimmed() {
        assert_eq!(parse_duration("  4.25s \n"), Ok(4.25));
    }

    #[test]
    fn test_empty_token() {
        assert_eq!(parse_duration(""), Err(DurationError::Empty));
        assert_eq!(parse_duration("   "), Err(DurationError::Empty));
    }

    #[test]
    fn test_missing_unit() {
        assert!(matches!(
            parse_duration("12"),
            Err(DurationError::MissingUnit { .. })
        ));
        // Only a minutes component implies seconds for a bare trailing number
        assert!(matches!(
            parse_duration("1h30"),
            Err(DurationError::MissingUnit { .. })
        ));
    }

    #[test]
    fn test_minutes_with_unsuffixed_seconds() {
        assert_eq!(parse_duration("1m30"), Ok(90.0));
        assert_eq!(parse_duration("2m7.5"), Ok(127.5));
        assert_eq!(duration_to_seconds(Some("1m30")), Some(90.0));
        assert!(matches!(
            parse_duration("1m3.0.1"),
            Err(DurationError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_unknown_unit() {
        let err = parse_duration("3d").unwrap_err();
        assert_eq!(
            err,
            DurationError::UnknownUnit {
                token: "3d".to_string(),
                unit: "d".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_number() {
        assert!(matches!(
            parse_duration("1.2.3s"),
            Err(DurationError::InvalidNumber { .. })
        ));
        assert!(matches!(
            parse_duration("ms"),
            Err(DurationError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_error_display_names_token() {
        let err = parse_duration("1.2.3s").unwrap_err();
        assert!(err.to_string().contains("1.2.3s"));
    }

    #[test]
    fn test_lenient_absent_and_empty() {
        assert_eq!(duration_to_seconds(None), None);
        assert_eq!(duration_to_seconds(Some("")), None);
    }

    #[test]
    fn test_lenient_malformed_is_none() {
        assert_eq!(duration_to_seconds(Some("abc")), None);
        assert_eq!(duration_to_seconds(Some("1.2.3ms")), None);
    }

    #[test]
    fn test_lenient_valid() {
        assert_eq!(duration_to_seconds(Some("1m30s")), Some(90.0));
    }
}
