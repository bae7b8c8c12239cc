//! Cadence interval parsing.
//!
//! Accepts a sequence of `<decimal><unit>` pairs such as `6h`, `1h30m`,
//! `1.5s` or `250ms`. Units: `ns`, `us` (`µs`), `ms`, `s`, `m`, `h`.
//! The result must be strictly positive.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntervalError {
    #[error("empty duration")]
    Empty,

    #[error("invalid duration \"{0}\"")]
    Malformed(String),

    #[error("missing unit in duration \"{0}\"")]
    MissingUnit(String),

    #[error("unknown unit \"{unit}\" in duration \"{input}\"")]
    UnknownUnit { unit: String, input: String },

    #[error("duration \"{0}\" must be positive")]
    NotPositive(String),

    #[error("duration \"{0}\" is too large")]
    Overflow(String),
}

const NANOS_PER_UNIT: &[(&str, u64)] = &[
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("μs", 1_000),
    ("ms", 1_000_000),
    ("s", 1_000_000_000),
    ("m", 60 * 1_000_000_000),
    ("h", 60 * 60 * 1_000_000_000),
];

/// Parse a positive cadence interval.
pub fn parse_interval(input: &str) -> Result<Duration, IntervalError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(IntervalError::Empty);
    }

    let (negative, mut rest) = match trimmed.as_bytes()[0] {
        b'-' => (true, &trimmed[1..]),
        b'+' => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    if rest.is_empty() {
        return Err(IntervalError::Malformed(input.to_string()));
    }
    if rest == "0" {
        return Err(IntervalError::NotPositive(input.to_string()));
    }

    let mut total_nanos: f64 = 0.0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = &rest[..number_len];
        if number.is_empty() || number == "." {
            return Err(IntervalError::Malformed(input.to_string()));
        }
        let value: f64 = number
            .parse()
            .map_err(|_| IntervalError::Malformed(input.to_string()))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        if unit.is_empty() {
            return Err(IntervalError::MissingUnit(input.to_string()));
        }
        let scale = NANOS_PER_UNIT
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, nanos)| *nanos)
            .ok_or_else(|| IntervalError::UnknownUnit {
                unit: unit.to_string(),
                input: input.to_string(),
            })?;
        rest = &rest[unit_len..];

        total_nanos += value * scale as f64;
    }

    if total_nanos > u64::MAX as f64 {
        return Err(IntervalError::Overflow(input.to_string()));
    }
    let nanos = total_nanos.round() as u64;
    if negative || nanos == 0 {
        return Err(IntervalError::NotPositive(input.to_string()));
    }
    Ok(Duration::from_nanos(nanos))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("6h", Duration::from_secs(6 * 3600))]
    #[case("24h", Duration::from_secs(24 * 3600))]
    #[case("1h30m", Duration::from_secs(5400))]
    #[case("90s", Duration::from_secs(90))]
    #[case("1.5s", Duration::from_millis(1500))]
    #[case("250ms", Duration::from_millis(250))]
    #[case("10us", Duration::from_micros(10))]
    #[case("10µs", Duration::from_micros(10))]
    #[case(" 5m ", Duration::from_secs(300))]
    #[case("+1m", Duration::from_secs(60))]
    fn accepts(#[case] input: &str, #[case] expected: Duration) {
        assert_eq!(parse_interval(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("invalid")]
    #[case("10")]
    #[case("5x")]
    #[case("0")]
    #[case("0s")]
    #[case("-1h")]
    #[case("h")]
    #[case("1..5s")]
    fn rejects(#[case] input: &str) {
        assert!(parse_interval(input).is_err(), "{input:?} should be rejected");
    }

    #[test]
    fn error_messages_name_the_problem() {
        assert_eq!(
            parse_interval("not-a-duration").unwrap_err(),
            IntervalError::Malformed("not-a-duration".to_string())
        );
        assert!(matches!(
            parse_interval("3d").unwrap_err(),
            IntervalError::UnknownUnit { unit, .. } if unit == "d"
        ));
        assert!(parse_interval("-1h")
            .unwrap_err()
            .to_string()
            .contains("must be positive"));
    }
}
