/// Reasons a decimal string can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DecimalError {
    Empty,
    InvalidDigit(char),
    Overflow,
}

impl std::fmt::Display for DecimalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecimalError::Empty => f.write_str("empty input"),
            DecimalError::InvalidDigit(c) => write!(f, "unexpected character {c:?}"),
            DecimalError::Overflow => f.write_str("value out of range"),
        }
    }
}

/// Parses an unsigned ASCII decimal no greater than `max`.
///
/// Signs, whitespace and separators are rejected. Overflow is caught before
/// each multiply-add instead of relying on wrapping arithmetic.
pub(crate) fn parse_bounded(text: &str, max: u64) -> Result<u64, DecimalError> {
    if text.is_empty() {
        return Err(DecimalError::Empty);
    }

    let mut value: u64 = 0;
    for c in text.chars() {
        let digit = u64::from(c.to_digit(10).ok_or(DecimalError::InvalidDigit(c))?);
        let headroom = max.checked_sub(digit).ok_or(DecimalError::Overflow)?;
        if value > headroom / 10 {
            return Err(DecimalError::Overflow);
        }
        value = value * 10 + digit;
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_digits() {
        assert_eq!(parse_bounded("0", u64::MAX), Ok(0));
        assert_eq!(parse_bounded("007", u64::MAX), Ok(7));
        assert_eq!(parse_bounded("18446744073709551615", u64::MAX), Ok(u64::MAX));
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(parse_bounded("", 10), Err(DecimalError::Empty));
        assert_eq!(parse_bounded("1a", 100), Err(DecimalError::InvalidDigit('a')));
        assert_eq!(parse_bounded("-1", 100), Err(DecimalError::InvalidDigit('-')));
        assert_eq!(parse_bounded(" 1", 100), Err(DecimalError::InvalidDigit(' ')));
    }

    #[test]
    fn overflow_is_detected_at_the_bound() {
        assert_eq!(parse_bounded("10", 10), Ok(10));
        assert_eq!(parse_bounded("11", 10), Err(DecimalError::Overflow));
        assert_eq!(parse_bounded("100", 10), Err(DecimalError::Overflow));
        assert_eq!(
            parse_bounded("18446744073709551616", u64::MAX),
            Err(DecimalError::Overflow)
        );
    }
}
