use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{DcsimError, Result};

lazy_static! {
    static ref VALUE_PATTERN: Regex = Regex::new(
        r"^([+-]?[0-9]*\.?[0-9]+(?:[eE][+-]?[0-9]+)?)([a-zA-Zµ%]+)$"
    )
    .unwrap();
}

/// Multiplier for a single engineering-suffix character.
///
/// Case matters: `M` is mega, `m` is milli.
fn suffix_multiplier(ch: char) -> Option<f64> {
    match ch {
        'G' => Some(1e9),
        'M' => Some(1e6),
        'k' | 'K' => Some(1e3),
        'm' => Some(1e-3),
        'u' | 'µ' => Some(1e-6),
        'n' => Some(1e-9),
        'p' => Some(1e-12),
        _ => None,
    }
}

/// Parse a textual magnitude like `10k`, `4.7u`, or `-1.5e3` into a number.
///
/// Plain numeric literals parse directly. A literal followed by a suffix is
/// scaled by the suffix multiplier; a multi-character suffix that is not an
/// exact match is scanned character by character and the first recognized
/// character wins (`10kOhm` reads as 10e3).
pub fn parse(token: &str) -> Result<f64> {
    let token = token.trim();

    if let Ok(plain) = token.parse::<f64>() {
        return Ok(plain);
    }

    let captures = VALUE_PATTERN
        .captures(token)
        .ok_or_else(|| DcsimError::value_parse(token, "no numeric prefix"))?;

    let base: f64 = captures
        .get(1)
        .unwrap()
        .as_str()
        .parse()
        .map_err(|_| DcsimError::value_parse(token, "malformed numeric prefix"))?;
    let suffix = captures.get(2).unwrap().as_str();

    // Exact suffixes are single characters, so scanning in order covers both
    // the exact match and the first-recognized-character fallback.
    for ch in suffix.chars() {
        if let Some(multiplier) = suffix_multiplier(ch) {
            return Ok(base * multiplier);
        }
    }

    Err(DcsimError::value_parse(
        token,
        format!("unknown suffix '{}'", suffix),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_literals() {
        assert_eq!(parse("100").unwrap(), 100.0);
        assert_eq!(parse("3.3").unwrap(), 3.3);
        assert_eq!(parse("-12").unwrap(), -12.0);
        assert_eq!(parse("1.5e3").unwrap(), 1500.0);
        assert_eq!(parse("2E-6").unwrap(), 2e-6);
        assert_eq!(parse("  47  ").unwrap(), 47.0);
    }

    #[test]
    fn test_engineering_suffixes() {
        assert_eq!(parse("1G").unwrap(), 1e9);
        assert_eq!(parse("2.2M").unwrap(), 2.2e6);
        assert_eq!(parse("10k").unwrap(), 10e3);
        assert_eq!(parse("10K").unwrap(), 10e3);
        assert_eq!(parse("5m").unwrap(), 5e-3);
        assert_eq!(parse("4.7u").unwrap(), 4.7e-6);
        assert_eq!(parse("4.7µ").unwrap(), 4.7e-6);
        assert_eq!(parse("100n").unwrap(), 100e-9);
        assert_eq!(parse("33p").unwrap(), 33e-12);
    }

    #[test]
    fn test_mega_and_milli_are_distinct() {
        assert_eq!(parse("1M").unwrap(), 1e6);
        assert_eq!(parse("1m").unwrap(), 1e-3);
    }

    #[test]
    fn test_signed_suffixed_values() {
        assert_eq!(parse("-4.7u").unwrap(), -4.7e-6);
        assert_eq!(parse("+10k").unwrap(), 10e3);
    }

    #[test]
    fn test_multichar_suffix_scans_for_prefix() {
        // Unrecognized unit strings fall back to a per-character scan.
        assert_eq!(parse("10kOhm").unwrap(), 10e3);
        // 'O' and 'h' are unknown, 'm' matches milli.
        assert_eq!(parse("10Ohm").unwrap(), 10e-3);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            parse("abc"),
            Err(DcsimError::ValueParse { .. })
        ));
        assert!(matches!(parse(""), Err(DcsimError::ValueParse { .. })));
        assert!(matches!(
            parse("10%"),
            Err(DcsimError::ValueParse { .. })
        ));
        assert!(matches!(
            parse("1.5Z"),
            Err(DcsimError::ValueParse { .. })
        ));
    }
}
