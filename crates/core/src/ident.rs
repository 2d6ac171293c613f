//! Vendor identifier formatting and normalisation.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CatalogError, CatalogResult};

/// Number of decimal digits in the serial part of an identifier.
pub const SERIAL_WIDTH: usize = 5;
/// Largest serial an identifier can carry.
pub const MAX_SERIAL: u32 = 99_999;

const MAX_CODE_LEN: usize = 32;

/// Build an identifier such as `NPUB31419` from a type prefix and serial.
pub fn format_identifier(kind: &str, serial: u32) -> CatalogResult<String> {
    if kind.is_empty() || !kind.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return Err(CatalogError::InvalidIdentifier(kind.to_string()));
    }
    if serial > MAX_SERIAL {
        return Err(CatalogError::SerialOutOfRange(serial));
    }
    let code = format!(
        "{}{:0width$}",
        kind.to_uppercase(),
        serial,
        width = SERIAL_WIDTH
    );
    validate_code(&code)?;
    Ok(code)
}

/// Canonical form of a free-form identifier query.
pub fn normalize_code(input: &str) -> String {
    input.trim().to_uppercase()
}

/// Ensure a code is safe to embed into the vendor URL path.
pub fn validate_code(code: &str) -> CatalogResult<()> {
    let valid = !code.is_empty()
        && code.len() <= MAX_CODE_LEN
        && code.chars().all(|ch| ch.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(CatalogError::InvalidIdentifier(code.to_string()))
    }
}

/// Split a canonical identifier into its prefix and numeric serial.
pub fn split_identifier(code: &str) -> Option<(&str, u32)> {
    static IDENT_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^([A-Z0-9]*[A-Z])(\d{5})$").expect("invalid identifier regex"));

    let caps = IDENT_RE.captures(code)?;
    let prefix = caps.get(1)?.as_str();
    let serial = caps.get(2)?.as_str().parse().ok()?;
    Some((prefix, serial))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_serial_to_five_digits() -> CatalogResult<()> {
        assert_eq!(format_identifier("NPUB", 31419)?, "NPUB31419");
        assert_eq!(format_identifier("BLES", 7)?, "BLES00007");
        assert_eq!(format_identifier("npeb", 0)?, "NPEB00000");
        Ok(())
    }

    #[test]
    fn formatted_identifiers_split_back_to_serial() -> CatalogResult<()> {
        for serial in [0, 1, 42, 999, 31419, 50000, MAX_SERIAL] {
            let code = format_identifier("NPUB", serial)?;
            assert_eq!(code.len(), "NPUB".len() + SERIAL_WIDTH);
            assert_eq!(split_identifier(&code), Some(("NPUB", serial)));
        }
        Ok(())
    }

    #[test]
    fn rejects_out_of_range_serials() {
        assert!(matches!(
            format_identifier("NPUB", 100_000),
            Err(CatalogError::SerialOutOfRange(100_000))
        ));
    }

    #[test]
    fn rejects_bad_prefixes() {
        assert!(format_identifier("", 1).is_err());
        assert!(format_identifier("NP/UB", 1).is_err());
    }

    #[test]
    fn formatted_codes_stay_within_length_limit() {
        let longest = "A".repeat(MAX_CODE_LEN - SERIAL_WIDTH);
        let code = format_identifier(&longest, 1).expect("longest prefix fits");
        assert_eq!(code.len(), MAX_CODE_LEN);

        let too_long = "A".repeat(MAX_CODE_LEN - SERIAL_WIDTH + 1);
        assert!(matches!(
            format_identifier(&too_long, 1),
            Err(CatalogError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn normalizes_and_validates_codes() {
        assert_eq!(normalize_code("  npub31419 "), "NPUB31419");
        assert!(validate_code("NPUB31419").is_ok());
        assert!(validate_code("").is_err());
        assert!(validate_code("../etc").is_err());
        assert!(validate_code(&"A".repeat(40)).is_err());
    }
}
