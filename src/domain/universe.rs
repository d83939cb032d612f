//! Instrument universe: code lists from configuration and market prefixes.
//!
//! Instruments are identified as `SH.600000` / `SZ.000001`. Bare six-digit
//! A-share codes are qualified by their leading digit.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::domain::bar::Timeframe;
use crate::ports::data_port::MarketDataPort;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("cannot infer market for code {0}")]
    UnknownMarket(String),

    #[error("no instrument in the universe has intraday data")]
    NoUsableCodes,
}

/// Adds the `SH.` / `SZ.` prefix to bare six-digit codes.
///
/// Codes that already carry a dot-separated market prefix pass through.
pub fn qualify_code(code: &str) -> Result<String, UniverseError> {
    let code = code.trim().to_uppercase();
    if code.contains('.') {
        return Ok(code);
    }
    let is_a_share = code.len() == 6 && code.chars().all(|c| c.is_ascii_digit());
    match code.chars().next() {
        Some('6') if is_a_share => Ok(format!("SH.{code}")),
        Some('0') | Some('3') if is_a_share => Ok(format!("SZ.{code}")),
        _ => Err(UniverseError::UnknownMarket(code)),
    }
}

/// Comma list -> qualified codes, in input order with duplicates dropped.
pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = qualify_code(trimmed)?;
        if seen.insert(code.clone()) {
            codes.push(code);
        } else {
            debug!(code = %code, "duplicate code dropped");
        }
    }

    Ok(codes)
}

/// Keeps the codes that have intraday bars.
pub fn usable_codes(
    data: &dyn MarketDataPort,
    codes: Vec<String>,
) -> Result<Vec<String>, UniverseError> {
    let mut usable = Vec::with_capacity(codes.len());
    for code in codes {
        match data.fetch_bars(&code, Timeframe::Intraday) {
            Ok(bars) if !bars.is_empty() => usable.push(code),
            Ok(_) => warn!(instrument = %code, "no intraday bars, skipping"),
            Err(e) => warn!(instrument = %code, error = %e, "skipping"),
        }
    }
    if usable.is_empty() {
        return Err(UniverseError::NoUsableCodes);
    }
    Ok(usable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualify_shanghai_and_shenzhen() {
        assert_eq!(qualify_code("600000").unwrap(), "SH.600000");
        assert_eq!(qualify_code("000001").unwrap(), "SZ.000001");
        assert_eq!(qualify_code("300750").unwrap(), "SZ.300750");
    }

    #[test]
    fn prefixed_codes_pass_through() {
        assert_eq!(qualify_code("sh.000300").unwrap(), "SH.000300");
        assert_eq!(qualify_code(" SZ.000001 ").unwrap(), "SZ.000001");
    }

    #[test]
    fn unknown_market_is_rejected() {
        assert_eq!(
            qualify_code("900901"),
            Err(UniverseError::UnknownMarket("900901".into()))
        );
        assert!(qualify_code("60000").is_err());
        assert!(qualify_code("BHP").is_err());
    }

    #[test]
    fn parse_codes_with_whitespace() {
        let result = parse_codes("  600000 , sz.000001 ,300750").unwrap();
        assert_eq!(result, vec!["SH.600000", "SZ.000001", "SZ.300750"]);
    }

    #[test]
    fn parse_codes_drops_duplicates() {
        let result = parse_codes("600000,SH.600000,000001").unwrap();
        assert_eq!(result, vec!["SH.600000", "SZ.000001"]);
    }

    #[test]
    fn parse_codes_empty_token() {
        assert_eq!(parse_codes("600000,,000001"), Err(UniverseError::EmptyToken));
    }
}
