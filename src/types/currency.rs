//! Currency tiers tracked for every account
//!
//! Each tier maps to exactly one balance column. Column names are fixed at
//! compile time, so SQL is only ever composed from [`Currency::column`] and
//! never from caller-supplied text.

use super::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the four denominations held per account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Coin,
    Copper,
    Silver,
    Gold,
}

impl Currency {
    /// All tiers, in column order
    pub const ALL: [Currency; 4] = [
        Currency::Coin,
        Currency::Copper,
        Currency::Silver,
        Currency::Gold,
    ];

    /// Tier used when a caller does not name one
    pub const DEFAULT: Currency = Currency::Coin;

    /// Lowercase name, identical to the balance column
    pub fn name(self) -> &'static str {
        match self {
            Currency::Coin => "coin",
            Currency::Copper => "copper",
            Currency::Silver => "silver",
            Currency::Gold => "gold",
        }
    }

    /// Balance column backing this tier
    pub fn column(self) -> &'static str {
        self.name()
    }

    /// Match a user-supplied identifier against the known tiers
    ///
    /// Matching is case-insensitive and exact; surrounding whitespace is not
    /// trimmed. Unknown input yields `None` rather than an error.
    pub fn from_name(name: &str) -> Option<Currency> {
        Currency::ALL
            .into_iter()
            .find(|currency| currency.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Currency {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::from_name(s).ok_or_else(|| LedgerError::unknown_currency(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::lowercase("coin", Currency::Coin)]
    #[case::uppercase("COPPER", Currency::Copper)]
    #[case::mixed_case("SiLvEr", Currency::Silver)]
    #[case::gold("gold", Currency::Gold)]
    fn test_from_name_matches_case_insensitively(#[case] input: &str, #[case] expected: Currency) {
        assert_eq!(Currency::from_name(input), Some(expected));
    }

    #[rstest]
    #[case::empty("")]
    #[case::padded(" coin")]
    #[case::plural("coins")]
    #[case::injection("coin; DROP TABLE economy_accounts")]
    fn test_from_name_rejects_unknown(#[case] input: &str) {
        assert_eq!(Currency::from_name(input), None);
    }

    #[test]
    fn test_from_str_reports_unknown_currency() {
        let err = "platinum".parse::<Currency>().unwrap_err();
        assert_eq!(err, LedgerError::unknown_currency("platinum"));
        assert!(err.is_validation());
    }

    #[test]
    fn test_columns_are_distinct() {
        let mut columns: Vec<_> = Currency::ALL.iter().map(|c| c.column()).collect();
        columns.sort_unstable();
        columns.dedup();
        assert_eq!(columns.len(), 4);
    }

    #[test]
    fn test_default_is_coin() {
        assert_eq!(Currency::DEFAULT, Currency::Coin);
        assert_eq!(Currency::DEFAULT.to_string(), "coin");
    }
}
