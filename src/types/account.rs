//! Account-related types for the game ledger
//!
//! An account is addressed by an identifier plus a category tag, so a player
//! and a clan may share an identifier without sharing balances.

use super::currency::Currency;
use super::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest identifier the schema stores (UUID width)
pub const MAX_ACCOUNT_ID_LEN: usize = 36;

/// Category of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountType {
    Player,
    Clan,
    Guild,
}

impl AccountType {
    pub const ALL: [AccountType; 3] = [AccountType::Player, AccountType::Clan, AccountType::Guild];

    /// Tag stored in the `account_type` column
    pub fn as_str(self) -> &'static str {
        match self {
            AccountType::Player => "PLAYER",
            AccountType::Clan => "CLAN",
            AccountType::Guild => "GUILD",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccountType::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| LedgerError::unknown_account_type(s))
    }
}

/// Composite key of a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "UncheckedKey")]
pub struct AccountKey {
    id: String,
    kind: AccountType,
}

/// Wire form of [`AccountKey`]; validated through `AccountKey::new`
#[derive(Deserialize)]
struct UncheckedKey {
    id: String,
    kind: AccountType,
}

impl TryFrom<UncheckedKey> for AccountKey {
    type Error = LedgerError;

    fn try_from(key: UncheckedKey) -> Result<Self, Self::Error> {
        AccountKey::new(key.id, key.kind)
    }
}

impl AccountKey {
    /// Build a key, rejecting identifiers the schema cannot hold
    pub fn new(id: impl Into<String>, kind: AccountType) -> Result<Self, LedgerError> {
        let id = id.into();
        if id.is_empty() {
            return Err(LedgerError::invalid_account_id(&id, "must not be empty"));
        }
        if id.chars().count() > MAX_ACCOUNT_ID_LEN {
            return Err(LedgerError::invalid_account_id(
                &id,
                &format!("longer than {} characters", MAX_ACCOUNT_ID_LEN),
            ));
        }
        Ok(Self { id, kind })
    }

    pub fn player(id: impl Into<String>) -> Result<Self, LedgerError> {
        Self::new(id, AccountType::Player)
    }

    pub fn clan(id: impl Into<String>) -> Result<Self, LedgerError> {
        Self::new(id, AccountType::Clan)
    }

    pub fn guild(id: impl Into<String>) -> Result<Self, LedgerError> {
        Self::new(id, AccountType::Guild)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> AccountType {
        self.kind
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Snapshot of all four balances of one account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    pub coin: i64,
    pub copper: i64,
    pub silver: i64,
    pub gold: i64,
}

impl Balances {
    /// Balance of a single tier
    pub fn get(&self, currency: Currency) -> i64 {
        match currency {
            Currency::Coin => self.coin,
            Currency::Copper => self.copper,
            Currency::Silver => self.silver,
            Currency::Gold => self.gold,
        }
    }

    pub(crate) fn slot_mut(&mut self, currency: Currency) -> &mut i64 {
        match currency {
            Currency::Coin => &mut self.coin,
            Currency::Copper => &mut self.copper,
            Currency::Silver => &mut self.silver,
            Currency::Gold => &mut self.gold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_deserialize_validates_id() {
        let key: AccountKey = serde_json::from_str(r#"{"id":"P1","kind":"CLAN"}"#).unwrap();
        assert_eq!(key, AccountKey::clan("P1").unwrap());

        let too_long = format!(r#"{{"id":"{}","kind":"PLAYER"}}"#, "x".repeat(37));
        assert!(serde_json::from_str::<AccountKey>(&too_long).is_err());
        assert!(serde_json::from_str::<AccountKey>(r#"{"id":"","kind":"GUILD"}"#).is_err());
    }

    #[rstest]
    #[case::upper("PLAYER", AccountType::Player)]
    #[case::lower("clan", AccountType::Clan)]
    #[case::mixed("Guild", AccountType::Guild)]
    fn test_account_type_parsing(#[case] input: &str, #[case] expected: AccountType) {
        assert_eq!(input.parse::<AccountType>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_account_type() {
        let err = "party".parse::<AccountType>().unwrap_err();
        assert_eq!(err, LedgerError::unknown_account_type("party"));
    }

    #[rstest]
    #[case::empty("")]
    #[case::too_long("0123456789012345678901234567890123456")]
    fn test_account_key_rejects_bad_ids(#[case] id: &str) {
        let err = AccountKey::player(id).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAccountId { .. }));
    }

    #[test]
    fn test_account_key_accepts_uuid() {
        let key = AccountKey::player("123e4567-e89b-12d3-a456-426614174000").unwrap();
        assert_eq!(key.id().len(), MAX_ACCOUNT_ID_LEN);
        assert_eq!(key.kind(), AccountType::Player);
        assert_eq!(
            key.to_string(),
            "PLAYER:123e4567-e89b-12d3-a456-426614174000"
        );
    }

    #[test]
    fn test_same_id_different_type_are_distinct() {
        assert_ne!(AccountKey::player("red").unwrap(), AccountKey::clan("red").unwrap());
    }

    #[test]
    fn test_balances_slot_access() {
        let mut balances = Balances::default();
        *balances.slot_mut(Currency::Silver) += 12;
        assert_eq!(balances.get(Currency::Silver), 12);
        assert_eq!(balances.get(Currency::Coin), 0);
    }
}
