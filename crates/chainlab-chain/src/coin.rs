//! Token amount with denomination, e.g. `10000000stake`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ChainError;

/// A single-denomination token amount.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coin {
    pub amount: u128,
    pub denom: String,
}

impl Coin {
    /// Create a new coin.
    pub fn new(amount: u128, denom: impl Into<String>) -> Self {
        Self {
            amount,
            denom: denom.into(),
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for Coin {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| ChainError::InvalidCoin(format!("missing denom in {s:?}")))?;
        let (amount, denom) = s.split_at(split);
        if amount.is_empty() {
            return Err(ChainError::InvalidCoin(format!("missing amount in {s:?}")));
        }
        if !denom
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '/')
        {
            return Err(ChainError::InvalidCoin(format!("bad denom in {s:?}")));
        }
        let amount = amount
            .parse::<u128>()
            .map_err(|e| ChainError::InvalidCoin(format!("{s:?}: {e}")))?;
        Ok(Coin::new(amount, denom))
    }
}

// Coins travel as their CLI string form in config files and descriptors.
impl Serialize for Coin {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Coin {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
