//! Nostr public keys.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::PUBKEY_HEX_LEN;

/// Reasons a string is rejected as a public key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PubkeyError {
    #[error("pubkey must be {PUBKEY_HEX_LEN} hex characters, got {0}")]
    Length(usize),

    #[error("pubkey must be lowercase hex")]
    NotLowercaseHex,
}

/// A 64-character lowercase hex Nostr public key.
///
/// Construction always validates, so any `Pubkey` in hand is well formed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pubkey(String);

impl Pubkey {
    /// Parse and validate a hex public key.
    pub fn parse(s: &str) -> Result<Self, PubkeyError> {
        if s.len() != PUBKEY_HEX_LEN {
            return Err(PubkeyError::Length(s.len()));
        }
        if !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            return Err(PubkeyError::NotLowercaseHex);
        }
        Ok(Self(s.to_string()))
    }

    /// Hex form of the key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build a key from raw bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(hex::encode(bytes))
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Pubkey {
    type Err = PubkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Pubkey {
    type Error = PubkeyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Pubkey> for String {
    fn from(pk: Pubkey) -> Self {
        pk.0
    }
}

impl AsRef<str> for Pubkey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
