//! Core domain types used by the engine
//!
//! This module defines strongly-typed hashes, party / asset / oracle
//! identifiers, observation dates and currency pairs that are shared across
//! the commitment model, the aggregator, the evaluator and the solver. The
//! goal is to avoid "naked" strings and byte buffers in public APIs and
//! instead use domain-specific newtypes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Hash commitments and their preimages.
pub mod commitment;
/// Conditional transfers (HTLC legs).
pub mod leg;
/// Ordered collections of legs forming an instrument.
pub mod product;

pub use commitment::{Commitment, Preimage};
pub use leg::{HtlcLeg, LegOutcome, TriggerDirection};
pub use product::{Product, ProductId};

/// Length in bytes of all 256-bit hash types used in this crate.
pub const HASH_LEN: usize = 32;

/// Strongly-typed 256-bit hash wrapper (BLAKE3-256).
///
/// This is the opaque commitment primitive: oracles publish a `Hash256` of
/// a secret preimage ahead of time and later disclose the preimage. The
/// engine never interprets the digest beyond equality.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// Computes a new [`Hash256`] as the BLAKE3-256 hash of `data`.
    pub fn compute(data: &[u8]) -> Self {
        let h = blake3::hash(data);
        Hash256(*h.as_bytes())
    }

    /// Returns the underlying 32-byte hash as a borrowed array.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Lowercase hex encoding of the full digest.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First eight bytes in hex, for log lines and tables.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short())
    }
}

/// Counterparty identifier (a wallet, an account, an escrow pool).
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct PartyId(pub String);

impl PartyId {
    pub fn new(name: impl Into<String>) -> Self {
        PartyId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Asset symbol, e.g. `"USD"` or `"BTS"`.
///
/// Symbols are upper-case ASCII letters and dots. [`AssetId::parse`]
/// enforces that; [`AssetId::new`] trusts the caller.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct AssetId(pub String);

impl AssetId {
    pub fn new(symbol: impl Into<String>) -> Self {
        AssetId(symbol.into())
    }

    /// Parses and validates an asset symbol.
    pub fn parse(symbol: &str) -> Result<Self, ParseError> {
        let valid = !symbol.is_empty()
            && symbol
                .chars()
                .all(|c| c.is_ascii_uppercase() || c == '.');
        if !valid {
            return Err(ParseError::InvalidSymbol(symbol.to_string()));
        }
        Ok(AssetId(symbol.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a hash oracle publishing price ladders.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct OracleId(pub String);

impl OracleId {
    pub fn new(name: impl Into<String>) -> Self {
        OracleId(name.into())
    }
}

impl fmt::Display for OracleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of a leg inside its [`Product`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct LegId(pub usize);

impl fmt::Display for LegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "leg#{}", self.0)
    }
}

/// Settlement date of an observation, in seconds since Unix epoch.
///
/// Oracles publish one ladder per observation date; conditions and
/// scenarios refer to the same date to line up reveals with prices.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ObservationDate(pub u64);

impl ObservationDate {
    /// End of the settlement window that opens at this date.
    pub fn deadline(&self, window_secs: u64) -> u64 {
        self.0.saturating_add(window_secs)
    }
}

impl fmt::Display for ObservationDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A currency pair `BASE:QUOTE`.
///
/// A price on the pair is the amount of `quote` one unit of `base` costs,
/// so `0.05 BTS:USD` means one BTS costs five cents.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Pair {
    pub base: AssetId,
    pub quote: AssetId,
}

impl Pair {
    pub fn new(base: AssetId, quote: AssetId) -> Self {
        Self { base, quote }
    }

    /// Parses `"BASE:QUOTE"`, validating both symbols.
    pub fn parse(pair: &str) -> Result<Self, ParseError> {
        let mut parts = pair.split(':');
        let (Some(base), Some(quote), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ParseError::InvalidPair(pair.to_string()));
        };
        Ok(Self {
            base: AssetId::parse(base)?,
            quote: AssetId::parse(quote)?,
        })
    }

    /// The same pair quoted the other way round.
    pub fn swap(&self) -> Self {
        Self {
            base: self.quote.clone(),
            quote: self.base.clone(),
        }
    }

    /// `true` if `other` names the same two assets in either order.
    pub fn compatible(&self, other: &Pair) -> bool {
        self == other || *self == other.swap()
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.base, self.quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_hex_encoded() {
        let a = Hash256::compute(b"preimage");
        let b = Hash256::compute(b"preimage");
        assert_eq!(a, b);
        assert_eq!(a.to_hex().len(), HASH_LEN * 2);
        assert_eq!(a.short().len(), 16);
        assert_ne!(a, Hash256::compute(b"other"));
    }

    #[test]
    fn asset_symbols_are_validated() {
        assert!(AssetId::parse("USD").is_ok());
        assert!(AssetId::parse("BIT.USD").is_ok());
        assert!(AssetId::parse("usd").is_err());
        assert!(AssetId::parse("").is_err());
    }

    #[test]
    fn pair_parse_swap_and_compat() {
        let pair = Pair::parse("BTS:USD").expect("valid pair");
        assert_eq!(pair.base, AssetId::new("BTS"));
        assert_eq!(pair.quote, AssetId::new("USD"));
        assert_eq!(pair.to_string(), "BTS:USD");

        let swapped = pair.swap();
        assert_eq!(swapped.to_string(), "USD:BTS");
        assert!(pair.compatible(&swapped));
        assert!(!pair.compatible(&Pair::parse("CNY:USD").unwrap()));

        assert!(matches!(
            Pair::parse("BTS:USD:CNY"),
            Err(ParseError::InvalidPair(_))
        ));
        assert!(matches!(
            Pair::parse("BTS"),
            Err(ParseError::InvalidPair(_))
        ));
    }

    #[test]
    fn deadline_saturates() {
        assert_eq!(ObservationDate(100).deadline(50), 150);
        assert_eq!(ObservationDate(u64::MAX).deadline(1), u64::MAX);
    }
}
