//! Error taxonomy for the engine.
//!
//! Each subsystem has its own error enum so callers can match on exactly
//! the failures an operation can produce. [`Error`] wraps all of them for
//! binaries and glue code that just want `?` to work.
//!
//! None of these errors leave shared state half-updated: commitments,
//! observations and tallies are only replaced once an operation has fully
//! succeeded.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::{AssetId, Hash256, LegId, ObservationDate, OracleId, PartyId};

/// Malformed identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid asset symbol: {0:?}")]
    InvalidSymbol(String),
    #[error("invalid currency pair (expected BASE:QUOTE): {0:?}")]
    InvalidPair(String),
}

/// Failures of the commitment model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitmentError {
    /// Degenerate commitment input (zero-length preimage).
    #[error("invalid preimage: empty preimages cannot be committed to")]
    InvalidPreimage,
    /// The supplied preimage does not hash to the published commitment.
    #[error("preimage hashes to {actual}, commitment is {expected}")]
    Verification { expected: Hash256, actual: Hash256 },
}

/// Failures while publishing or settling an oracle's price ladder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObservationError {
    #[error("thresholds must strictly increase: {next} does not follow {last}")]
    NonMonotoneThreshold { last: Decimal, next: Decimal },
    #[error("observation of oracle {oracle} is sealed")]
    Sealed { oracle: OracleId },
    #[error("settlement window closed at {deadline}, reveal arrived at {now}")]
    SettlementClosed { deadline: u64, now: u64 },
    #[error("no level published at threshold {0}")]
    UnknownThreshold(Decimal),
    #[error("oracle {oracle} published nothing for {date}")]
    UnknownObservation { oracle: OracleId, date: ObservationDate },
    #[error("settlement window open until {deadline}, cannot seal at {now}")]
    WindowOpen { deadline: u64, now: u64 },
    #[error("ladder has {available} rungs, table needs {needed}")]
    LadderTooShort { needed: usize, available: usize },
    #[error("invalid level schedule: {0}")]
    InvalidSchedule(String),
    #[error(transparent)]
    Commitment(#[from] CommitmentError),
}

/// Failures while building conditions or recording oracle facts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    #[error("a condition needs at least one participating oracle")]
    NoParticipants,
    #[error("invalid agreement policy: {0}")]
    InvalidPolicy(String),
    #[error("oracle {0} does not participate in this condition")]
    UnknownOracle(OracleId),
    #[error("oracle {oracle} already reported a different outcome")]
    ConflictingFact { oracle: OracleId },
}

/// Raised only when a caller demands a definite boolean from a condition
/// that its agreement policy could not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("condition is disputed: quorum not reached{}", describe_legs(.legs))]
pub struct DisputedConditionError {
    /// Legs that were left unsettled, if the error comes from a valuation.
    pub legs: Vec<LegId>,
}

fn describe_legs(legs: &[LegId]) -> String {
    if legs.is_empty() {
        return String::new();
    }
    let ids: Vec<String> = legs.iter().map(ToString::to_string).collect();
    format!(" for {}", ids.join(", "))
}

/// Invalid leg parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LegError {
    #[error("leg amount must be non-negative, got {0}")]
    NegativeAmount(Decimal),
    #[error("leg pays {0} to itself")]
    SelfTransfer(PartyId),
}

/// Failures of the scenario evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error("price feed has no price for {asset} in this scenario")]
    MissingPrice { asset: AssetId },
    #[error("value of {asset} holdings overflows")]
    Overflow { asset: AssetId },
}

/// Failures of the payoff decomposition solver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolverError {
    #[error("price domain [{min}, {max}] is empty or negative")]
    InvalidDomain { min: Decimal, max: Decimal },
    #[error("tolerance must be non-negative, got {0}")]
    InvalidTolerance(Decimal),
    #[error("reference price {0} lies outside the price domain")]
    InvalidReference(Decimal),
    /// The oracle table is too coarse to meet the tolerance: relax the
    /// tolerance or request a finer table.
    #[error("residual {residual} at price {price} exceeds tolerance {tolerance}")]
    ResidualExceeded {
        price: Decimal,
        residual: Decimal,
        tolerance: Decimal,
    },
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
    #[error(transparent)]
    Leg(#[from] LegError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// Invalid parameters for a product builder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("invalid product parameter: {0}")]
    InvalidParameter(String),
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
    #[error(transparent)]
    Leg(#[from] LegError),
}

/// Failures while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Commitment(#[from] CommitmentError),
    #[error(transparent)]
    Observation(#[from] ObservationError),
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
    #[error(transparent)]
    Disputed(#[from] DisputedConditionError),
    #[error(transparent)]
    Leg(#[from] LegError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Product(#[from] ProductError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disputed_error_lists_legs() {
        let err = DisputedConditionError {
            legs: vec![LegId(0), LegId(3)],
        };
        assert_eq!(
            err.to_string(),
            "condition is disputed: quorum not reached for leg#0, leg#3"
        );

        let bare = DisputedConditionError { legs: vec![] };
        assert_eq!(bare.to_string(), "condition is disputed: quorum not reached");
    }

    #[test]
    fn crate_error_wraps_subsystem_errors() {
        let err: Error = CommitmentError::InvalidPreimage.into();
        assert!(matches!(err, Error::Commitment(CommitmentError::InvalidPreimage)));

        let obs: ObservationError = CommitmentError::InvalidPreimage.into();
        assert!(obs.to_string().contains("empty preimages"));
    }
}
