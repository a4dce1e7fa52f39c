//! Hash-oracle HTLC library crate.
//!
//! This crate models financial products built from hash time-locked
//! transfers whose release depends on price oracles revealing preimages:
//!
//! - strongly-typed domain types, commitments, legs and products (`types`),
//! - oracle price ladders, publication and settlement (`oracle`),
//! - multi-oracle agreement policies (`aggregation`),
//! - scenario valuation of products (`valuation`),
//! - decomposition of target payoffs into legs (`solver`),
//! - ready-made product builders (`products`),
//! - and a top-level engine configuration (`config`).
//!
//! Higher-level binaries compose these pieces into simulations: publish
//! ladders, feed reveals, and watch product values settle.

pub mod aggregation;
pub mod config;
pub mod error;
pub mod oracle;
pub mod products;
pub mod solver;
pub mod types;
pub mod valuation;

// Re-export top-level configuration types.
pub use config::{EngineConfig, LadderConfig, SettlementConfig, SolverConfig};

pub use error::{
    AggregationError, CommitmentError, ConfigError, DisputedConditionError, Error,
    EvaluationError, LegError, ObservationError, ParseError, ProductError, SolverError,
};

// Oracle publication and settlement.
pub use oracle::{
    HashLadder, LevelSchedule, OracleBoard, OracleObservation, PriceLevel, RevealFact,
    RevealSource,
};

pub use aggregation::{
    AggregatedCondition, AgreementPolicy, ConditionTemplate, OracleTally, QuorumRule, Resolution,
};

pub use valuation::{
    Evaluator, FixedPrices, PairQuote, PriceFeed, PricePoints, Scenario, ValuationResult,
};

pub use products::{BoundedStableCoin, CallOption};
pub use solver::{Holding, Solver, SynthesisRequest};

// Re-export domain types at the crate root for convenience.
pub use types::*;

/// Evaluator pricing both sides of a single currency pair, the common case
/// for products over one underlying.
pub type DefaultEvaluator = Evaluator<PairQuote>;
