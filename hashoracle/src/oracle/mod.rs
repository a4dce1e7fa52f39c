//! Hash oracles: price ladders, their publication and settlement.
//!
//! - [`levels`] decides where the thresholds of a ladder sit.
//! - [`ladder`] derives one preimage per threshold from a single secret.
//! - [`observation`] holds the published table for one oracle and date,
//!   accepts reveals during the settlement window and reports
//!   [`RevealFact`]s through the [`RevealSource`] trait.

pub mod ladder;
pub mod levels;
pub mod observation;

pub use ladder::{HashLadder, LadderRung, merkle_root};
pub use levels::LevelSchedule;
pub use observation::{OracleBoard, OracleObservation, PriceLevel, RevealFact, RevealSource};
