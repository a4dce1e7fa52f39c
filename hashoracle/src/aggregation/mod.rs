//! Multi-oracle conditions.
//!
//! A leg does not trust one oracle blindly: its [`AggregatedCondition`]
//! names the oracles that attest the threshold and the
//! [`AgreementPolicy`] that turns their individual [`RevealFact`]s into a
//! [`Resolution`]. When the policy cannot decide, the result is
//! [`Resolution::Disputed`] and stays that way until more facts arrive; it
//! is never silently treated as either outcome.
//!
//! [`RevealFact`]: crate::oracle::RevealFact

pub mod condition;
pub mod policy;

pub use condition::{AggregatedCondition, ConditionTemplate, OracleTally, Resolution};
pub use policy::{AgreementPolicy, QuorumRule};
