//! Conditional transfers.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregation::{AggregatedCondition, Resolution};
use crate::error::LegError;

use super::{AssetId, PartyId};

/// Which outcome of its condition makes a leg execute.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TriggerDirection {
    /// Executes when the condition holds (the preimage is revealed).
    RevealTriggers,
    /// Executes when the condition fails (no reveal by the deadline).
    AbsenceTriggers,
}

/// What a leg does under a given resolution.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LegOutcome {
    Triggered,
    Idle,
    Disputed,
}

/// A hash-time-locked transfer: `amount` of `asset` moves from `from` to
/// `to` iff `condition` resolves the way `trigger` asks for.
///
/// Legs are immutable once built; [`HtlcLeg::new`] checks the amount and
/// the parties, both when building and when decoding.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLeg")]
pub struct HtlcLeg {
    from: PartyId,
    to: PartyId,
    asset: AssetId,
    amount: Decimal,
    condition: AggregatedCondition,
    trigger: TriggerDirection,
}

#[derive(Deserialize)]
struct RawLeg {
    from: PartyId,
    to: PartyId,
    asset: AssetId,
    amount: Decimal,
    condition: AggregatedCondition,
    trigger: TriggerDirection,
}

impl TryFrom<RawLeg> for HtlcLeg {
    type Error = LegError;

    fn try_from(raw: RawLeg) -> Result<Self, Self::Error> {
        Self::new(raw.from, raw.to, raw.asset, raw.amount, raw.condition, raw.trigger)
    }
}

impl HtlcLeg {
    pub fn new(
        from: PartyId,
        to: PartyId,
        asset: AssetId,
        amount: Decimal,
        condition: AggregatedCondition,
        trigger: TriggerDirection,
    ) -> Result<Self, LegError> {
        if amount < Decimal::ZERO {
            return Err(LegError::NegativeAmount(amount));
        }
        if from == to {
            return Err(LegError::SelfTransfer(from));
        }
        Ok(Self {
            from,
            to,
            asset,
            amount,
            condition,
            trigger,
        })
    }

    pub fn from(&self) -> &PartyId {
        &self.from
    }

    pub fn to(&self) -> &PartyId {
        &self.to
    }

    pub fn asset(&self) -> &AssetId {
        &self.asset
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn condition(&self) -> &AggregatedCondition {
        &self.condition
    }

    pub fn trigger(&self) -> TriggerDirection {
        self.trigger
    }

    /// Maps the condition's resolution onto this leg.
    pub fn outcome(&self, resolution: Resolution) -> LegOutcome {
        match (resolution, self.trigger) {
            (Resolution::Disputed, _) => LegOutcome::Disputed,
            (Resolution::Holds, TriggerDirection::RevealTriggers)
            | (Resolution::Fails, TriggerDirection::AbsenceTriggers) => LegOutcome::Triggered,
            _ => LegOutcome::Idle,
        }
    }
}

impl fmt::Display for HtlcLeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let on = match self.trigger {
            TriggerDirection::RevealTriggers => "reveal",
            TriggerDirection::AbsenceTriggers => "absence",
        };
        write!(
            f,
            "{} {} {} -> {} on {} of {}",
            self.amount, self.asset, self.from, self.to, on, self.condition
        )
    }
}
