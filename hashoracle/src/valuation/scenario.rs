//! Hypothetical market states.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::oracle::{RevealFact, RevealSource};
use crate::types::{ObservationDate, OracleId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PricePoints {
    /// One price, whatever the observation date.
    Spot(Decimal),
    /// A price per observation date.
    Path(BTreeMap<ObservationDate, Decimal>),
}

/// A hypothetical underlying price (or path) plus, optionally, oracles
/// that read a different price or have not reported yet.
///
/// As a [`RevealSource`], an honest oracle reading price `p` reveals
/// exactly the levels with `threshold <= p`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    prices: PricePoints,
    oracle_readings: BTreeMap<OracleId, Decimal>,
    pending: BTreeSet<OracleId>,
}

impl Scenario {
    pub fn spot(price: Decimal) -> Self {
        Self {
            prices: PricePoints::Spot(price),
            oracle_readings: BTreeMap::new(),
            pending: BTreeSet::new(),
        }
    }

    pub fn path<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (ObservationDate, Decimal)>,
    {
        Self {
            prices: PricePoints::Path(points.into_iter().collect()),
            oracle_readings: BTreeMap::new(),
            pending: BTreeSet::new(),
        }
    }

    /// `oracle` reports `price` on every date instead of the scenario price.
    pub fn with_oracle_reading(mut self, oracle: OracleId, price: Decimal) -> Self {
        self.oracle_readings.insert(oracle, price);
        self
    }

    /// `oracle` has not reported: all its levels stay pending.
    pub fn with_pending(mut self, oracle: OracleId) -> Self {
        self.pending.insert(oracle);
        self
    }

    /// Underlying price on `date`; `None` if a path does not cover it.
    pub fn price_at(&self, date: ObservationDate) -> Option<Decimal> {
        match &self.prices {
            PricePoints::Spot(p) => Some(*p),
            PricePoints::Path(path) => path.get(&date).copied(),
        }
    }

    /// Price used to value holdings: the spot, or the last point of a path.
    pub fn valuation_price(&self) -> Option<Decimal> {
        match &self.prices {
            PricePoints::Spot(p) => Some(*p),
            PricePoints::Path(path) => path.values().next_back().copied(),
        }
    }

    pub fn prices(&self) -> &PricePoints {
        &self.prices
    }
}

impl RevealSource for Scenario {
    fn fact(&self, oracle: &OracleId, date: ObservationDate, threshold: Decimal) -> RevealFact {
        if self.pending.contains(oracle) {
            return RevealFact::Pending;
        }
        let observed = self
            .oracle_readings
            .get(oracle)
            .copied()
            .or_else(|| self.price_at(date));
        match observed {
            Some(price) if threshold <= price => RevealFact::Revealed,
            Some(_) => RevealFact::Absent,
            None => RevealFact::Pending,
        }
    }
}
