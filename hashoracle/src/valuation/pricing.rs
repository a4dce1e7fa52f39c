//! Price feeds used to express holdings in a common unit.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::types::{AssetId, ObservationDate, Pair};

use super::scenario::Scenario;

/// Prices assets in the valuation unit under a scenario.
pub trait PriceFeed {
    fn price(&self, asset: &AssetId, scenario: &Scenario) -> Option<Decimal>;
}

impl<F> PriceFeed for F
where
    F: Fn(&AssetId, &Scenario) -> Option<Decimal>,
{
    fn price(&self, asset: &AssetId, scenario: &Scenario) -> Option<Decimal> {
        self(asset, scenario)
    }
}

/// Values everything in the quote asset of `pair`: the quote is worth 1,
/// the base is worth the scenario price.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairQuote {
    pair: Pair,
    date: Option<ObservationDate>,
}

impl PairQuote {
    /// Uses [`Scenario::valuation_price`].
    pub fn new(pair: Pair) -> Self {
        Self { pair, date: None }
    }

    /// Uses the scenario price on `date`.
    pub fn at(pair: Pair, date: ObservationDate) -> Self {
        Self {
            pair,
            date: Some(date),
        }
    }

    pub fn pair(&self) -> &Pair {
        &self.pair
    }
}

impl PriceFeed for PairQuote {
    fn price(&self, asset: &AssetId, scenario: &Scenario) -> Option<Decimal> {
        if *asset == self.pair.quote {
            Some(Decimal::ONE)
        } else if *asset == self.pair.base {
            match self.date {
                Some(date) => scenario.price_at(date),
                None => scenario.valuation_price(),
            }
        } else {
            None
        }
    }
}

/// Scenario-independent prices.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FixedPrices(pub BTreeMap<AssetId, Decimal>);

impl PriceFeed for FixedPrices {
    fn price(&self, asset: &AssetId, _scenario: &Scenario) -> Option<Decimal> {
        self.0.get(asset).copied()
    }
}
