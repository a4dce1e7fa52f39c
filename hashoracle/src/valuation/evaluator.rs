//! Scenario evaluator.
//!
//! Given a product and a source of reveal facts, decide which legs
//! execute, accumulate the resulting transfers per `(party, asset)` and
//! price the outcome through a [`PriceFeed`]. Evaluation is a pure
//! function of its inputs: the same product, facts and prices always give
//! the same [`ValuationResult`].

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::{DisputedConditionError, EvaluationError};
use crate::oracle::RevealSource;
use crate::types::{AssetId, LegId, LegOutcome, PartyId, Product};

use super::pricing::PriceFeed;
use super::scenario::Scenario;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValuationResult {
    /// Signed net flow per party and asset from triggered legs.
    pub net_transfers: BTreeMap<(PartyId, AssetId), Decimal>,
    /// Holder's endowment plus net transfers, in the valuation unit.
    pub portfolio_value: Decimal,
    /// Value of every party's net transfers (the holder's includes the
    /// endowment).
    pub party_values: BTreeMap<PartyId, Decimal>,
    pub triggered_legs: Vec<LegId>,
    /// Legs whose condition could not be resolved. They contribute nothing.
    pub disputed_legs: Vec<LegId>,
}

impl ValuationResult {
    /// Net flow of `asset` for `party` (zero if none).
    pub fn net(&self, party: &PartyId, asset: &AssetId) -> Decimal {
        self.net_transfers
            .get(&(party.clone(), asset.clone()))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn is_settled(&self) -> bool {
        self.disputed_legs.is_empty()
    }

    /// Fails with the disputed legs if any condition was left unresolved.
    pub fn ensure_undisputed(&self) -> Result<(), DisputedConditionError> {
        if self.disputed_legs.is_empty() {
            return Ok(());
        }
        warn!(legs = ?self.disputed_legs, "settlement left legs disputed");
        Err(DisputedConditionError {
            legs: self.disputed_legs.clone(),
        })
    }
}

fn overflow(asset: &AssetId) -> EvaluationError {
    EvaluationError::Overflow {
        asset: asset.clone(),
    }
}

/// Evaluates products with a fixed price feed.
#[derive(Clone, Debug)]
pub struct Evaluator<F> {
    feed: F,
}

impl<F: PriceFeed> Evaluator<F> {
    pub fn new(feed: F) -> Self {
        Self { feed }
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    /// Evaluates `product` under `scenario`, taking reveal facts from the
    /// scenario itself.
    pub fn evaluate(&self, product: &Product, scenario: &Scenario) -> Result<ValuationResult, EvaluationError> {
        self.evaluate_with(product, scenario, scenario)
    }

    /// Evaluates `product` with reveal facts from `source` (e.g. real
    /// oracle publications) and prices from `scenario`.
    pub fn evaluate_with<S>(
        &self,
        product: &Product,
        source: &S,
        scenario: &Scenario,
    ) -> Result<ValuationResult, EvaluationError>
    where
        S: RevealSource + ?Sized,
    {
        let mut net_transfers: BTreeMap<(PartyId, AssetId), Decimal> = BTreeMap::new();
        let mut triggered_legs = Vec::new();
        let mut disputed_legs = Vec::new();

        for (id, leg) in product.iter_legs() {
            let resolution = leg.condition().resolve_with(source);
            match leg.outcome(resolution) {
                LegOutcome::Triggered => {
                    let asset = leg.asset();
                    let outflow = net_transfers
                        .entry((leg.from().clone(), asset.clone()))
                        .or_default();
                    *outflow = outflow
                        .checked_sub(leg.amount())
                        .ok_or_else(|| overflow(asset))?;
                    let inflow = net_transfers
                        .entry((leg.to().clone(), asset.clone()))
                        .or_default();
                    *inflow = inflow
                        .checked_add(leg.amount())
                        .ok_or_else(|| overflow(asset))?;
                    triggered_legs.push(id);
                }
                LegOutcome::Disputed => {
                    debug!(leg = %id, condition = %leg.condition(), "condition disputed");
                    disputed_legs.push(id);
                }
                LegOutcome::Idle => {}
            }
        }

        let mut party_values = BTreeMap::new();
        for party in product.parties() {
            let mut holdings: BTreeMap<&AssetId, Decimal> = BTreeMap::new();
            let endowment = product.endowment.iter().filter(|_| party == product.holder);
            let flows = net_transfers
                .iter()
                .filter(|((p, _), _)| *p == party)
                .map(|((_, asset), amount)| (asset, amount));
            for (asset, amount) in flows.chain(endowment) {
                let held = holdings.entry(asset).or_default();
                *held = held.checked_add(*amount).ok_or_else(|| overflow(asset))?;
            }
            party_values.insert(party, self.value_holdings(holdings, scenario)?);
        }

        let portfolio_value = party_values
            .get(&product.holder)
            .copied()
            .unwrap_or(Decimal::ZERO);

        Ok(ValuationResult {
            net_transfers,
            portfolio_value,
            party_values,
            triggered_legs,
            disputed_legs,
        })
    }

    /// Holder's value at each spot price in `prices`.
    pub fn value_curve(&self, product: &Product, prices: &[Decimal]) -> Result<Vec<(Decimal, Decimal)>, EvaluationError> {
        prices
            .iter()
            .map(|p| {
                self.evaluate(product, &Scenario::spot(*p))
                    .map(|r| (*p, r.portfolio_value))
            })
            .collect()
    }

    fn value_holdings(
        &self,
        holdings: BTreeMap<&AssetId, Decimal>,
        scenario: &Scenario,
    ) -> Result<Decimal, EvaluationError> {
        let mut value = Decimal::ZERO;
        for (asset, amount) in holdings {
            if amount.is_zero() {
                continue;
            }
            let price = self
                .feed
                .price(asset, scenario)
                .ok_or_else(|| EvaluationError::MissingPrice { asset: asset.clone() })?;
            value = amount
                .checked_mul(price)
                .and_then(|v| value.checked_add(v))
                .ok_or_else(|| overflow(asset))?;
        }
        Ok(value)
    }
}
