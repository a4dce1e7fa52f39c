//! Payoff decomposition.
//!
//! Given a target value curve `V(p)` and the thresholds an oracle table
//! offers, [`Solver::synthesize`] builds a [`Product`] whose value for the
//! holder stays within the tolerance of `V` at every check point.
//!
//! The construction is greedy. Starting from the region that contains the
//! reference price with the opening holding, it walks the thresholds
//! upward and then downward. Whenever a region misses the target it adds
//! one correction on the threshold that separates that region from the
//! ones already handled: a `RevealTriggers` correction on the way up (it
//! applies from that threshold upward), an `AbsenceTriggers` correction on
//! the way down (it applies below it). A correction is one leg when cash
//! or units alone fit, two legs (an atomic swap) otherwise.

use std::cmp::Reverse;

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::aggregation::ConditionTemplate;
use crate::config::SolverConfig;
use crate::error::{EvaluationError, SolverError};
use crate::types::{HtlcLeg, Pair, PartyId, Product, TriggerDirection};
use crate::valuation::{Evaluator, PairQuote, Scenario};

use super::fit::{
    Candidate, CandidateKind, Holding, Region, candidates, clip_thresholds, fits, regions, worst_deviation,
};

/// What to synthesize, for whom, and how precisely.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub label: String,
    /// Party whose value should follow the target.
    pub holder: PartyId,
    /// Party on the other side of every leg.
    pub counterparty: PartyId,
    /// `underlying:valuation`. Units are in the base, cash in the quote.
    pub pair: Pair,
    pub price_min: Decimal,
    pub price_max: Decimal,
    pub tolerance: Decimal,
    /// Price the opening holding is valid at; defaults to `price_min`.
    pub reference: Option<Decimal>,
    /// Holder's unconditional holding, becomes the product's endowment.
    pub opening: Holding,
    /// Oracles and policy for every emitted condition.
    pub template: ConditionTemplate,
}

impl SynthesisRequest {
    pub fn new(
        holder: PartyId,
        counterparty: PartyId,
        pair: Pair,
        template: ConditionTemplate,
        price_min: Decimal,
        price_max: Decimal,
    ) -> Self {
        Self {
            label: format!("synthetic {pair}"),
            holder,
            counterparty,
            pair,
            price_min,
            price_max,
            tolerance: Decimal::ZERO,
            reference: None,
            opening: Holding::default(),
            template,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_tolerance(mut self, tolerance: Decimal) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_reference(mut self, reference: Decimal) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_opening(mut self, opening: Holding) -> Self {
        self.opening = opening;
        self
    }

    fn validate(&self) -> Result<Decimal, SolverError> {
        if self.price_min < Decimal::ZERO || self.price_max < self.price_min {
            return Err(SolverError::InvalidDomain {
                min: self.price_min,
                max: self.price_max,
            });
        }
        if self.tolerance < Decimal::ZERO {
            return Err(SolverError::InvalidTolerance(self.tolerance));
        }
        let reference = self.reference.unwrap_or(self.price_min);
        if reference < self.price_min || reference > self.price_max {
            return Err(SolverError::InvalidReference(reference));
        }
        Ok(reference)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Sweep {
    Up,
    Down,
}

impl Sweep {
    fn trigger(self) -> TriggerDirection {
        match self {
            Sweep::Up => TriggerDirection::RevealTriggers,
            Sweep::Down => TriggerDirection::AbsenceTriggers,
        }
    }
}

/// Greedy decomposition solver. Stateless between calls.
#[derive(Clone, Debug, Default)]
pub struct Solver {
    config: SolverConfig,
}

impl Solver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Builds a product reproducing `target` to within the request's
    /// tolerance at every check point of the domain.
    ///
    /// Fails with [`SolverError::ResidualExceeded`] if the thresholds are
    /// too coarse for the tolerance.
    pub fn synthesize<V>(
        &self,
        target: V,
        thresholds: &[Decimal],
        request: &SynthesisRequest,
    ) -> Result<Product, SolverError>
    where
        V: Fn(Decimal) -> Decimal,
    {
        let reference = request.validate()?;
        let thresholds = clip_thresholds(thresholds, request.price_min, request.price_max);
        let regions = regions(
            &thresholds,
            request.price_min,
            request.price_max,
            self.config.samples_per_region,
        );

        let below = thresholds.iter().filter(|t| **t <= reference).count();
        let pivot = below.max(1);

        let mut product = Product::new(request.label.clone(), request.holder.clone());
        if !request.opening.units.is_zero() {
            product = product.with_endowment(request.pair.base.clone(), request.opening.units);
        }
        if !request.opening.cash.is_zero() {
            product = product.with_endowment(request.pair.quote.clone(), request.opening.cash);
        }

        let up: Vec<usize> = (pivot..regions.len()).collect();
        let down: Vec<usize> = (0..pivot.min(regions.len())).rev().collect();
        self.sweep(&target, &thresholds, &regions, &up, Sweep::Up, request, &mut product)?;
        self.sweep(&target, &thresholds, &regions, &down, Sweep::Down, request, &mut product)?;

        self.verify(&target, &regions, request, &product)?;
        info!(
            label = %product.label,
            legs = product.legs().len(),
            thresholds = thresholds.len(),
            id = %product.compute_id(),
            "synthesized product"
        );
        Ok(product)
    }

    #[allow(clippy::too_many_arguments)]
    fn sweep<V>(
        &self,
        target: &V,
        thresholds: &[Decimal],
        regions: &[Region],
        order: &[usize],
        direction: Sweep,
        request: &SynthesisRequest,
        product: &mut Product,
    ) -> Result<(), SolverError>
    where
        V: Fn(Decimal) -> Decimal,
    {
        let tolerance = request.tolerance;
        let mut state = request.opening;

        for (pos, &k) in order.iter().enumerate() {
            let region = &regions[k];
            let Some((price, residual)) = worst_deviation(target, &state, &region.samples) else {
                continue;
            };
            if residual <= tolerance {
                continue;
            }

            // Up: the region's entry threshold. Down: its exit threshold.
            let threshold = match direction {
                Sweep::Up => k.checked_sub(1).and_then(|i| thresholds.get(i)),
                Sweep::Down => thresholds.get(k),
            };
            let Some(&threshold) = threshold else {
                return Err(SolverError::ResidualExceeded {
                    price,
                    residual,
                    tolerance,
                });
            };

            let rest: Vec<&Region> = order[pos + 1..].iter().map(|&j| &regions[j]).collect();
            let chosen = self.choose(target, &state, region, &rest, tolerance)?;
            debug!(
                %threshold,
                direction = ?direction,
                kind = ?chosen.kind,
                cash = %chosen.holding.cash,
                units = %chosen.holding.units,
                "correction"
            );

            self.emit(product, request, &state, &chosen.holding, threshold, direction)?;
            state = chosen.holding;
        }
        Ok(())
    }

    /// Cheapest fitting candidate; among equals the one that keeps fitting
    /// longest, then units before cash before a swap.
    fn choose<V>(
        &self,
        target: &V,
        state: &Holding,
        region: &Region,
        rest: &[&Region],
        tolerance: Decimal,
    ) -> Result<Candidate, SolverError>
    where
        V: Fn(Decimal) -> Decimal,
    {
        let all = candidates(target, state, &region.samples, self.config.amount_scale);

        let reach = |c: &Candidate| {
            rest.iter()
                .take_while(|r| fits(target, &c.holding, &r.samples, tolerance))
                .count()
        };
        let rank = |kind: CandidateKind| match kind {
            CandidateKind::Units => 0,
            CandidateKind::Cash => 1,
            CandidateKind::Swap => 2,
        };

        let best = all
            .iter()
            .filter(|c| c.worst.1 <= tolerance && state.legs_to(&c.holding) > 0)
            .min_by_key(|&c| (state.legs_to(&c.holding), Reverse(reach(c)), rank(c.kind)));

        if let Some(best) = best {
            return Ok(*best);
        }

        let (price, residual) = all
            .iter()
            .map(|c| c.worst)
            .min_by(|a, b| a.1.cmp(&b.1))
            .or_else(|| worst_deviation(target, state, &region.samples))
            .unwrap_or((region.lower, Decimal::ZERO));
        Err(SolverError::ResidualExceeded {
            price,
            residual,
            tolerance,
        })
    }

    /// One leg per changed component, units first.
    fn emit(
        &self,
        product: &mut Product,
        request: &SynthesisRequest,
        from: &Holding,
        to: &Holding,
        threshold: Decimal,
        direction: Sweep,
    ) -> Result<(), SolverError> {
        let condition = request.template.at(threshold)?;
        let deltas = [
            (&request.pair.base, to.units.checked_sub(from.units)),
            (&request.pair.quote, to.cash.checked_sub(from.cash)),
        ];
        for (asset, delta) in deltas {
            let delta = delta.ok_or_else(|| EvaluationError::Overflow {
                asset: asset.clone(),
            })?;
            if delta.is_zero() {
                continue;
            }
            let (payer, payee) = if delta > Decimal::ZERO {
                (&request.counterparty, &request.holder)
            } else {
                (&request.holder, &request.counterparty)
            };
            let leg = HtlcLeg::new(
                payer.clone(),
                payee.clone(),
                asset.clone(),
                delta.abs(),
                condition.clone(),
                direction.trigger(),
            )?;
            debug!(leg = %leg, "emit leg");
            product.push_leg(leg);
        }
        Ok(())
    }

    /// Re-evaluates the finished product at every check point.
    fn verify<V>(
        &self,
        target: &V,
        regions: &[Region],
        request: &SynthesisRequest,
        product: &Product,
    ) -> Result<(), SolverError>
    where
        V: Fn(Decimal) -> Decimal,
    {
        let evaluator = Evaluator::new(PairQuote::new(request.pair.clone()));
        for price in regions.iter().flat_map(|r| r.samples.iter().copied()) {
            let value = evaluator
                .evaluate(product, &Scenario::spot(price))?
                .portfolio_value;
            let residual = target(price)
                .checked_sub(value)
                .map(|d| d.abs())
                .unwrap_or(Decimal::MAX);
            if residual > request.tolerance {
                return Err(SolverError::ResidualExceeded {
                    price,
                    residual,
                    tolerance: request.tolerance,
                });
            }
        }
        Ok(())
    }
}
