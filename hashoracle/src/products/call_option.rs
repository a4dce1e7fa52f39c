//! Call option as a paired HTLC "atomic swap".
//!
//! The writer locks `quantity` of the underlying; the buyer locks
//! `quantity * strike` of the quote asset. If the oracle reveals that the
//! price reached the strike, both legs execute: the buyer receives the
//! underlying and the writer the escrow. Otherwise both sides keep what
//! they locked.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregation::AggregatedCondition;
use crate::error::ProductError;
use crate::types::{HtlcLeg, Pair, PartyId, Product, TriggerDirection};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOption {
    /// `underlying:quote`.
    pub pair: Pair,
    /// Units of the underlying delivered on exercise.
    pub quantity: Decimal,
    pub strike: Decimal,
    /// List price as a multiple of the escrow.
    pub premium: Decimal,
}

impl CallOption {
    pub fn new(pair: Pair, quantity: Decimal, strike: Decimal, premium: Decimal) -> Result<Self, ProductError> {
        if quantity <= Decimal::ZERO || strike <= Decimal::ZERO {
            return Err(ProductError::InvalidParameter(format!(
                "quantity {quantity} and strike {strike} must be positive"
            )));
        }
        if premium < Decimal::ZERO {
            return Err(ProductError::InvalidParameter(format!(
                "premium {premium} must be non-negative"
            )));
        }
        let list = quantity.checked_mul(strike).and_then(|e| e.checked_mul(premium));
        if list.is_none() {
            return Err(ProductError::InvalidParameter(format!(
                "escrow {quantity} * {strike} out of range"
            )));
        }
        Ok(Self {
            pair,
            quantity,
            strike,
            premium,
        })
    }

    /// Quote amount the buyer locks: `quantity * strike`.
    pub fn escrow(&self) -> Decimal {
        self.quantity * self.strike
    }

    pub fn list_price(&self) -> Decimal {
        self.premium * self.escrow()
    }

    /// Buyer's value at settlement price `price`, in the quote asset.
    pub fn payoff(&self, price: Decimal) -> Decimal {
        let upside = self
            .quantity
            .saturating_mul(price.saturating_sub(self.strike))
            .max(Decimal::ZERO);
        self.escrow().saturating_add(upside)
    }

    /// The swap legs: underlying first, then the escrow.
    fn legs(
        &self,
        buyer: &PartyId,
        writer: &PartyId,
        condition: &AggregatedCondition,
    ) -> Result<[HtlcLeg; 2], ProductError> {
        let underlying = HtlcLeg::new(
            writer.clone(),
            buyer.clone(),
            self.pair.base.clone(),
            self.quantity,
            condition.clone(),
            TriggerDirection::RevealTriggers,
        )?;
        let payment = HtlcLeg::new(
            buyer.clone(),
            writer.clone(),
            self.pair.quote.clone(),
            self.escrow(),
            condition.clone(),
            TriggerDirection::RevealTriggers,
        )?;
        Ok([underlying, payment])
    }

    fn check_condition(&self, condition: &AggregatedCondition) -> Result<(), ProductError> {
        if condition.threshold != self.strike {
            return Err(ProductError::InvalidParameter(format!(
                "condition threshold {} differs from strike {}",
                condition.threshold, self.strike
            )));
        }
        Ok(())
    }

    /// The buyer's side: escrow endowment plus the swap.
    pub fn long(
        &self,
        buyer: &PartyId,
        writer: &PartyId,
        condition: &AggregatedCondition,
    ) -> Result<Product, ProductError> {
        self.check_condition(condition)?;
        let mut product = Product::new(format!("long call {} @ {} {}", self.quantity, self.strike, self.pair), buyer.clone())
            .with_endowment(self.pair.quote.clone(), self.escrow());
        for leg in self.legs(buyer, writer, condition)? {
            product.push_leg(leg);
        }
        Ok(product)
    }

    /// The writer's side: the locked underlying plus the swap.
    pub fn short(
        &self,
        buyer: &PartyId,
        writer: &PartyId,
        condition: &AggregatedCondition,
    ) -> Result<Product, ProductError> {
        self.check_condition(condition)?;
        let mut product = Product::new(format!("short call {} @ {} {}", self.quantity, self.strike, self.pair), writer.clone())
            .with_endowment(self.pair.base.clone(), self.quantity);
        for leg in self.legs(buyer, writer, condition)? {
            product.push_leg(leg);
        }
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::ConditionTemplate;
    use crate::config::SolverConfig;
    use crate::solver::{Holding, Solver, SynthesisRequest};
    use crate::types::{ObservationDate, OracleId};
    use crate::valuation::{Evaluator, PairQuote, Scenario};
    use rust_decimal_macros::dec;

    fn option() -> CallOption {
        CallOption::new(Pair::parse("BTS:USD").unwrap(), dec!(10000), dec!(0.05), dec!(1.15)).unwrap()
    }

    fn template() -> ConditionTemplate {
        ConditionTemplate::single(ObservationDate(1_000), OracleId::new("oracle"))
    }

    fn buyer() -> PartyId {
        PartyId::new("buyer")
    }

    fn writer() -> PartyId {
        PartyId::new("writer")
    }

    #[test]
    fn worked_example_values() {
        let option = option();
        assert_eq!(option.escrow(), dec!(500));
        assert_eq!(option.list_price(), dec!(575));

        let condition = template().at(dec!(0.05)).unwrap();
        let long = option.long(&buyer(), &writer(), &condition).unwrap();
        let short = option.short(&buyer(), &writer(), &condition).unwrap();
        let ev = Evaluator::new(PairQuote::new(option.pair.clone()));

        for (price, long_value, short_value) in [
            (dec!(0.03), dec!(500), dec!(300)),
            (dec!(0.05), dec!(500), dec!(500)),
            (dec!(0.08), dec!(800), dec!(500)),
        ] {
            let s = Scenario::spot(price);
            assert_eq!(ev.evaluate(&long, &s).unwrap().portfolio_value, long_value);
            assert_eq!(ev.evaluate(&short, &s).unwrap().portfolio_value, short_value);
            assert_eq!(option.payoff(price), long_value);
        }
    }

    #[test]
    fn solver_recovers_the_swap() {
        let option = option();
        let request = SynthesisRequest::new(
            buyer(),
            writer(),
            option.pair.clone(),
            template(),
            dec!(0),
            dec!(0.1),
        )
        .with_opening(Holding::cash(option.escrow()));

        // Two check points per region so the kink at the strike is seen.
        let solver = Solver::new(SolverConfig {
            samples_per_region: 2,
            amount_scale: 8,
        });
        let synthesized = solver
            .synthesize(|p| option.payoff(p), &[dec!(0.04), dec!(0.05), dec!(0.06)], &request)
            .expect("exactly representable");
        let long = option
            .long(&buyer(), &writer(), &template().at(dec!(0.05)).unwrap())
            .unwrap();

        assert_eq!(synthesized.legs(), long.legs());
        assert_eq!(synthesized.endowment, long.endowment);
    }

    #[test]
    fn rejects_bad_parameters() {
        let pair = Pair::parse("BTS:USD").unwrap();
        assert!(CallOption::new(pair.clone(), dec!(0), dec!(0.05), dec!(1)).is_err());
        assert!(CallOption::new(pair.clone(), dec!(1), dec!(0.05), dec!(-1)).is_err());
        assert!(CallOption::new(pair, Decimal::MAX, dec!(2), dec!(1)).is_err());

        let err = option()
            .long(&buyer(), &writer(), &template().at(dec!(0.06)).unwrap())
            .unwrap_err();
        assert!(matches!(err, ProductError::InvalidParameter(_)));

        let err = option()
            .long(&buyer(), &buyer(), &template().at(dec!(0.05)).unwrap())
            .unwrap_err();
        assert!(matches!(err, ProductError::Leg(_)));
    }
}
