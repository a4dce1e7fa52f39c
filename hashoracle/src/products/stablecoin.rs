//! Bounded stable coin: a collateral pool in the base asset split between a
//! stable side and a variable side.
//!
//! The pool is cut into tranches at geometrically spaced switch prices. A
//! tranche goes to the variable side when the oracle reveals that the price
//! reached its switch price and to the stable side otherwise. As the price
//! falls the stable side keeps more base units, so its quote value stays
//! inside `[face / sqrt(g), face * sqrt(g)]` across the protected range.

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregation::ConditionTemplate;
use crate::error::ProductError;
use crate::types::{Pair, PartyId, Product};

/// Upper bound on tranches per side.
const MAX_STEPS: u32 = 1_000;

/// Scale of computed switch prices and tranche amounts.
const AMOUNT_SCALE: u32 = 8;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedStableCoin {
    /// Face value in the quote asset.
    pub face: Decimal,
    pub pair: Pair,
    /// Reference price the protected range is centred on.
    pub today: Decimal,
    /// The range covers `[today / upside, today * upside]`.
    pub upside: Decimal,
    /// Step ratio between adjacent switch prices.
    pub growth: Decimal,
    /// `sqrt(growth)`: the band's half-width as a ratio.
    pub spread: Decimal,
    /// Tranches above and below `today`.
    pub steps: u32,
    /// Collateral in the base asset.
    pub principal: Decimal,
    /// Ascending switch prices, `2 * steps` of them.
    pub switch_prices: Vec<Decimal>,
    /// Tranche amounts, one per switch price.
    pub slices: Vec<Decimal>,
    /// What is left after the last slice. Always stays with the stable side.
    pub remainder: Decimal,
}

fn to_f64(name: &str, value: Decimal) -> Result<f64, ProductError> {
    value
        .to_f64()
        .ok_or_else(|| ProductError::InvalidParameter(format!("{name} {value} out of range")))
}

fn from_f64(name: &str, value: f64) -> Result<Decimal, ProductError> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(AMOUNT_SCALE))
        .ok_or_else(|| ProductError::InvalidParameter(format!("{name} {value} out of range")))
}

impl BoundedStableCoin {
    /// Sizes a coin worth `face` (quote asset) at price `today`, stable to
    /// within `tolerance` (a ratio > 1) while the price stays within a
    /// factor `upside` of `today`.
    ///
    /// The number of steps is the smallest `n` with `upside^(1/n) <= tolerance`
    /// and the collateral is `upside * face / today` base units.
    pub fn face(
        face: Decimal,
        pair: Pair,
        today: Decimal,
        upside: Decimal,
        tolerance: Decimal,
    ) -> Result<Self, ProductError> {
        if face <= Decimal::ZERO || today <= Decimal::ZERO {
            return Err(ProductError::InvalidParameter(format!(
                "face {face} and price {today} must be positive"
            )));
        }
        if tolerance <= Decimal::ONE {
            return Err(ProductError::InvalidParameter(format!(
                "tolerance {tolerance} must exceed 1"
            )));
        }
        if upside <= Decimal::ONE {
            return Err(ProductError::InvalidParameter(format!(
                "upside {upside} must exceed 1"
            )));
        }

        let up = to_f64("upside", upside)?;
        let tol = to_f64("tolerance", tolerance)?;
        let today_f = to_f64("price", today)?;

        let mut steps = 1;
        let mut g = up;
        while g > tol {
            steps += 1;
            if steps > MAX_STEPS {
                return Err(ProductError::InvalidParameter(format!(
                    "tolerance {tolerance} needs more than {MAX_STEPS} steps"
                )));
            }
            g = up.powf(1.0 / f64::from(steps));
        }

        let growth = from_f64("growth", g)?;
        let spread = from_f64("spread", g.sqrt())?;
        let principal = upside
            .checked_mul(face)
            .and_then(|v| v.checked_div(today))
            .ok_or_else(|| {
                ProductError::InvalidParameter(format!(
                    "collateral {upside} * {face} / {today} out of range"
                ))
            })?;
        let cut = Decimal::ONE - Decimal::ONE / growth;

        let n = i64::from(steps);
        let mut switch_prices = Vec::with_capacity(2 * steps as usize);
        for k in -n..n {
            switch_prices.push(from_f64("switch price", today_f * g.powf(k as f64 + 0.5))?);
        }

        let mut remainder = principal;
        let mut slices = Vec::with_capacity(switch_prices.len());
        for _ in &switch_prices {
            let slice = (remainder * cut).round_dp(AMOUNT_SCALE);
            slices.push(slice);
            remainder -= slice;
        }

        debug!(%face, %today, steps, %growth, %principal, %remainder, "sized bounded stable coin");
        Ok(Self {
            face,
            pair,
            today,
            upside,
            growth,
            spread,
            steps,
            principal,
            switch_prices,
            slices,
            remainder,
        })
    }

    /// Bounds on the stable side's quote value inside the protected range.
    pub fn band(&self) -> (Decimal, Decimal) {
        (self.face / self.spread, self.face.saturating_mul(self.spread))
    }

    /// Prices over which the band holds.
    pub fn protected_range(&self) -> (Decimal, Decimal) {
        (self.today / self.upside, self.today.saturating_mul(self.upside))
    }

    /// Builds the stable and the variable product over one shared set of
    /// tranches. `escrow` holds the collateral until settlement.
    pub fn products(
        &self,
        escrow: &PartyId,
        stable: &PartyId,
        variable: &PartyId,
        template: &ConditionTemplate,
    ) -> Result<(Product, Product), ProductError> {
        let base = &self.pair.base;
        let mut stable_side = Product::new(format!("{} {} ranged bond", self.face, self.pair.quote), stable.clone())
            .with_endowment(base.clone(), self.remainder);
        for (switch, slice) in self.switch_prices.iter().zip(&self.slices) {
            stable_side.add_tranche(escrow, variable, stable, base, *slice, template.at(*switch)?)?;
        }

        let mut variable_side = Product::new(
            format!("{} {} variability coin", self.principal - self.face / self.today, base),
            variable.clone(),
        );
        for leg in stable_side.legs() {
            variable_side.push_leg(leg.clone());
        }
        Ok((stable_side, variable_side))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ObservationDate, OracleId};
    use crate::valuation::{Evaluator, PairQuote, Scenario};
    use rust_decimal_macros::dec;

    fn coin() -> BoundedStableCoin {
        BoundedStableCoin::face(
            dec!(100),
            Pair::parse("BTS:USD").unwrap(),
            dec!(0.10),
            dec!(4),
            dec!(1.10),
        )
        .unwrap()
    }

    fn sides(coin: &BoundedStableCoin) -> (Product, Product) {
        coin.products(
            &PartyId::new("escrow"),
            &PartyId::new("stable"),
            &PartyId::new("variable"),
            &ConditionTemplate::single(ObservationDate(1_000), OracleId::new("oracle")),
        )
        .unwrap()
    }

    #[test]
    fn sizing() {
        let coin = coin();
        assert_eq!(coin.steps, 15);
        assert_eq!(coin.principal, dec!(4000));
        assert_eq!(coin.switch_prices.len(), 30);
        assert_eq!(coin.slices.len(), 30);
        assert!(coin.switch_prices.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(coin.slices.iter().sum::<Decimal>() + coin.remainder, coin.principal);
        // 4000 / g^30 = 4000 / 16
        assert!((coin.remainder - dec!(250)).abs() < dec!(0.01));
        assert_eq!(coin.protected_range(), (dec!(0.025), dec!(0.4)));
    }

    #[test]
    fn stable_side_stays_in_band() {
        let coin = coin();
        let (stable, variable) = sides(&coin);
        let (lo, hi) = coin.band();
        assert!(lo > dec!(95.4) && hi < dec!(104.8));

        let ev = Evaluator::new(PairQuote::new(coin.pair.clone()));
        for cents in 3..=38 {
            let price = Decimal::new(cents, 2);
            let s = Scenario::spot(price);
            let stable_value = ev.evaluate(&stable, &s).unwrap().portfolio_value;
            let variable_value = ev.evaluate(&variable, &s).unwrap().portfolio_value;

            assert!(
                stable_value > dec!(95.4) && stable_value < dec!(104.8),
                "stable value {stable_value} at {price}"
            );
            assert_eq!(stable_value + variable_value, coin.principal * price);
        }
    }

    #[test]
    fn below_the_range_everything_is_stable() {
        let coin = coin();
        let (stable, variable) = sides(&coin);
        let ev = Evaluator::new(PairQuote::new(coin.pair.clone()));
        let s = Scenario::spot(dec!(0.01));

        let result = ev.evaluate(&variable, &s).unwrap();
        assert_eq!(result.portfolio_value, Decimal::ZERO);
        assert_eq!(ev.evaluate(&stable, &s).unwrap().portfolio_value, dec!(40));
    }

    #[test]
    fn rejects_bad_parameters() {
        let pair = Pair::parse("BTS:USD").unwrap();
        for (face, today, upside, tol) in [
            (dec!(0), dec!(0.1), dec!(4), dec!(1.1)),
            (dec!(100), dec!(0.1), dec!(4), dec!(1)),
            (dec!(100), dec!(0.1), dec!(1), dec!(1.1)),
            (dec!(100), dec!(-0.1), dec!(4), dec!(1.1)),
            // Collateral does not fit in a Decimal.
            (Decimal::MAX, dec!(0.1), dec!(4), dec!(1.1)),
        ] {
            let err = BoundedStableCoin::face(face, pair.clone(), today, upside, tol).unwrap_err();
            assert!(matches!(err, ProductError::InvalidParameter(_)));
        }
    }
}
