//! Fitting primitives for the decomposition solver.
//!
//! Between two consecutive thresholds no leg changes state, so the
//! holder's value there is affine in the price: `cash + units * p`. The
//! solver walks the regions cut out by the oracle table and, where the
//! current holding misses the target by more than the tolerance, looks for
//! a new holding among a few cheap candidates.

use rust_decimal::Decimal;

/// Affine exposure: `cash` in the quote asset plus `units` of the base.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Holding {
    pub cash: Decimal,
    pub units: Decimal,
}

impl Holding {
    pub fn new(cash: Decimal, units: Decimal) -> Self {
        Self { cash, units }
    }

    pub fn cash(cash: Decimal) -> Self {
        Self::new(cash, Decimal::ZERO)
    }

    pub fn units(units: Decimal) -> Self {
        Self::new(Decimal::ZERO, units)
    }

    /// `cash + units * price`, or `None` if that overflows.
    pub fn value(&self, price: Decimal) -> Option<Decimal> {
        self.units.checked_mul(price)?.checked_add(self.cash)
    }

    /// Number of legs needed to move from `self` to `other`.
    pub fn legs_to(&self, other: &Holding) -> usize {
        usize::from(self.cash != other.cash) + usize::from(self.units != other.units)
    }
}

/// Price interval between consecutive thresholds and the points it is
/// checked at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub lower: Decimal,
    pub samples: Vec<Decimal>,
}

impl Region {
    /// `[lower, upper)` sampled at `per_region` evenly spaced points from
    /// `lower`. A `closed` region also checks `upper`.
    fn sampled(lower: Decimal, upper: Decimal, closed: bool, per_region: usize) -> Self {
        let mut samples = Vec::new();
        if lower < upper {
            let n = Decimal::from(per_region.max(1));
            let step = (upper - lower) / n;
            for j in 0..per_region.max(1) {
                samples.push(lower + step * Decimal::from(j));
            }
        }
        if closed && samples.last() != Some(&upper) {
            samples.push(upper);
        }
        Self { lower, samples }
    }
}

/// Cuts `[min, max]` at `thresholds` (sorted, de-duplicated, clipped to the
/// domain).
///
/// Region 0 is `[min, t_0)`; region `k >= 1` starts at `t_{k-1}`. The last
/// region is closed on `max`.
pub fn regions(thresholds: &[Decimal], min: Decimal, max: Decimal, per_region: usize) -> Vec<Region> {
    let mut out = Vec::with_capacity(thresholds.len() + 1);
    let first_upper = thresholds.first().copied().unwrap_or(max);
    out.push(Region::sampled(min, first_upper, thresholds.is_empty(), per_region));
    for (i, lower) in thresholds.iter().enumerate() {
        let last = i + 1 == thresholds.len();
        let upper = thresholds.get(i + 1).copied().unwrap_or(max);
        out.push(Region::sampled(*lower, upper, last, per_region));
    }
    out
}

/// Sorted, de-duplicated thresholds inside `[min, max]`.
pub fn clip_thresholds(thresholds: &[Decimal], min: Decimal, max: Decimal) -> Vec<Decimal> {
    let mut clipped: Vec<Decimal> = thresholds
        .iter()
        .copied()
        .filter(|t| *t >= min && *t <= max)
        .collect();
    clipped.sort();
    clipped.dedup();
    clipped
}

/// Largest `|target(p) - holding(p)|` over `samples`, with the price where
/// it occurs. A deviation that overflows counts as `Decimal::MAX`.
pub fn worst_deviation<V>(target: &V, holding: &Holding, samples: &[Decimal]) -> Option<(Decimal, Decimal)>
where
    V: Fn(Decimal) -> Decimal,
{
    samples
        .iter()
        .map(|p| (*p, deviation(target(*p), holding.value(*p))))
        .max_by(|a, b| a.1.cmp(&b.1))
}

fn deviation(target: Decimal, value: Option<Decimal>) -> Decimal {
    value
        .and_then(|v| target.checked_sub(v))
        .map(|d| d.abs())
        .unwrap_or(Decimal::MAX)
}

pub fn fits<V>(target: &V, holding: &Holding, samples: &[Decimal], tolerance: Decimal) -> bool
where
    V: Fn(Decimal) -> Decimal,
{
    worst_deviation(target, holding, samples).is_none_or(|(_, dev)| dev <= tolerance)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CandidateKind {
    Units,
    Cash,
    Swap,
}

/// A proposed holding for a region and how well it fits there.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub kind: CandidateKind,
    pub holding: Holding,
    /// Worst price and deviation over the region's samples.
    pub worst: (Decimal, Decimal),
}

fn midrange<I: IntoIterator<Item = Decimal>>(values: I) -> Option<Decimal> {
    let mut iter = values.into_iter();
    let first = iter.next()?;
    let (lo, hi) = iter.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
    Some(lo / Decimal::TWO + hi / Decimal::TWO)
}

/// Candidate holdings for a region, from `current`:
///
/// - `Units`: keep the cash, pick units (one leg).
/// - `Cash`: keep the units, pick cash (one leg).
/// - `Swap`: pick both, slope through the extreme samples (two legs).
///
/// Amounts are rounded to `scale` decimal places before scoring.
pub fn candidates<V>(target: &V, current: &Holding, samples: &[Decimal], scale: u32) -> Vec<Candidate>
where
    V: Fn(Decimal) -> Decimal,
{
    let mut out = Vec::new();
    let score = |kind, holding: Holding| {
        worst_deviation(target, &holding, samples).map(|worst| Candidate { kind, holding, worst })
    };

    let positive: Vec<Decimal> = samples.iter().copied().filter(|p| !p.is_zero()).collect();
    let units = positive
        .iter()
        .map(|p| target(*p).checked_sub(current.cash)?.checked_div(*p))
        .collect::<Option<Vec<_>>>();
    if let Some(units) = units.and_then(midrange) {
        out.extend(score(
            CandidateKind::Units,
            Holding::new(current.cash, units.round_dp(scale)),
        ));
    }

    let cash = samples
        .iter()
        .map(|p| target(*p).checked_sub(current.units.checked_mul(*p)?))
        .collect::<Option<Vec<_>>>();
    if let Some(cash) = cash.and_then(midrange) {
        out.extend(score(
            CandidateKind::Cash,
            Holding::new(cash.round_dp(scale), current.units),
        ));
    }

    if let (Some(first), Some(last)) = (samples.first(), samples.last()) {
        if first != last {
            let slope = target(*last)
                .checked_sub(target(*first))
                .and_then(|rise| rise.checked_div(*last - *first))
                .map(|s| s.round_dp(scale));
            let cash = slope.and_then(|slope| {
                samples
                    .iter()
                    .map(|p| target(*p).checked_sub(slope.checked_mul(*p)?))
                    .collect::<Option<Vec<_>>>()
                    .and_then(midrange)
                    .map(|cash| (cash, slope))
            });
            if let Some((cash, slope)) = cash {
                out.extend(score(
                    CandidateKind::Swap,
                    Holding::new(cash.round_dp(scale), slope),
                ));
            }
        }
    }

    out
}
