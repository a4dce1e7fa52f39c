//! Threshold schedules for oracle price ladders.
//!
//! A schedule says *where* an oracle places its levels. Two shapes are
//! supported: fixed intervals, and logarithmic "decades" (any constant
//! multiple, e.g. octaves for factor 2) of `steps` levels each. Logarithmic
//! tables can be split into interleaved stagger planes so that several
//! coarse tables from different oracles combine into finer coverage.
//!
//! Plane numbering encodes both the plane and the plane count in one
//! integer: the most significant bit gives the count, the rest the index.
//! `1` is table 1 of 1, `2`/`3` are tables 1 and 2 of 2, `4..=7` are the
//! four planes of 4, and so on.

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::error::ObservationError;

/// Upper bound on the levels one schedule may generate.
const MAX_LEVELS: usize = 100_000;

/// `groups * per_group + 1` levels, if that stays within [`MAX_LEVELS`].
fn level_count(groups: u32, per_group: u32) -> Result<usize, ObservationError> {
    usize::try_from(groups)
        .ok()
        .zip(usize::try_from(per_group).ok())
        .and_then(|(g, p)| g.checked_mul(p))
        .and_then(|n| n.checked_add(1))
        .filter(|n| *n <= MAX_LEVELS)
        .ok_or_else(|| {
            ObservationError::InvalidSchedule(format!(
                "{groups} x {per_group} levels exceed {MAX_LEVELS}"
            ))
        })
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelSchedule {
    /// `start + k * interval` for `k = 0..=steps`.
    Interval {
        start: Decimal,
        interval: Decimal,
        steps: u32,
    },
    /// `start * factor^(k / steps)` over `decades` decades, shifted by the
    /// stagger of `plane`.
    Logarithmic {
        start: Decimal,
        factor: Decimal,
        decades: u32,
        steps: u32,
        plane: u32,
    },
}

impl LevelSchedule {
    /// Generates ascending, de-duplicated thresholds rounded to `scale`
    /// decimal places. Negative levels are dropped.
    pub fn thresholds(&self, scale: u32) -> Result<Vec<Decimal>, ObservationError> {
        let mut levels = match self {
            LevelSchedule::Interval {
                start,
                interval,
                steps,
            } => {
                if interval.is_zero() {
                    return Err(ObservationError::InvalidSchedule(
                        "interval must be non-zero".into(),
                    ));
                }
                level_count(*steps, 1)?;
                (0..=*steps)
                    .map(|k| {
                        interval
                            .checked_mul(Decimal::from(k))
                            .and_then(|offset| start.checked_add(offset))
                            .map(|p| p.round_dp(scale))
                            .ok_or_else(|| {
                                ObservationError::InvalidSchedule(format!(
                                    "level {k} of {start} + k * {interval} overflows"
                                ))
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
            LevelSchedule::Logarithmic {
                start,
                factor,
                decades,
                steps,
                plane,
            } => log_levels(*start, *factor, *decades, *steps, *plane, scale)?,
        };

        levels.retain(|p| !p.is_sign_negative());
        levels.sort();
        levels.dedup();
        Ok(levels)
    }

    /// Short descriptor used in ladder headers, e.g. `b0.1:f2:s16` or
    /// `b32000:f2:s6:p3d`.
    pub fn descriptor(&self) -> String {
        match self {
            LevelSchedule::Interval {
                start,
                interval,
                steps,
            } => format!(
                "b{}:v{}:s{}",
                start.normalize(),
                interval.abs().normalize(),
                steps
            ),
            LevelSchedule::Logarithmic {
                start,
                factor,
                steps,
                plane,
                ..
            } => {
                let rising = *factor > Decimal::ONE;
                let norm = if rising || factor.is_zero() {
                    *factor
                } else {
                    Decimal::ONE / *factor
                };
                let mut out = format!("b{}:f{}:s{}", start.normalize(), norm.normalize(), steps);
                if *plane != 1 {
                    out.push_str(&format!(":p{}{}", plane, if rising { "u" } else { "d" }));
                }
                out
            }
        }
    }
}

fn log_levels(
    start: Decimal,
    factor: Decimal,
    decades: u32,
    steps: u32,
    plane: u32,
    scale: u32,
) -> Result<Vec<Decimal>, ObservationError> {
    let factor_f = factor.to_f64().unwrap_or(0.0);
    let start_f = start.to_f64().unwrap_or(0.0);
    if steps == 0 || plane == 0 {
        return Err(ObservationError::InvalidSchedule(
            "steps and plane must be positive".into(),
        ));
    }
    if factor_f <= 0.0 || factor == Decimal::ONE {
        return Err(ObservationError::InvalidSchedule(format!(
            "factor {factor} must be positive and different from 1"
        )));
    }

    let step = factor_f.powf(1.0 / f64::from(steps));
    let (n, d) = stagger_ratio(plane - msb(plane));
    let stagger = step.powf(n as f64 / d as f64);

    let mut multiples = Vec::with_capacity(level_count(decades, steps)?);
    multiples.push(stagger);
    let mut base = stagger;
    for _ in 0..decades {
        for i in 1..steps {
            multiples.push(base * step.powi(i as i32));
        }
        // Close each decade on the exact factor so error does not accumulate.
        base *= factor_f;
        multiples.push(base);
    }

    multiples
        .into_iter()
        .map(|m| {
            Decimal::from_f64(start_f * m)
                .map(|p| p.round_dp(scale))
                .ok_or_else(|| ObservationError::InvalidSchedule(format!("level {m} overflows")))
        })
        .collect()
}

fn msb(x: u32) -> u32 {
    if x == 0 { 0 } else { 1 << (31 - x.leading_zeros()) }
}

/// `(n, d)` such that the `idx`-th stagger plane is offset by
/// `step^(n/d)` from plane zero.
fn stagger_ratio(idx: u32) -> (u64, u64) {
    if idx == 0 {
        return (0, 1);
    }
    let top = msb(idx);
    let d = u64::from(top) * 2;
    let (n0, d0) = stagger_ratio(idx - top);
    (1 + n0 * d / d0, d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn interval_schedule_is_inclusive() {
        let schedule = LevelSchedule::Interval {
            start: dec!(0.04),
            interval: dec!(0.01),
            steps: 3,
        };
        assert_eq!(
            schedule.thresholds(8).unwrap(),
            vec![dec!(0.04), dec!(0.05), dec!(0.06), dec!(0.07)]
        );
        assert_eq!(schedule.descriptor(), "b0.04:v0.01:s3");
    }

    #[test]
    fn descending_interval_is_sorted_and_clipped() {
        let schedule = LevelSchedule::Interval {
            start: dec!(0.02),
            interval: dec!(-0.01),
            steps: 4,
        };
        assert_eq!(
            schedule.thresholds(8).unwrap(),
            vec![dec!(0), dec!(0.01), dec!(0.02)]
        );
    }

    #[test]
    fn stagger_ratios_follow_bit_reversal() {
        assert_eq!(stagger_ratio(0), (0, 1));
        assert_eq!(stagger_ratio(1), (1, 2));
        assert_eq!(stagger_ratio(2), (1, 4));
        assert_eq!(stagger_ratio(3), (3, 4));
        assert_eq!(stagger_ratio(5), (5, 8));
    }

    #[test]
    fn logarithmic_schedule_spans_decades() {
        let schedule = LevelSchedule::Logarithmic {
            start: dec!(1),
            factor: dec!(2),
            decades: 1,
            steps: 2,
            plane: 1,
        };
        assert_eq!(
            schedule.thresholds(8).unwrap(),
            vec![dec!(1), dec!(1.41421356), dec!(2)]
        );

        let wide = LevelSchedule::Logarithmic {
            start: dec!(0.1),
            factor: dec!(2),
            decades: 2,
            steps: 16,
            plane: 1,
        };
        let levels = wide.thresholds(8).unwrap();
        assert_eq!(levels.len(), 33);
        assert_eq!(levels.first(), Some(&dec!(0.1)));
        assert_eq!(levels.last(), Some(&dec!(0.4)));
        assert!(levels.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn stagger_planes_interleave() {
        let plane = |plane| LevelSchedule::Logarithmic {
            start: dec!(1),
            factor: dec!(2),
            decades: 1,
            steps: 2,
            plane,
        };
        // Planes 1 and 2 share prices; plane 3 sits halfway (in log terms).
        assert_eq!(plane(2).thresholds(8).unwrap(), plane(1).thresholds(8).unwrap());
        assert_eq!(
            plane(3).thresholds(8).unwrap(),
            vec![dec!(1.18920712), dec!(1.68179283), dec!(2.37841423)]
        );
        assert_eq!(plane(3).descriptor(), "b1:f2:s2:p3u");
    }

    #[test]
    fn degenerate_schedules_are_rejected() {
        let flat = LevelSchedule::Logarithmic {
            start: dec!(1),
            factor: dec!(1),
            decades: 1,
            steps: 4,
            plane: 1,
        };
        assert!(matches!(
            flat.thresholds(8),
            Err(ObservationError::InvalidSchedule(_))
        ));

        let zero = LevelSchedule::Interval {
            start: dec!(1),
            interval: dec!(0),
            steps: 4,
        };
        assert!(zero.thresholds(8).is_err());
    }

    #[test]
    fn oversized_schedules_are_rejected() {
        let huge = LevelSchedule::Logarithmic {
            start: dec!(1),
            factor: dec!(2),
            decades: 70_000,
            steps: 70_000,
            plane: 1,
        };
        assert!(matches!(
            huge.thresholds(8),
            Err(ObservationError::InvalidSchedule(_))
        ));

        let long = LevelSchedule::Interval {
            start: dec!(0),
            interval: dec!(1),
            steps: u32::MAX,
        };
        assert!(matches!(
            long.thresholds(8),
            Err(ObservationError::InvalidSchedule(_))
        ));

        let overflowing = LevelSchedule::Interval {
            start: dec!(1),
            interval: Decimal::MAX,
            steps: 2,
        };
        assert!(matches!(
            overflowing.thresholds(8),
            Err(ObservationError::InvalidSchedule(_))
        ));

        let largest = LevelSchedule::Interval {
            start: dec!(0),
            interval: dec!(1),
            steps: (MAX_LEVELS - 1) as u32,
        };
        assert_eq!(largest.thresholds(0).unwrap().len(), MAX_LEVELS);
    }
}
