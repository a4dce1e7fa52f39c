//! Agreement policies: how per-oracle facts combine into one resolution.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::AggregationError;
use crate::oracle::RevealFact;
use crate::types::OracleId;

use super::condition::{OracleTally, Resolution};

/// Quorum rule over an [`OracleTally`].
///
/// [`AgreementPolicy`] covers the common cases; custom rules can be
/// plugged in through [`super::AggregatedCondition::resolve_under`].
pub trait QuorumRule {
    /// Checks the rule against the oracles taking part in a condition.
    fn validate(&self, _participants: &BTreeSet<OracleId>) -> Result<(), AggregationError> {
        Ok(())
    }

    /// Combines the facts in `tally`. Must be monotone: recording more
    /// facts can move a `Disputed` result to `Holds`/`Fails`, never the
    /// other way round.
    fn resolve(&self, tally: &OracleTally) -> Resolution;
}

/// Built-in agreement policies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgreementPolicy {
    /// Every participant must agree.
    Unanimous,
    /// At least `k` of the `n` participants must reveal.
    KOfN { k: usize },
    /// A single designated oracle decides.
    Single { oracle: OracleId },
    /// Revealed weight must reach `quorum`. Participants without an entry
    /// weigh nothing.
    Weighted {
        weights: BTreeMap<OracleId, u64>,
        quorum: u64,
    },
}

impl AgreementPolicy {
    fn total_weight(weights: &BTreeMap<OracleId, u64>, tally: &OracleTally) -> u64 {
        tally
            .participants()
            .map(|o| weights.get(o).copied().unwrap_or(0))
            .sum()
    }

    fn weight_with(weights: &BTreeMap<OracleId, u64>, tally: &OracleTally, fact: RevealFact) -> u64 {
        tally
            .participants()
            .filter(|o| tally.fact(o) == fact)
            .map(|o| weights.get(o).copied().unwrap_or(0))
            .sum()
    }
}

impl QuorumRule for AgreementPolicy {
    fn validate(&self, participants: &BTreeSet<OracleId>) -> Result<(), AggregationError> {
        let n = participants.len();
        match self {
            AgreementPolicy::Unanimous => Ok(()),
            AgreementPolicy::KOfN { k } => {
                if *k == 0 || *k > n {
                    return Err(AggregationError::InvalidPolicy(format!(
                        "k = {k} must lie in 1..={n}"
                    )));
                }
                Ok(())
            }
            AgreementPolicy::Single { oracle } => {
                if !participants.contains(oracle) {
                    return Err(AggregationError::InvalidPolicy(format!(
                        "designated oracle {oracle} is not a participant"
                    )));
                }
                Ok(())
            }
            AgreementPolicy::Weighted { weights, quorum } => {
                if let Some(stranger) = weights.keys().find(|o| !participants.contains(*o)) {
                    return Err(AggregationError::InvalidPolicy(format!(
                        "weight given to non-participant {stranger}"
                    )));
                }
                let total: u64 = weights.values().sum();
                if *quorum == 0 || *quorum > total {
                    return Err(AggregationError::InvalidPolicy(format!(
                        "quorum {quorum} must lie in 1..={total}"
                    )));
                }
                Ok(())
            }
        }
    }

    fn resolve(&self, tally: &OracleTally) -> Resolution {
        match self {
            AgreementPolicy::Unanimous => {
                let n = tally.len();
                if n > 0 && tally.revealed() == n {
                    Resolution::Holds
                } else if n > 0 && tally.absent() == n {
                    Resolution::Fails
                } else {
                    Resolution::Disputed
                }
            }
            AgreementPolicy::KOfN { k } => {
                let n = tally.len();
                if *k == 0 || *k > n {
                    Resolution::Disputed
                } else if tally.revealed() >= *k {
                    Resolution::Holds
                } else if tally.absent() > n - *k {
                    Resolution::Fails
                } else {
                    Resolution::Disputed
                }
            }
            AgreementPolicy::Single { oracle } => match tally.fact(oracle) {
                RevealFact::Revealed => Resolution::Holds,
                RevealFact::Absent => Resolution::Fails,
                RevealFact::Pending => Resolution::Disputed,
            },
            AgreementPolicy::Weighted { weights, quorum } => {
                let total = Self::total_weight(weights, tally);
                if *quorum == 0 || *quorum > total {
                    return Resolution::Disputed;
                }
                let revealed = Self::weight_with(weights, tally, RevealFact::Revealed);
                let absent = Self::weight_with(weights, tally, RevealFact::Absent);
                if revealed >= *quorum {
                    Resolution::Holds
                } else if absent > total - *quorum {
                    Resolution::Fails
                } else {
                    Resolution::Disputed
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::RevealFact::{Absent, Pending, Revealed};

    fn oracles(names: &[&str]) -> BTreeSet<OracleId> {
        names.iter().map(|n| OracleId::new(*n)).collect()
    }

    fn tally(facts: &[(&str, RevealFact)]) -> OracleTally {
        let mut tally = OracleTally::new(facts.iter().map(|(n, _)| OracleId::new(*n)));
        for (name, fact) in facts {
            tally.record(&OracleId::new(*name), *fact).unwrap();
        }
        tally
    }

    #[test]
    fn two_of_three() {
        let policy = AgreementPolicy::KOfN { k: 2 };

        // Two reveals, one silent: holds.
        let t = tally(&[("a", Revealed), ("b", Revealed), ("c", Pending)]);
        assert_eq!(policy.resolve(&t), Resolution::Holds);

        // One reveal, one non-reveal, one unknown: no quorum either way.
        let t = tally(&[("a", Revealed), ("b", Absent), ("c", Pending)]);
        assert_eq!(policy.resolve(&t), Resolution::Disputed);

        // Two absent: the remaining oracle cannot reach k.
        let t = tally(&[("a", Absent), ("b", Absent), ("c", Revealed)]);
        assert_eq!(policy.resolve(&t), Resolution::Fails);
    }

    #[test]
    fn unanimous_needs_everyone() {
        let policy = AgreementPolicy::Unanimous;
        assert_eq!(
            policy.resolve(&tally(&[("a", Revealed), ("b", Revealed)])),
            Resolution::Holds
        );
        assert_eq!(
            policy.resolve(&tally(&[("a", Absent), ("b", Absent)])),
            Resolution::Fails
        );
        assert_eq!(
            policy.resolve(&tally(&[("a", Revealed), ("b", Absent)])),
            Resolution::Disputed
        );
        assert_eq!(
            policy.resolve(&tally(&[("a", Revealed), ("b", Pending)])),
            Resolution::Disputed
        );
    }

    #[test]
    fn single_follows_its_oracle() {
        let policy = AgreementPolicy::Single {
            oracle: OracleId::new("a"),
        };
        assert_eq!(
            policy.resolve(&tally(&[("a", Absent), ("b", Revealed)])),
            Resolution::Fails
        );
        assert_eq!(
            policy.resolve(&tally(&[("a", Revealed), ("b", Absent)])),
            Resolution::Holds
        );
        assert_eq!(
            policy.resolve(&tally(&[("a", Pending), ("b", Revealed)])),
            Resolution::Disputed
        );
    }

    #[test]
    fn weighted_quorum() {
        let weights: BTreeMap<OracleId, u64> = [("a", 3), ("b", 1), ("c", 1)]
            .into_iter()
            .map(|(n, w)| (OracleId::new(n), w))
            .collect();
        let policy = AgreementPolicy::Weighted { weights, quorum: 3 };
        policy.validate(&oracles(&["a", "b", "c"])).unwrap();

        assert_eq!(
            policy.resolve(&tally(&[("a", Revealed), ("b", Pending), ("c", Pending)])),
            Resolution::Holds
        );
        assert_eq!(
            policy.resolve(&tally(&[("a", Pending), ("b", Revealed), ("c", Revealed)])),
            Resolution::Disputed
        );
        // Absent weight 3 > total 5 - quorum 3.
        assert_eq!(
            policy.resolve(&tally(&[("a", Absent), ("b", Revealed), ("c", Revealed)])),
            Resolution::Fails
        );
    }

    #[test]
    fn validation_rejects_unreachable_policies() {
        let set = oracles(&["a", "b", "c"]);
        assert!(AgreementPolicy::KOfN { k: 0 }.validate(&set).is_err());
        assert!(AgreementPolicy::KOfN { k: 4 }.validate(&set).is_err());
        assert!(AgreementPolicy::KOfN { k: 3 }.validate(&set).is_ok());
        assert!(
            AgreementPolicy::Single {
                oracle: OracleId::new("z")
            }
            .validate(&set)
            .is_err()
        );

        let weights = [(OracleId::new("a"), 1)].into_iter().collect();
        let err = AgreementPolicy::Weighted { weights, quorum: 2 }
            .validate(&set)
            .unwrap_err();
        assert!(matches!(err, AggregationError::InvalidPolicy(_)));
    }

    #[test]
    fn policy_roundtrips_through_json() {
        let policy = AgreementPolicy::Single {
            oracle: OracleId::new("a"),
        };
        let json = serde_json::to_string(&policy).expect("serialize policy");
        let decoded: AgreementPolicy = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(decoded, policy);
    }
}
