//! Conditions backed by one or more oracles.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AggregationError, DisputedConditionError};
use crate::oracle::{RevealFact, RevealSource};
use crate::types::{ObservationDate, OracleId};

use super::policy::{AgreementPolicy, QuorumRule};

/// Outcome of a condition under its agreement policy.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    Holds,
    Fails,
    /// Quorum not reached in either direction.
    Disputed,
}

impl Resolution {
    /// The condition's truth value, or an error if it is disputed.
    pub fn definite(self) -> Result<bool, DisputedConditionError> {
        match self {
            Resolution::Holds => Ok(true),
            Resolution::Fails => Ok(false),
            Resolution::Disputed => Err(DisputedConditionError { legs: Vec::new() }),
        }
    }

    pub fn is_disputed(&self) -> bool {
        matches!(self, Resolution::Disputed)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Resolution::Holds => "holds",
            Resolution::Fails => "fails",
            Resolution::Disputed => "disputed",
        };
        f.write_str(s)
    }
}

/// Per-oracle facts for one condition.
///
/// Every participant starts out pending. A fact, once revealed or absent,
/// is final: recording the opposite fact is rejected.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OracleTally {
    facts: BTreeMap<OracleId, RevealFact>,
}

impl OracleTally {
    pub fn new<I>(participants: I) -> Self
    where
        I: IntoIterator<Item = OracleId>,
    {
        Self {
            facts: participants
                .into_iter()
                .map(|o| (o, RevealFact::Pending))
                .collect(),
        }
    }

    /// Records `fact` for `oracle`; returns whether the tally changed.
    ///
    /// Recording `Pending` is a no-op. Facts from non-participants and
    /// contradictions of an earlier fact are rejected without touching the
    /// tally.
    pub fn record(&mut self, oracle: &OracleId, fact: RevealFact) -> Result<bool, AggregationError> {
        let current = self
            .facts
            .get_mut(oracle)
            .ok_or_else(|| AggregationError::UnknownOracle(oracle.clone()))?;

        match (*current, fact) {
            (_, RevealFact::Pending) => Ok(false),
            (RevealFact::Pending, _) => {
                *current = fact;
                Ok(true)
            }
            (known, new) if known == new => Ok(false),
            _ => Err(AggregationError::ConflictingFact {
                oracle: oracle.clone(),
            }),
        }
    }

    /// Fact for `oracle`; non-participants read as pending.
    pub fn fact(&self, oracle: &OracleId) -> RevealFact {
        self.facts.get(oracle).copied().unwrap_or(RevealFact::Pending)
    }

    pub fn participants(&self) -> impl Iterator<Item = &OracleId> {
        self.facts.keys()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn revealed(&self) -> usize {
        self.count(RevealFact::Revealed)
    }

    pub fn absent(&self) -> usize {
        self.count(RevealFact::Absent)
    }

    pub fn pending(&self) -> usize {
        self.count(RevealFact::Pending)
    }

    fn count(&self, fact: RevealFact) -> usize {
        self.facts.values().filter(|f| **f == fact).count()
    }
}

/// "Price on `observation_date` reached `threshold`", as attested by a
/// set of oracles under an agreement policy.
///
/// Decoding goes through [`AggregatedCondition::new`], so a stored
/// condition is held to the same policy checks as a built one.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCondition")]
pub struct AggregatedCondition {
    pub observation_date: ObservationDate,
    pub threshold: Decimal,
    oracles: BTreeSet<OracleId>,
    policy: AgreementPolicy,
}

#[derive(Deserialize)]
struct RawCondition {
    observation_date: ObservationDate,
    threshold: Decimal,
    oracles: BTreeSet<OracleId>,
    policy: AgreementPolicy,
}

impl TryFrom<RawCondition> for AggregatedCondition {
    type Error = AggregationError;

    fn try_from(raw: RawCondition) -> Result<Self, Self::Error> {
        Self::new(raw.observation_date, raw.threshold, raw.oracles, raw.policy)
    }
}

impl AggregatedCondition {
    /// Builds a condition, validating `policy` against `oracles`.
    pub fn new<I>(
        observation_date: ObservationDate,
        threshold: Decimal,
        oracles: I,
        policy: AgreementPolicy,
    ) -> Result<Self, AggregationError>
    where
        I: IntoIterator<Item = OracleId>,
    {
        let oracles: BTreeSet<OracleId> = oracles.into_iter().collect();
        if oracles.is_empty() {
            return Err(AggregationError::NoParticipants);
        }
        policy.validate(&oracles)?;
        Ok(Self {
            observation_date,
            threshold,
            oracles,
            policy,
        })
    }

    /// Condition decided by one oracle alone.
    pub fn single(observation_date: ObservationDate, threshold: Decimal, oracle: OracleId) -> Self {
        Self {
            observation_date,
            threshold,
            oracles: BTreeSet::from([oracle.clone()]),
            policy: AgreementPolicy::Single { oracle },
        }
    }

    pub fn oracles(&self) -> &BTreeSet<OracleId> {
        &self.oracles
    }

    pub fn policy(&self) -> &AgreementPolicy {
        &self.policy
    }

    /// A tally with every participant pending.
    pub fn empty_tally(&self) -> OracleTally {
        OracleTally::new(self.oracles.iter().cloned())
    }

    /// Collects the current fact of each participant from `source`.
    pub fn tally<S>(&self, source: &S) -> OracleTally
    where
        S: RevealSource + ?Sized,
    {
        OracleTally {
            facts: self
                .oracles
                .iter()
                .map(|o| (o.clone(), source.fact(o, self.observation_date, self.threshold)))
                .collect(),
        }
    }

    /// Resolves `tally` under this condition's policy.
    pub fn resolve(&self, tally: &OracleTally) -> Resolution {
        self.policy.resolve(tally)
    }

    /// Resolves `tally` under an externally supplied rule.
    pub fn resolve_under<R>(&self, tally: &OracleTally, rule: &R) -> Resolution
    where
        R: QuorumRule + ?Sized,
    {
        rule.resolve(tally)
    }

    /// Shorthand for `resolve(&tally(source))`.
    pub fn resolve_with<S>(&self, source: &S) -> Resolution
    where
        S: RevealSource + ?Sized,
    {
        self.resolve(&self.tally(source))
    }
}

impl fmt::Display for AggregatedCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p({}) >= {} [{} oracle(s)]",
            self.observation_date,
            self.threshold,
            self.oracles.len()
        )
    }
}

/// Oracle set and policy shared by a family of conditions that differ only
/// in threshold, e.g. all the legs a solver emits.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConditionTemplate {
    pub observation_date: ObservationDate,
    pub oracles: BTreeSet<OracleId>,
    pub policy: AgreementPolicy,
}

impl ConditionTemplate {
    pub fn new<I>(observation_date: ObservationDate, oracles: I, policy: AgreementPolicy) -> Self
    where
        I: IntoIterator<Item = OracleId>,
    {
        Self {
            observation_date,
            oracles: oracles.into_iter().collect(),
            policy,
        }
    }

    pub fn single(observation_date: ObservationDate, oracle: OracleId) -> Self {
        Self::new(
            observation_date,
            [oracle.clone()],
            AgreementPolicy::Single { oracle },
        )
    }

    /// Instantiates the template at `threshold`.
    pub fn at(&self, threshold: Decimal) -> Result<AggregatedCondition, AggregationError> {
        AggregatedCondition::new(
            self.observation_date,
            threshold,
            self.oracles.iter().cloned(),
            self.policy.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn three() -> Vec<OracleId> {
        vec![OracleId::new("a"), OracleId::new("b"), OracleId::new("c")]
    }

    /// Reveal source backed by a fixed map.
    struct Facts(BTreeMap<OracleId, RevealFact>);

    impl RevealSource for Facts {
        fn fact(&self, oracle: &OracleId, _date: ObservationDate, _threshold: Decimal) -> RevealFact {
            self.0.get(oracle).copied().unwrap_or(RevealFact::Pending)
        }
    }

    #[test]
    fn tally_is_monotone() {
        let mut tally = OracleTally::new(three());
        let a = OracleId::new("a");

        assert!(tally.record(&a, RevealFact::Revealed).unwrap());
        assert!(!tally.record(&a, RevealFact::Revealed).unwrap());
        assert!(!tally.record(&a, RevealFact::Pending).unwrap());
        assert_eq!(tally.fact(&a), RevealFact::Revealed);

        let before = tally.clone();
        let err = tally.record(&a, RevealFact::Absent).unwrap_err();
        assert_eq!(err, AggregationError::ConflictingFact { oracle: a.clone() });
        assert_eq!(tally, before);

        let err = tally
            .record(&OracleId::new("z"), RevealFact::Revealed)
            .unwrap_err();
        assert!(matches!(err, AggregationError::UnknownOracle(_)));

        assert_eq!((tally.revealed(), tally.absent(), tally.pending()), (1, 0, 2));
    }

    #[test]
    fn incremental_facts_only_settle_disputes() {
        let condition = AggregatedCondition::new(
            ObservationDate(10),
            dec!(0.05),
            three(),
            AgreementPolicy::KOfN { k: 2 },
        )
        .unwrap();

        let mut tally = condition.empty_tally();
        assert_eq!(condition.resolve(&tally), Resolution::Disputed);

        tally.record(&OracleId::new("a"), RevealFact::Revealed).unwrap();
        assert_eq!(condition.resolve(&tally), Resolution::Disputed);

        tally.record(&OracleId::new("c"), RevealFact::Revealed).unwrap();
        assert_eq!(condition.resolve(&tally), Resolution::Holds);

        tally.record(&OracleId::new("b"), RevealFact::Absent).unwrap();
        assert_eq!(condition.resolve(&tally), Resolution::Holds);
    }

    #[test]
    fn tally_reads_from_reveal_source() {
        let condition = AggregatedCondition::new(
            ObservationDate(10),
            dec!(0.05),
            three(),
            AgreementPolicy::KOfN { k: 2 },
        )
        .unwrap();
        let source = Facts(
            [
                (OracleId::new("a"), RevealFact::Revealed),
                (OracleId::new("b"), RevealFact::Absent),
            ]
            .into_iter()
            .collect(),
        );
        assert_eq!(condition.resolve_with(&source), Resolution::Disputed);

        // A stricter external rule sees the same tally differently.
        let tally = condition.tally(&source);
        assert_eq!(
            condition.resolve_under(&tally, &AgreementPolicy::KOfN { k: 1 }),
            Resolution::Holds
        );
    }

    #[test]
    fn construction_validates_policy() {
        let err = AggregatedCondition::new(
            ObservationDate(10),
            dec!(0.05),
            Vec::new(),
            AgreementPolicy::Unanimous,
        )
        .unwrap_err();
        assert_eq!(err, AggregationError::NoParticipants);

        let err = AggregatedCondition::new(
            ObservationDate(10),
            dec!(0.05),
            three(),
            AgreementPolicy::KOfN { k: 5 },
        )
        .unwrap_err();
        assert!(matches!(err, AggregationError::InvalidPolicy(_)));
    }

    #[test]
    fn decoding_validates_policy() {
        let condition = AggregatedCondition::new(
            ObservationDate(10),
            dec!(0.05),
            three(),
            AgreementPolicy::KOfN { k: 2 },
        )
        .unwrap();
        let json = serde_json::to_string(&condition).unwrap();
        assert_eq!(serde_json::from_str::<AggregatedCondition>(&json).unwrap(), condition);

        let quorum_too_large = json.replace(r#""k":2"#, r#""k":5"#);
        assert_ne!(quorum_too_large, json);
        assert!(serde_json::from_str::<AggregatedCondition>(&quorum_too_large).is_err());

        let no_oracles = json.replace(r#"["a","b","c"]"#, "[]");
        assert_ne!(no_oracles, json);
        assert!(serde_json::from_str::<AggregatedCondition>(&no_oracles).is_err());
    }

    #[test]
    fn definite_refuses_disputed() {
        assert_eq!(Resolution::Holds.definite(), Ok(true));
        assert_eq!(Resolution::Fails.definite(), Ok(false));
        assert!(Resolution::Disputed.definite().is_err());
    }

    #[test]
    fn template_instantiates_thresholds() {
        let template = ConditionTemplate::single(ObservationDate(10), OracleId::new("a"));
        let condition = template.at(dec!(0.07)).unwrap();
        assert_eq!(condition.threshold, dec!(0.07));
        assert_eq!(
            condition,
            AggregatedCondition::single(ObservationDate(10), dec!(0.07), OracleId::new("a"))
        );
    }
}
