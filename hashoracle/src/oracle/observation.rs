//! Oracle publications and reveal facts.
//!
//! An oracle publishes, per observation date, a ladder of [`PriceLevel`]s:
//! strictly increasing thresholds, one commitment each, where revealing the
//! preimage of a level means "the observed price reached this threshold".
//! The table is append-only until settlement and frozen once sealed.
//!
//! [`RevealSource`] is the seam through which conditions learn reveal
//! facts. It is implemented by [`OracleBoard`] (real publications) and by
//! [`crate::valuation::Scenario`] (hypothetical prices).

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ObservationError;
use crate::types::{Commitment, Hash256, ObservationDate, OracleId, Pair, Preimage};

use super::ladder::HashLadder;

/// What is known about one oracle's level at one moment.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum RevealFact {
    /// The preimage was disclosed: the condition was observed to hold.
    Revealed,
    /// The settlement window closed without a disclosure.
    Absent,
    /// No determinate fact yet (window still open, or nothing published).
    Pending,
}

impl RevealFact {
    pub fn is_pending(&self) -> bool {
        matches!(self, RevealFact::Pending)
    }
}

/// Provider of per-oracle reveal facts for a given observation.
pub trait RevealSource {
    /// Reveal state of `oracle`'s level at `threshold` for `date`.
    fn fact(&self, oracle: &OracleId, date: ObservationDate, threshold: Decimal) -> RevealFact;
}

/// One rung of a published ladder.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub threshold: Decimal,
    pub commitment: Commitment,
}

/// A named oracle's ladder for one observation date.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct OracleObservation {
    oracle: OracleId,
    pair: Pair,
    date: ObservationDate,
    /// Last second (inclusive) at which reveals are accepted.
    deadline: u64,
    levels: Vec<PriceLevel>,
    sealed: bool,
}

impl OracleObservation {
    /// Opens an empty ladder whose settlement window closes
    /// `window_secs` after `date`.
    pub fn new(oracle: OracleId, pair: Pair, date: ObservationDate, window_secs: u64) -> Self {
        Self {
            oracle,
            pair,
            date,
            deadline: date.deadline(window_secs),
            levels: Vec::new(),
            sealed: false,
        }
    }

    /// Appends a level. Thresholds must strictly increase.
    pub fn publish_level(&mut self, threshold: Decimal, hash: Hash256) -> Result<(), ObservationError> {
        if self.sealed {
            return Err(ObservationError::Sealed {
                oracle: self.oracle.clone(),
            });
        }
        if let Some(last) = self.levels.last() {
            if threshold <= last.threshold {
                return Err(ObservationError::NonMonotoneThreshold {
                    last: last.threshold,
                    next: threshold,
                });
            }
        }
        self.levels.push(PriceLevel {
            threshold,
            commitment: Commitment::from_hash(hash),
        });
        Ok(())
    }

    /// Appends a whole table of `(threshold, hash)` pairs, all or nothing.
    pub fn publish_table<I>(&mut self, table: I) -> Result<(), ObservationError>
    where
        I: IntoIterator<Item = (Decimal, Hash256)>,
    {
        let mut staged = self.clone();
        for (threshold, hash) in table {
            staged.publish_level(threshold, hash)?;
        }
        *self = staged;
        Ok(())
    }

    /// Publishes `thresholds` against the first rungs of `ladder`.
    pub fn from_ladder(
        oracle: OracleId,
        pair: Pair,
        date: ObservationDate,
        window_secs: u64,
        thresholds: &[Decimal],
        ladder: &HashLadder,
    ) -> Result<Self, ObservationError> {
        if ladder.len() < thresholds.len() {
            return Err(ObservationError::LadderTooShort {
                needed: thresholds.len(),
                available: ladder.len(),
            });
        }
        let mut obs = Self::new(oracle, pair, date, window_secs);
        obs.publish_table(thresholds.iter().copied().zip(ladder.hashes()))?;
        debug!(
            oracle = %obs.oracle,
            date = %date,
            levels = thresholds.len(),
            merkle_root = %ladder.merkle_root(),
            "published ladder"
        );
        Ok(obs)
    }

    /// Records the disclosure of the preimage for the level at `threshold`.
    ///
    /// Returns `Ok(true)` if the level moved to revealed, `Ok(false)` if it
    /// already was. Reveals after the deadline, on a sealed table, or that
    /// fail hash verification leave the table unchanged.
    pub fn record_reveal(
        &mut self,
        threshold: Decimal,
        preimage: &Preimage,
        now: u64,
    ) -> Result<bool, ObservationError> {
        if self.sealed {
            return Err(ObservationError::Sealed {
                oracle: self.oracle.clone(),
            });
        }
        if now > self.deadline {
            return Err(ObservationError::SettlementClosed {
                deadline: self.deadline,
                now,
            });
        }
        let level = self
            .levels
            .iter_mut()
            .find(|l| l.threshold == threshold)
            .ok_or(ObservationError::UnknownThreshold(threshold))?;

        let was_revealed = level.commitment.is_revealed();
        level.commitment = level.commitment.reveal(preimage)?;
        if !was_revealed {
            debug!(oracle = %self.oracle, %threshold, "level revealed");
        }
        Ok(!was_revealed)
    }

    /// Freezes the table once the window has closed: unrevealed levels
    /// become absent. Sealing at or before the deadline is refused.
    pub fn seal(&mut self, now: u64) -> Result<(), ObservationError> {
        if now <= self.deadline {
            return Err(ObservationError::WindowOpen {
                deadline: self.deadline,
                now,
            });
        }
        self.sealed = true;
        Ok(())
    }

    /// Reveal fact for the level at `threshold`.
    pub fn fact_at(&self, threshold: Decimal) -> RevealFact {
        match self.levels.iter().find(|l| l.threshold == threshold) {
            Some(level) if level.commitment.is_revealed() => RevealFact::Revealed,
            Some(_) if self.sealed => RevealFact::Absent,
            _ => RevealFact::Pending,
        }
    }

    /// Highest revealed threshold, i.e. the price floor this oracle attests.
    pub fn highest_revealed(&self) -> Option<Decimal> {
        self.levels
            .iter()
            .filter(|l| l.commitment.is_revealed())
            .map(|l| l.threshold)
            .max()
    }

    /// Re-checks monotonicity and every commitment, e.g. after importing a
    /// publication.
    pub fn verify(&self) -> Result<(), ObservationError> {
        for pair in self.levels.windows(2) {
            if pair[1].threshold <= pair[0].threshold {
                return Err(ObservationError::NonMonotoneThreshold {
                    last: pair[0].threshold,
                    next: pair[1].threshold,
                });
            }
        }
        for level in &self.levels {
            level.commitment.verify()?;
        }
        Ok(())
    }

    pub fn oracle(&self) -> &OracleId {
        &self.oracle
    }

    pub fn pair(&self) -> &Pair {
        &self.pair
    }

    pub fn date(&self) -> ObservationDate {
        self.date
    }

    pub fn deadline(&self) -> u64 {
        self.deadline
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn levels(&self) -> &[PriceLevel] {
        &self.levels
    }

    pub fn thresholds(&self) -> Vec<Decimal> {
        self.levels.iter().map(|l| l.threshold).collect()
    }
}

/// All publications known to a settling party, one table per oracle and
/// observation date.
#[derive(Clone, Debug, Default)]
pub struct OracleBoard {
    tables: BTreeMap<(OracleId, ObservationDate), OracleObservation>,
}

impl OracleBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a verified publication.
    pub fn insert(&mut self, observation: OracleObservation) -> Result<(), ObservationError> {
        observation.verify()?;
        let key = (observation.oracle.clone(), observation.date);
        self.tables.insert(key, observation);
        Ok(())
    }

    pub fn get(&self, oracle: &OracleId, date: ObservationDate) -> Option<&OracleObservation> {
        self.tables.get(&(oracle.clone(), date))
    }

    /// Forwards a reveal to the matching table.
    ///
    /// A reveal for a table that was never published is reported as
    /// [`ObservationError::UnknownObservation`].
    pub fn record_reveal(
        &mut self,
        oracle: &OracleId,
        date: ObservationDate,
        threshold: Decimal,
        preimage: &Preimage,
        now: u64,
    ) -> Result<bool, ObservationError> {
        match self.tables.get_mut(&(oracle.clone(), date)) {
            Some(table) => table.record_reveal(threshold, preimage, now),
            None => Err(ObservationError::UnknownObservation {
                oracle: oracle.clone(),
                date,
            }),
        }
    }

    /// Seals every table whose deadline has passed; returns how many.
    pub fn seal_due(&mut self, now: u64) -> usize {
        let mut sealed = 0;
        for table in self.tables.values_mut() {
            if !table.sealed && table.seal(now).is_ok() {
                sealed += 1;
            }
        }
        sealed
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl RevealSource for OracleBoard {
    fn fact(&self, oracle: &OracleId, date: ObservationDate, threshold: Decimal) -> RevealFact {
        self.get(oracle, date)
            .map(|table| table.fact_at(threshold))
            .unwrap_or(RevealFact::Pending)
    }
}
