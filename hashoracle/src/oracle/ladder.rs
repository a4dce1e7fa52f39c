//! Deterministic preimage ladders.
//!
//! An oracle does not need to store one random secret per level. Instead it
//! keeps a single secret and derives every preimage from it:
//!
//! ```text
//! root      = H(header || secret)
//! kernel_0  = H(root)          kernel_i = H(kernel_{i-1})
//! pretext_i = "{header}:i{i}:{hex(kernel_i)}"
//! preimage_i = H(pretext_i)    hash_i = H(preimage_i)
//! ```
//!
//! Revealing the pretext of rung `i` lets anyone re-derive the preimages of
//! rungs `>= i`, never the ones below it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Hash256, ObservationDate, Pair, Preimage};

use super::levels::LevelSchedule;

/// One rung of the ladder.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LadderRung {
    pub pretext: String,
    pub preimage: Preimage,
    pub hash: Hash256,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct HashLadder {
    header: String,
    rungs: Vec<LadderRung>,
}

impl HashLadder {
    /// Derives `count` rungs from `header` and the oracle's `secret`.
    pub fn derive(header: &str, secret: &[u8], count: usize) -> Self {
        let mut root_input = header.as_bytes().to_vec();
        root_input.extend_from_slice(secret);
        let root = Hash256::compute(&root_input);

        let mut rungs = Vec::with_capacity(count);
        let mut kernel = root;
        for i in 0..count {
            kernel = Hash256::compute(kernel.as_bytes());
            let pretext = format!("{header}:i{i}:{}", kernel.to_hex());
            let preimage = Preimage(Hash256::compute(pretext.as_bytes()).0.to_vec());
            let hash = preimage.hash();
            rungs.push(LadderRung {
                pretext,
                preimage,
                hash,
            });
        }

        Self {
            header: header.to_string(),
            rungs,
        }
    }

    /// Standard header: `d{date}:{predicate}:{pair}:{schedule}`.
    pub fn header_for(date: ObservationDate, pair: &Pair, schedule: &LevelSchedule) -> String {
        format!("d{}:>=:{}:{}", date.0, pair, schedule.descriptor())
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn len(&self) -> usize {
        self.rungs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rungs.is_empty()
    }

    pub fn rungs(&self) -> &[LadderRung] {
        &self.rungs
    }

    pub fn hashes(&self) -> Vec<Hash256> {
        self.rungs.iter().map(|r| r.hash).collect()
    }

    pub fn preimage(&self, index: usize) -> Option<&Preimage> {
        self.rungs.get(index).map(|r| &r.preimage)
    }

    pub fn merkle_root(&self) -> Hash256 {
        merkle_root(&self.hashes())
    }

    /// Preimages an honest oracle discloses when the observed price is
    /// `price`: those of every level with `threshold <= price`.
    ///
    /// `thresholds[i]` is the level committed to by rung `i`.
    pub fn reveals_for(&self, thresholds: &[Decimal], price: Decimal) -> Vec<(Decimal, Preimage)> {
        thresholds
            .iter()
            .zip(&self.rungs)
            .filter(|(threshold, _)| **threshold <= price)
            .map(|(threshold, rung)| (*threshold, rung.preimage.clone()))
            .collect()
    }
}

/// Simple merkle root: hash consecutive pairs level by level, carrying an
/// odd trailing leaf up unchanged. An empty list commits to `H("")`.
pub fn merkle_root(hashes: &[Hash256]) -> Hash256 {
    if hashes.is_empty() {
        return Hash256::compute(&[]);
    }
    let mut level = hashes.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [left, right] => {
                    let mut buf = [0u8; 64];
                    buf[..32].copy_from_slice(left.as_bytes());
                    buf[32..].copy_from_slice(right.as_bytes());
                    Hash256::compute(&buf)
                }
                _ => pair[0],
            })
            .collect();
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn ladder_is_deterministic_per_secret() {
        let a = HashLadder::derive("d1:>=:BTS:USD:b0.04:v0.01:s3", b"secret", 4);
        let b = HashLadder::derive("d1:>=:BTS:USD:b0.04:v0.01:s3", b"secret", 4);
        let c = HashLadder::derive("d1:>=:BTS:USD:b0.04:v0.01:s3", b"other", 4);

        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
        assert_ne!(a.hashes(), c.hashes());
        assert!(a.rungs()[2].pretext.starts_with("d1:>=:BTS:USD:b0.04:v0.01:s3:i2:"));

        for rung in a.rungs() {
            assert_eq!(rung.preimage.hash(), rung.hash);
            assert_eq!(rung.preimage, Preimage(Hash256::compute(rung.pretext.as_bytes()).0.to_vec()));
        }
    }

    #[test]
    fn kernels_chain_forward() {
        let ladder = HashLadder::derive("h", b"s", 3);
        let root = Hash256::compute(b"hs");
        let k0 = Hash256::compute(root.as_bytes());
        let k1 = Hash256::compute(k0.as_bytes());
        assert_eq!(ladder.rungs()[0].pretext, format!("h:i0:{}", k0.to_hex()));
        assert_eq!(ladder.rungs()[1].pretext, format!("h:i1:{}", k1.to_hex()));
    }

    #[test]
    fn merkle_root_pairs_and_carries_odd_leaf() {
        let h: Vec<Hash256> = (0u8..3).map(|i| Hash256::compute(&[i])).collect();

        assert_eq!(merkle_root(&[]), Hash256::compute(&[]));
        assert_eq!(merkle_root(&h[..1]), h[0]);

        let mut buf = Vec::new();
        buf.extend_from_slice(h[0].as_bytes());
        buf.extend_from_slice(h[1].as_bytes());
        let h01 = Hash256::compute(&buf);
        assert_eq!(merkle_root(&h[..2]), h01);

        let mut top = Vec::new();
        top.extend_from_slice(h01.as_bytes());
        top.extend_from_slice(h[2].as_bytes());
        assert_eq!(merkle_root(&h), Hash256::compute(&top));
    }

    #[test]
    fn honest_reveals_cover_levels_at_or_below_price() {
        let ladder = HashLadder::derive("h", b"s", 3);
        let thresholds = [dec!(0.04), dec!(0.05), dec!(0.06)];

        let reveals = ladder.reveals_for(&thresholds, dec!(0.05));
        assert_eq!(reveals.len(), 2);
        assert_eq!(reveals[1], (dec!(0.05), ladder.preimage(1).unwrap().clone()));
        assert!(ladder.reveals_for(&thresholds, dec!(0.039)).is_empty());
    }

    #[test]
    fn header_names_date_pair_and_schedule() {
        let schedule = LevelSchedule::Interval {
            start: dec!(0.04),
            interval: dec!(0.01),
            steps: 3,
        };
        let pair = Pair::parse("BTS:USD").unwrap();
        assert_eq!(
            HashLadder::header_for(ObservationDate(86_400), &pair, &schedule),
            "d86400:>=:BTS:USD:b0.04:v0.01:s3"
        );
    }
}
