// hashoracle/src/types/commitment.rs

//! Hash commitments published by oracles.
//!
//! A [`Commitment`] starts life holding only the hash of a secret
//! [`Preimage`]. At settlement the oracle may disclose the preimage; the
//! commitment then moves, once and for good, into the revealed state. This
//! is the only place cryptographic trust enters the engine: oracle honesty
//! is assumed, and the sole check performed is hash consistency.

use serde::{Deserialize, Serialize};

use super::Hash256;
use crate::error::CommitmentError;

/// Size of generated preimages, in bytes.
pub const PREIMAGE_LEN: usize = 32;

/// Secret whose hash is published ahead of the observation date.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Preimage(pub Vec<u8>);

impl Preimage {
    /// Generates a random 32-byte preimage.
    pub fn generate() -> Self {
        let bytes: [u8; PREIMAGE_LEN] = rand::random();
        Preimage(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Hash under which this preimage is committed.
    pub fn hash(&self) -> Hash256 {
        Hash256::compute(&self.0)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

/// A published hash and, after settlement, possibly its preimage.
///
/// Invariant: when `preimage` is `Some(p)` then `Hash256::compute(p) ==
/// hash`. The only way to set the preimage is [`Commitment::reveal`], which
/// enforces this.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Commitment {
    hash: Hash256,
    preimage: Option<Preimage>,
}

impl Commitment {
    /// Publishes a commitment to `preimage`, keeping only its hash.
    ///
    /// Empty preimages are rejected with
    /// [`CommitmentError::InvalidPreimage`].
    pub fn publish(preimage: &Preimage) -> Result<Self, CommitmentError> {
        if preimage.0.is_empty() {
            return Err(CommitmentError::InvalidPreimage);
        }
        Ok(Self::from_hash(preimage.hash()))
    }

    /// An unrevealed commitment to an already published hash.
    ///
    /// Used when importing another oracle's publication, where only the
    /// hash is known.
    pub fn from_hash(hash: Hash256) -> Self {
        Self {
            hash,
            preimage: None,
        }
    }

    /// Returns the revealed commitment if `preimage` hashes to this
    /// commitment's hash.
    ///
    /// On mismatch `self` is left as it was and
    /// [`CommitmentError::Verification`] is returned. Revealing an already
    /// revealed commitment with its own preimage is a no-op.
    pub fn reveal(&self, preimage: &Preimage) -> Result<Self, CommitmentError> {
        let actual = preimage.hash();
        if actual != self.hash {
            return Err(CommitmentError::Verification {
                expected: self.hash,
                actual,
            });
        }
        Ok(Self {
            hash: self.hash,
            preimage: Some(preimage.clone()),
        })
    }

    /// Re-checks the hash invariant, e.g. after deserializing a
    /// publication from an untrusted source.
    pub fn verify(&self) -> Result<(), CommitmentError> {
        match &self.preimage {
            Some(preimage) if preimage.hash() != self.hash => Err(CommitmentError::Verification {
                expected: self.hash,
                actual: preimage.hash(),
            }),
            _ => Ok(()),
        }
    }

    pub fn is_revealed(&self) -> bool {
        self.preimage.is_some()
    }

    pub fn hash(&self) -> &Hash256 {
        &self.hash
    }

    pub fn preimage(&self) -> Option<&Preimage> {
        self.preimage.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_keeps_only_the_hash() {
        let preimage = Preimage(b"price>=0.05".to_vec());
        let commitment = Commitment::publish(&preimage).expect("non-empty preimage");

        assert!(!commitment.is_revealed());
        assert_eq!(commitment.hash(), &Hash256::compute(b"price>=0.05"));
        assert!(commitment.preimage().is_none());
    }

    #[test]
    fn publish_rejects_empty_preimage() {
        let err = Commitment::publish(&Preimage(Vec::new())).unwrap_err();
        assert_eq!(err, CommitmentError::InvalidPreimage);
    }

    #[test]
    fn reveal_with_matching_preimage_succeeds() {
        for _ in 0..8 {
            let preimage = Preimage::generate();
            let commitment = Commitment::publish(&preimage).unwrap();

            let revealed = commitment.reveal(&preimage).expect("matching preimage");
            assert!(revealed.is_revealed());
            assert_eq!(revealed.preimage(), Some(&preimage));
            assert_eq!(revealed.hash(), commitment.hash());

            // Idempotent on an already revealed commitment.
            let again = revealed.reveal(&preimage).expect("same preimage again");
            assert_eq!(again, revealed);
        }
    }

    #[test]
    fn reveal_with_wrong_preimage_fails_and_leaves_state() {
        let preimage = Preimage::generate();
        let commitment = Commitment::publish(&preimage).unwrap();
        let before = commitment.clone();

        let wrong = Preimage(b"not the secret".to_vec());
        let err = commitment.reveal(&wrong).unwrap_err();

        match err {
            CommitmentError::Verification { expected, actual } => {
                assert_eq!(expected, *commitment.hash());
                assert_eq!(actual, wrong.hash());
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
        assert_eq!(commitment, before);
        assert!(!commitment.is_revealed());
    }

    #[test]
    fn generated_preimages_differ() {
        let a = Preimage::generate();
        let b = Preimage::generate();
        assert_eq!(a.as_bytes().len(), PREIMAGE_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn serde_roundtrip_preserves_reveal_state() {
        let preimage = Preimage(vec![9u8; 16]);
        let revealed = Commitment::publish(&preimage)
            .unwrap()
            .reveal(&preimage)
            .unwrap();

        let json = serde_json::to_string(&revealed).expect("serialize commitment");
        let decoded: Commitment = serde_json::from_str(&json).expect("deserialize commitment");
        assert_eq!(decoded, revealed);
        assert!(decoded.verify().is_ok());
    }

    #[test]
    fn verify_catches_tampered_preimage() {
        let preimage = Preimage(vec![1u8; 16]);
        let commitment = Commitment::publish(&preimage).unwrap();
        let tampered = Commitment {
            hash: *commitment.hash(),
            preimage: Some(Preimage(vec![2u8; 16])),
        };
        assert!(matches!(
            tampered.verify(),
            Err(CommitmentError::Verification { .. })
        ));
        assert!(commitment.verify().is_ok());
    }
}
