// hashoracle/src/types/product.rs

//! Products: ordered bundles of HTLC legs.
//!
//! A product is evaluated from the point of view of one `holder`. Its
//! `endowment` is what the holder owns unconditionally; the legs add or
//! remove assets depending on how their conditions settle. Legs are
//! independent of each other and are addressed by their position
//! ([`LegId`]).
//!
//! Like the other wire types, products are encoded with **bincode 2**
//! through its `serde` integration and the `standard()` config, and
//! identified by the BLAKE3 hash of that encoding.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregation::AggregatedCondition;
use crate::error::LegError;

use super::{AssetId, Hash256, HtlcLeg, LegId, PartyId, TriggerDirection};

/// Content hash of a [`Product`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub Hash256);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Free-form name, e.g. `"call 0.05 BTS:USD"`.
    pub label: String,
    /// Party whose portfolio value the product reports.
    pub holder: PartyId,
    /// Unconditional holdings of `holder`, per asset.
    pub endowment: BTreeMap<AssetId, Decimal>,
    legs: Vec<HtlcLeg>,
}

impl Product {
    pub fn new(label: impl Into<String>, holder: PartyId) -> Self {
        Self {
            label: label.into(),
            holder,
            endowment: BTreeMap::new(),
            legs: Vec::new(),
        }
    }

    /// Adds `amount` of `asset` to the holder's endowment.
    pub fn with_endowment(mut self, asset: AssetId, amount: Decimal) -> Self {
        *self.endowment.entry(asset).or_default() += amount;
        self
    }

    /// Appends a leg and returns its id.
    pub fn push_leg(&mut self, leg: HtlcLeg) -> LegId {
        self.legs.push(leg);
        LegId(self.legs.len() - 1)
    }

    /// Escrowed tranche: `amount` held by `escrow` goes to `on_reveal` if
    /// the condition holds and to `on_absence` if it fails.
    ///
    /// Returns the ids of the reveal leg and the absence leg.
    pub fn add_tranche(
        &mut self,
        escrow: &PartyId,
        on_reveal: &PartyId,
        on_absence: &PartyId,
        asset: &AssetId,
        amount: Decimal,
        condition: AggregatedCondition,
    ) -> Result<(LegId, LegId), LegError> {
        let reveal = HtlcLeg::new(
            escrow.clone(),
            on_reveal.clone(),
            asset.clone(),
            amount,
            condition.clone(),
            TriggerDirection::RevealTriggers,
        )?;
        let absence = HtlcLeg::new(
            escrow.clone(),
            on_absence.clone(),
            asset.clone(),
            amount,
            condition,
            TriggerDirection::AbsenceTriggers,
        )?;
        Ok((self.push_leg(reveal), self.push_leg(absence)))
    }

    pub fn legs(&self) -> &[HtlcLeg] {
        &self.legs
    }

    pub fn leg(&self, id: LegId) -> Option<&HtlcLeg> {
        self.legs.get(id.0)
    }

    /// Legs paired with their ids.
    pub fn iter_legs(&self) -> impl Iterator<Item = (LegId, &HtlcLeg)> {
        self.legs.iter().enumerate().map(|(i, leg)| (LegId(i), leg))
    }

    /// Every party that appears in the product, holder included.
    pub fn parties(&self) -> BTreeSet<PartyId> {
        let mut parties: BTreeSet<PartyId> = self
            .legs
            .iter()
            .flat_map(|leg| [leg.from().clone(), leg.to().clone()])
            .collect();
        parties.insert(self.holder.clone());
        parties
    }

    /// Every asset that appears in the endowment or in a leg.
    pub fn assets(&self) -> BTreeSet<AssetId> {
        self.endowment
            .keys()
            .cloned()
            .chain(self.legs.iter().map(|leg| leg.asset().clone()))
            .collect()
    }

    /// Distinct thresholds referenced by the legs, ascending.
    pub fn thresholds(&self) -> Vec<Decimal> {
        let set: BTreeSet<Decimal> = self.legs.iter().map(|l| l.condition().threshold).collect();
        set.into_iter().collect()
    }

    /// Canonical byte representation (bincode 2, `standard()` config).
    ///
    /// # Panics
    ///
    /// Panics if encoding fails, which would be a programming error: every
    /// field is serializable.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let cfg = bincode::config::standard();
        bincode::serde::encode_to_vec(self, cfg)
            .expect("Product should always be serializable with bincode 2 + serde")
    }

    /// BLAKE3-256 over [`Product::canonical_bytes`].
    pub fn compute_id(&self) -> ProductId {
        ProductId(Hash256::compute(&self.canonical_bytes()))
    }
}
