//! Decomposition of target payoffs into HTLC legs.
//!
//! [`fit`] holds the per-region fitting primitives, [`decompose`] the
//! [`Solver`] that sweeps an oracle table and emits the legs.

pub mod decompose;
pub mod fit;

pub use decompose::{Solver, SynthesisRequest};
pub use fit::Holding;
