//! Scenario-driven valuation of products.
//!
//! A [`Scenario`] fixes the underlying price (or a dated path); the
//! [`Evaluator`] resolves every leg's condition against it, or against real
//! publications through any [`crate::oracle::RevealSource`], and prices the
//! resulting holdings with a [`PriceFeed`].

pub mod evaluator;
pub mod pricing;
pub mod scenario;

pub use evaluator::{Evaluator, ValuationResult};
pub use pricing::{FixedPrices, PairQuote, PriceFeed};
pub use scenario::{PricePoints, Scenario};
