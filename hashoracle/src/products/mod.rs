//! Ready-made product builders.
//!
//! Each builder sizes its legs from a handful of market parameters and
//! emits ordinary [`Product`](crate::types::Product)s, so the results go
//! through the same evaluator as anything the solver produces.

pub mod call_option;
pub mod stablecoin;

pub use call_option::CallOption;
pub use stablecoin::BoundedStableCoin;
