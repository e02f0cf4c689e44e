//! The analysis engine: rule dispatch, shared predicates, rule families

pub mod engine;
pub mod rules;
pub mod target;
pub mod utils;

pub use engine::{analyze, CancelToken, RuleContext};
