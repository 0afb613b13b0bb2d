//! Commands of the rangefetch binary.

pub mod fetch;
pub mod plan;
