//! Domain layer types and invariants.

pub mod entities;
pub mod error;
pub mod query;
pub mod slots;
pub mod sponsorship;
pub mod types;
