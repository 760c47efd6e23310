//! Mockva Common Types
//!
//! Shared types used across the mockva crates: account and transaction
//! identifiers, fixed-scale money, time helpers and the error taxonomy.

pub mod identifiers;
pub mod monetary;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use monetary::*;
pub use error::*;
pub use time::*;
