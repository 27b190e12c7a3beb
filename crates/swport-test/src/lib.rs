//! Test infrastructure for swport
//!
//! Provides:
//! - Builders for the XML documents a Junos EX stack returns
//!   (declared configuration, terse interface status, PoE, virtual-chassis ports)
//! - Assertions over reconciled interface lists

pub mod fixtures;
mod verification;

pub use fixtures::*;
pub use verification::*;
